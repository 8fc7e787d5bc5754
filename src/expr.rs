use crate::error::{CompileError, WarningKind};
use crate::project::{Block, BlockId, InputValue, Opcode};
use crate::scope::ActorScope;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    A,
    Left,
    Right,
    Up,
    Down,
    Plus,
}

impl Button {
    pub fn c_name(self) -> &'static str {
        match self {
            Button::A => "KEY_A",
            Button::Left => "KEY_LEFT",
            Button::Right => "KEY_RIGHT",
            Button::Up => "KEY_UP",
            Button::Down => "KEY_DOWN",
            Button::Plus => "KEY_PLUS",
        }
    }
}

/// Button used for any key name missing from `KEY_BUTTONS`.
pub const DEFAULT_BUTTON: Button = Button::A;

const KEY_BUTTONS: &[(&str, Button)] = &[
    ("space", Button::A),
    ("left arrow", Button::Left),
    ("right arrow", Button::Right),
    ("up arrow", Button::Up),
    ("down arrow", Button::Down),
];

pub fn button_for_key(name: &str) -> Option<Button> {
    KEY_BUTTONS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, button)| *button)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Gt,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
        }
    }
}

/// Side-effect-free expression, rendered by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    ButtonHeld(Button),
    NumCompare {
        op: CompareOp,
        left: f64,
        right: f64,
    },
    TextCompare {
        op: CompareOp,
        left: String,
        right: String,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Typed literal: a number when the text parses as one, text otherwise.
pub fn literal(text: &str) -> Expr {
    match parse_number(text) {
        Some(value) => Expr::Number(value),
        None => Expr::Text(text.to_string()),
    }
}

/// Strict numeric parse: surrounding whitespace is ignored, empty text and
/// non-finite values are not numbers.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Raw text of a value input. Reporters outside the supported set read as "0".
pub fn operand(scope: &mut ActorScope<'_>, owner: &Block, name: &str) -> Result<String, CompileError> {
    match owner.input(name) {
        Some(InputValue::Literal(text)) => Ok(text.clone()),
        Some(InputValue::Block(id)) => {
            let reporter = scope.resolve(owner, name, id)?;
            scope.warn(
                reporter,
                WarningKind::UnsupportedReporter(reporter.opcode.to_string()),
            );
            Ok("0".to_string())
        }
        Some(InputValue::Reporter(what)) => {
            let what = what.clone();
            scope.warn(owner, WarningKind::UnsupportedReporter(what));
            Ok("0".to_string())
        }
        Some(InputValue::Empty) | None => Ok(String::new()),
    }
}

/// Numeric input. An empty field reads as 0; anything else that is not a
/// number is an input-format error.
pub fn number_input(scope: &mut ActorScope<'_>, owner: &Block, name: &str) -> Result<f64, CompileError> {
    let text = operand(scope, owner, name)?;
    if text.trim().is_empty() {
        return Ok(0.0);
    }
    parse_number(&text).ok_or_else(|| scope.invalid_number(owner, name, &text))
}

pub fn text_input(scope: &mut ActorScope<'_>, owner: &Block, name: &str) -> Result<String, CompileError> {
    operand(scope, owner, name)
}

/// Resolves the key a key-pressed condition or trigger refers to. The key
/// comes from a literal input, a key menu block, or the block's own field.
pub fn key_button(scope: &mut ActorScope<'_>, block: &Block) -> Result<Button, CompileError> {
    let name = match block.input("KEY_OPTION") {
        Some(InputValue::Literal(text)) => text.clone(),
        Some(InputValue::Block(id)) => {
            let menu = scope.resolve(block, "KEY_OPTION", id)?;
            menu.field("KEY_OPTION").unwrap_or_default().to_string()
        }
        _ => block.field("KEY_OPTION").unwrap_or_default().to_string(),
    };
    match button_for_key(&name) {
        Some(button) => Ok(button),
        None => {
            scope.warn(block, WarningKind::UnmappedKey(name));
            Ok(DEFAULT_BUTTON)
        }
    }
}

/// Translates a condition block. Operand trees nested deeper than `limit`
/// are rejected.
pub fn condition_expr(scope: &mut ActorScope<'_>, block: &Block, limit: usize) -> Result<Expr, CompileError> {
    ConditionWalk::new(scope, limit).condition(block)
}

/// Translates the condition plugged into input `name` of `owner`. An empty
/// slot is false.
pub fn condition_input(
    scope: &mut ActorScope<'_>,
    owner: &Block,
    name: &str,
    limit: usize,
) -> Result<Expr, CompileError> {
    ConditionWalk::new(scope, limit).input(owner, name)
}

/// Depth-first walk over an operand tree. `path` holds the blocks from the
/// root down to the current one, so shared operands pass and loops fail.
struct ConditionWalk<'s, 'a> {
    scope: &'s mut ActorScope<'a>,
    path: HashSet<BlockId>,
    limit: usize,
}

impl<'s, 'a> ConditionWalk<'s, 'a> {
    fn new(scope: &'s mut ActorScope<'a>, limit: usize) -> Self {
        Self {
            scope,
            path: HashSet::new(),
            limit,
        }
    }

    fn input(&mut self, owner: &Block, name: &str) -> Result<Expr, CompileError> {
        match owner.input(name) {
            Some(InputValue::Block(id)) => {
                let block = self.scope.resolve(owner, name, id)?;
                self.condition(block)
            }
            Some(InputValue::Reporter(what)) => {
                let what = what.clone();
                self.scope.warn(owner, WarningKind::UnsupportedReporter(what));
                Ok(Expr::Bool(false))
            }
            _ => Ok(Expr::Bool(false)),
        }
    }

    fn condition(&mut self, block: &Block) -> Result<Expr, CompileError> {
        if !self.path.insert(block.id.clone()) {
            return Err(self.scope.cycle(block));
        }
        if self.path.len() > self.limit {
            return Err(self.scope.too_deep(block, self.limit));
        }
        let expr = match &block.opcode {
            Opcode::KeyPressed => Expr::ButtonHeld(key_button(self.scope, block)?),
            Opcode::Equals => compare(self.scope, block, CompareOp::Eq)?,
            Opcode::LessThan => compare(self.scope, block, CompareOp::Lt)?,
            Opcode::GreaterThan => compare(self.scope, block, CompareOp::Gt)?,
            Opcode::And => Expr::And(
                Box::new(self.input(block, "OPERAND1")?),
                Box::new(self.input(block, "OPERAND2")?),
            ),
            Opcode::Or => Expr::Or(
                Box::new(self.input(block, "OPERAND1")?),
                Box::new(self.input(block, "OPERAND2")?),
            ),
            Opcode::Not => Expr::Not(Box::new(self.input(block, "OPERAND")?)),
            other => {
                self.scope
                    .warn(block, WarningKind::UnsupportedOpcode(other.to_string()));
                Expr::Bool(false)
            }
        };
        self.path.remove(&block.id);
        Ok(expr)
    }
}

fn compare(scope: &mut ActorScope<'_>, block: &Block, op: CompareOp) -> Result<Expr, CompileError> {
    let left = operand(scope, block, "OPERAND1")?;
    let right = operand(scope, block, "OPERAND2")?;
    Ok(match (literal(&left), literal(&right)) {
        (Expr::Number(l), Expr::Number(r)) => Expr::NumCompare {
            op,
            left: l,
            right: r,
        },
        _ => Expr::TextCompare { op, left, right },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::BlockMap;

    const LIMIT: usize = 256;

    fn scope_of(blocks: &BlockMap) -> ActorScope<'_> {
        ActorScope::new(0, "Sprite1", blocks)
    }

    #[test]
    fn key_pressed_maps_named_keys() {
        let blocks: BlockMap = [
            Block::new("c", Opcode::KeyPressed).with_block_input("KEY_OPTION", "m"),
            Block::new("m", Opcode::KeyOptions).with_field("KEY_OPTION", "left arrow"),
        ]
        .into_iter()
        .collect();
        let mut scope = scope_of(&blocks);
        let expr = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap();
        assert_eq!(expr, Expr::ButtonHeld(Button::Left));
        assert!(scope.warnings().is_empty());
    }

    #[test]
    fn unmapped_keys_fall_back_to_default_button() {
        for key in ["a", "enter", "Space", "", "any"] {
            let blocks: BlockMap = [Block::new("c", Opcode::KeyPressed).with_literal("KEY_OPTION", key)]
                .into_iter()
                .collect();
            let mut scope = scope_of(&blocks);
            let expr = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap();
            assert_eq!(expr, Expr::ButtonHeld(DEFAULT_BUTTON), "key {:?}", key);
            assert_eq!(
                scope.warnings()[0].kind,
                WarningKind::UnmappedKey(key.to_string())
            );
        }
    }

    #[test]
    fn equality_is_numeric_only_when_both_sides_parse() {
        let blocks: BlockMap = [
            Block::new("n", Opcode::Equals)
                .with_literal("OPERAND1", "10")
                .with_literal("OPERAND2", " 1e1 "),
            Block::new("t", Opcode::Equals)
                .with_literal("OPERAND1", "10")
                .with_literal("OPERAND2", "ten"),
        ]
        .into_iter()
        .collect();
        let mut scope = scope_of(&blocks);
        assert_eq!(
            condition_expr(&mut scope, blocks.get("n").unwrap(), LIMIT).unwrap(),
            Expr::NumCompare {
                op: CompareOp::Eq,
                left: 10.0,
                right: 10.0
            }
        );
        assert_eq!(
            condition_expr(&mut scope, blocks.get("t").unwrap(), LIMIT).unwrap(),
            Expr::TextCompare {
                op: CompareOp::Eq,
                left: "10".to_string(),
                right: "ten".to_string()
            }
        );
    }

    #[test]
    fn unknown_condition_is_false_with_warning() {
        let blocks: BlockMap = [Block::new("c", Opcode::Unsupported("sensing_touchingobject".into()))]
            .into_iter()
            .collect();
        let mut scope = scope_of(&blocks);
        let expr = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap();
        assert_eq!(expr, Expr::Bool(false));
        assert_eq!(scope.warnings().len(), 1);
    }

    #[test]
    fn dangling_operand_is_an_error() {
        let blocks: BlockMap = [Block::new("c", Opcode::Not).with_block_input("OPERAND", "gone")]
            .into_iter()
            .collect();
        let mut scope = scope_of(&blocks);
        let err = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap_err();
        assert!(matches!(err, CompileError::MissingBlock { ref missing, .. } if missing == "gone"));
    }

    #[test]
    fn self_referencing_condition_is_a_cycle() {
        let blocks: BlockMap = [Block::new("c", Opcode::Not).with_block_input("OPERAND", "c")]
            .into_iter()
            .collect();
        let mut scope = scope_of(&blocks);
        let err = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap_err();
        assert!(matches!(err, CompileError::Cycle { .. }));
    }

    #[test]
    fn condition_cycle_in_a_large_sprite_fails_cleanly() {
        let mut blocks: BlockMap = (0..200_000)
            .map(|i| Block::new(format!("f{}", i), Opcode::MoveSteps).with_literal("STEPS", "1"))
            .collect();
        blocks.insert(Block::new("c", Opcode::Not).with_block_input("OPERAND", "c"));
        let mut scope = scope_of(&blocks);
        let err = condition_expr(&mut scope, blocks.get("c").unwrap(), LIMIT).unwrap_err();
        assert!(matches!(err, CompileError::Cycle { ref block, .. } if block == "c"));
    }

    #[test]
    fn long_operand_chains_stop_at_the_limit() {
        let blocks: BlockMap = (0..1000)
            .map(|i| {
                Block::new(format!("n{}", i), Opcode::Not)
                    .with_block_input("OPERAND", format!("n{}", i + 1))
            })
            .collect();
        let mut scope = scope_of(&blocks);
        let err = condition_expr(&mut scope, blocks.get("n0").unwrap(), 16).unwrap_err();
        assert!(matches!(err, CompileError::TooDeep { limit: 16, .. }));
    }

    #[test]
    fn shared_operands_are_not_cycles() {
        let blocks: BlockMap = [
            Block::new("and", Opcode::And)
                .with_block_input("OPERAND1", "k")
                .with_block_input("OPERAND2", "k"),
            Block::new("k", Opcode::KeyPressed).with_literal("KEY_OPTION", "up arrow"),
        ]
        .into_iter()
        .collect();
        let mut scope = scope_of(&blocks);
        let expr = condition_expr(&mut scope, blocks.get("and").unwrap(), LIMIT).unwrap();
        assert_eq!(
            expr,
            Expr::And(
                Box::new(Expr::ButtonHeld(Button::Up)),
                Box::new(Expr::ButtonHeld(Button::Up))
            )
        );
    }

    #[test]
    fn number_input_rejects_text() {
        let blocks: BlockMap = [
            Block::new("w", Opcode::Wait).with_literal("DURATION", "soon"),
            Block::new("e", Opcode::Wait).with_literal("DURATION", ""),
        ]
        .into_iter()
        .collect();
        let mut scope = scope_of(&blocks);
        let err = number_input(&mut scope, blocks.get("w").unwrap(), "DURATION").unwrap_err();
        assert!(matches!(err, CompileError::InvalidNumber { ref text, .. } if text == "soon"));
        assert_eq!(
            number_input(&mut scope, blocks.get("e").unwrap(), "DURATION").unwrap(),
            0.0
        );
    }

    #[test]
    fn literals_are_typed() {
        assert_eq!(literal("2.5"), Expr::Number(2.5));
        assert_eq!(literal("hello"), Expr::Text("hello".to_string()));
        assert_eq!(literal("inf"), Expr::Text("inf".to_string()));
    }
}
