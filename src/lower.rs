use crate::compiler::CompileOptions;
use crate::error::{CompileError, WarningKind};
use crate::expr::{condition_input, number_input, text_input, Expr};
use crate::project::{Block, BlockId, Opcode};
use crate::scope::ActorScope;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// One emit-ready statement. Loop and conditional bodies are nested
/// sequences, so the shape of the block tree survives lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Change {
        axis: Axis,
        delta: f64,
    },
    Set {
        axis: Axis,
        value: f64,
    },
    /// Present the current frame.
    Present,
    Sleep(Duration),
    Say {
        actor: usize,
        text: String,
    },
    Repeat {
        times: u64,
        body: Vec<Stmt>,
    },
    Forever {
        body: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    Glide {
        x: f64,
        y: f64,
        steps: u32,
        step: Duration,
    },
}

impl Stmt {
    /// Deepest loop/conditional nesting in this statement.
    pub fn nesting_depth(&self) -> usize {
        match self {
            Stmt::Repeat { body, .. } | Stmt::Forever { body } => 1 + nesting_depth(body),
            Stmt::If {
                then_body,
                else_body,
                ..
            } => 1 + nesting_depth(then_body).max(nesting_depth(else_body)),
            _ => 0,
        }
    }
}

pub fn nesting_depth(stmts: &[Stmt]) -> usize {
    stmts.iter().map(Stmt::nesting_depth).max().unwrap_or(0)
}

/// Lowers the chain starting at `start` into statements.
pub fn lower(
    scope: &mut ActorScope<'_>,
    start: &str,
    options: &CompileOptions,
) -> Result<Vec<Stmt>, CompileError> {
    let first = scope.blocks.get(start).ok_or_else(|| CompileError::MissingBlock {
        actor: scope.actor,
        actor_name: scope.name.to_string(),
        block: start.to_string(),
        opcode: "start".to_string(),
        link: "start".to_string(),
        missing: start.to_string(),
    })?;
    Lowerer::new(scope, options).chain(first, 0)
}

/// Lowers the script hanging under an entry block. The entry block itself
/// emits nothing.
pub fn lower_script(
    scope: &mut ActorScope<'_>,
    entry: &Block,
    options: &CompileOptions,
) -> Result<Vec<Stmt>, CompileError> {
    let first = match entry.next.as_deref() {
        Some(id) => scope.resolve(entry, "next", id)?,
        None => return Ok(Vec::new()),
    };
    let mut lowerer = Lowerer::new(scope, options);
    lowerer.visited.insert(entry.id.clone());
    lowerer.chain(first, 0)
}

struct Lowerer<'s, 'a> {
    scope: &'s mut ActorScope<'a>,
    visited: HashSet<BlockId>,
    max_nesting: usize,
    glide_steps: u32,
}

impl<'s, 'a> Lowerer<'s, 'a> {
    fn new(scope: &'s mut ActorScope<'a>, options: &CompileOptions) -> Self {
        Self {
            scope,
            visited: HashSet::new(),
            max_nesting: options.max_nesting,
            glide_steps: options.glide_steps.max(1),
        }
    }

    fn chain(&mut self, first: &'a Block, depth: usize) -> Result<Vec<Stmt>, CompileError> {
        if depth > self.max_nesting {
            return Err(self.scope.too_deep(first, self.max_nesting));
        }
        let mut out = Vec::new();
        let mut current = Some(first);
        while let Some(block) = current {
            if !self.visited.insert(block.id.clone()) {
                return Err(self.scope.cycle(block));
            }
            self.statement(block, depth, &mut out)?;
            current = match &block.next {
                Some(id) => Some(self.scope.resolve(block, "next", id)?),
                None => None,
            };
        }
        Ok(out)
    }

    /// Lowers the chain `owner` links to through `link`, one level deeper.
    fn body(
        &mut self,
        owner: &Block,
        link: &str,
        start: Option<&str>,
        depth: usize,
    ) -> Result<Vec<Stmt>, CompileError> {
        match start {
            Some(id) => {
                let first = self.scope.resolve(owner, link, id)?;
                self.chain(first, depth + 1)
            }
            None => Ok(Vec::new()),
        }
    }

    fn statement(&mut self, block: &'a Block, depth: usize, out: &mut Vec<Stmt>) -> Result<(), CompileError> {
        match &block.opcode {
            Opcode::MoveSteps => out.push(Stmt::Change {
                axis: Axis::X,
                delta: self.number(block, "STEPS")?,
            }),
            // Rotation is approximated as a nudge on the y axis.
            Opcode::TurnRight => out.push(Stmt::Change {
                axis: Axis::Y,
                delta: self.number(block, "DEGREES")? / 10.0,
            }),
            Opcode::TurnLeft => out.push(Stmt::Change {
                axis: Axis::Y,
                delta: -self.number(block, "DEGREES")? / 10.0,
            }),
            Opcode::GoToXY => {
                let x = self.number(block, "X")?;
                let y = self.number(block, "Y")?;
                out.push(Stmt::Set { axis: Axis::X, value: x });
                out.push(Stmt::Set { axis: Axis::Y, value: y });
            }
            Opcode::SetX => out.push(Stmt::Set {
                axis: Axis::X,
                value: self.number(block, "X")?,
            }),
            Opcode::SetY => out.push(Stmt::Set {
                axis: Axis::Y,
                value: self.number(block, "Y")?,
            }),
            Opcode::ChangeXBy => out.push(Stmt::Change {
                axis: Axis::X,
                delta: self.number(block, "DX")?,
            }),
            Opcode::ChangeYBy => out.push(Stmt::Change {
                axis: Axis::Y,
                delta: self.number(block, "DY")?,
            }),
            Opcode::Wait => {
                let secs = self.number(block, "DURATION")?;
                out.push(Stmt::Present);
                out.push(Stmt::Sleep(seconds_to_millis(secs)));
            }
            Opcode::Say => out.push(Stmt::Say {
                actor: self.scope.actor,
                text: text_input(self.scope, block, "MESSAGE")?,
            }),
            Opcode::GlideToXY => {
                let secs = self.number(block, "SECS")?;
                let x = self.number(block, "X")?;
                let y = self.number(block, "Y")?;
                out.push(Stmt::Glide {
                    x,
                    y,
                    steps: self.glide_steps,
                    step: glide_step(secs, self.glide_steps),
                });
            }
            Opcode::Repeat => {
                let times = self.number(block, "TIMES")?.round().max(0.0) as u64;
                let body = self.body(block, "SUBSTACK", block.substack.as_deref(), depth)?;
                out.push(Stmt::Repeat { times, body });
            }
            Opcode::Forever => {
                let body = self.body(block, "SUBSTACK", block.substack.as_deref(), depth)?;
                out.push(Stmt::Forever { body });
            }
            Opcode::If => {
                let condition = condition_input(self.scope, block, "CONDITION", self.max_nesting)?;
                let then_body = self.body(block, "SUBSTACK", block.substack.as_deref(), depth)?;
                out.push(Stmt::If {
                    condition,
                    then_body,
                    else_body: Vec::new(),
                });
            }
            Opcode::IfElse => {
                let condition = condition_input(self.scope, block, "CONDITION", self.max_nesting)?;
                let then_body = self.body(block, "SUBSTACK", block.substack.as_deref(), depth)?;
                let else_body = self.body(block, "SUBSTACK2", block.substack2.as_deref(), depth)?;
                out.push(Stmt::If {
                    condition,
                    then_body,
                    else_body,
                });
            }
            Opcode::WhenFlagClicked
            | Opcode::WhenKeyPressed
            | Opcode::KeyPressed
            | Opcode::KeyOptions
            | Opcode::Equals
            | Opcode::LessThan
            | Opcode::GreaterThan
            | Opcode::And
            | Opcode::Or
            | Opcode::Not
            | Opcode::Unsupported(_) => {
                self.scope
                    .warn(block, WarningKind::UnsupportedOpcode(block.opcode.to_string()));
            }
        }
        Ok(())
    }

    fn number(&mut self, block: &Block, input: &str) -> Result<f64, CompileError> {
        number_input(self.scope, block, input)
    }
}

/// Whole milliseconds, rounded. Negative durations wait for nothing.
pub fn seconds_to_millis(secs: f64) -> Duration {
    Duration::from_millis((secs.max(0.0) * 1000.0).round() as u64)
}

fn glide_step(secs: f64, steps: u32) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0) / f64::from(steps)).unwrap_or(Duration::MAX)
}
