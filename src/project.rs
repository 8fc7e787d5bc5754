use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

pub type BlockId = String;

/// Opcodes the compiler knows about. Anything else is kept as `Unsupported`
/// so lowering can skip it with a warning instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    WhenFlagClicked,
    WhenKeyPressed,
    MoveSteps,
    TurnRight,
    TurnLeft,
    GoToXY,
    SetX,
    SetY,
    ChangeXBy,
    ChangeYBy,
    GlideToXY,
    Wait,
    Say,
    Repeat,
    Forever,
    If,
    IfElse,
    KeyPressed,
    KeyOptions,
    Equals,
    LessThan,
    GreaterThan,
    And,
    Or,
    Not,
    Unsupported(String),
}

impl Opcode {
    pub fn parse(opcode: &str) -> Self {
        match opcode {
            "event_whenflagclicked" => Opcode::WhenFlagClicked,
            "event_whenkeypressed" => Opcode::WhenKeyPressed,
            "motion_movesteps" => Opcode::MoveSteps,
            "motion_turnright" => Opcode::TurnRight,
            "motion_turnleft" => Opcode::TurnLeft,
            "motion_gotoxy" => Opcode::GoToXY,
            "motion_setx" => Opcode::SetX,
            "motion_sety" => Opcode::SetY,
            "motion_changexby" => Opcode::ChangeXBy,
            "motion_changeyby" => Opcode::ChangeYBy,
            "motion_glidesecstoxy" => Opcode::GlideToXY,
            "control_wait" => Opcode::Wait,
            "looks_say" => Opcode::Say,
            "control_repeat" => Opcode::Repeat,
            "control_forever" => Opcode::Forever,
            "control_if" => Opcode::If,
            "control_if_else" => Opcode::IfElse,
            "sensing_keypressed" => Opcode::KeyPressed,
            "sensing_keyoptions" => Opcode::KeyOptions,
            "operator_equals" => Opcode::Equals,
            "operator_lt" => Opcode::LessThan,
            "operator_gt" => Opcode::GreaterThan,
            "operator_and" => Opcode::And,
            "operator_or" => Opcode::Or,
            "operator_not" => Opcode::Not,
            other => Opcode::Unsupported(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Opcode::WhenFlagClicked => "event_whenflagclicked",
            Opcode::WhenKeyPressed => "event_whenkeypressed",
            Opcode::MoveSteps => "motion_movesteps",
            Opcode::TurnRight => "motion_turnright",
            Opcode::TurnLeft => "motion_turnleft",
            Opcode::GoToXY => "motion_gotoxy",
            Opcode::SetX => "motion_setx",
            Opcode::SetY => "motion_sety",
            Opcode::ChangeXBy => "motion_changexby",
            Opcode::ChangeYBy => "motion_changeyby",
            Opcode::GlideToXY => "motion_glidesecstoxy",
            Opcode::Wait => "control_wait",
            Opcode::Say => "looks_say",
            Opcode::Repeat => "control_repeat",
            Opcode::Forever => "control_forever",
            Opcode::If => "control_if",
            Opcode::IfElse => "control_if_else",
            Opcode::KeyPressed => "sensing_keypressed",
            Opcode::KeyOptions => "sensing_keyoptions",
            Opcode::Equals => "operator_equals",
            Opcode::LessThan => "operator_lt",
            Opcode::GreaterThan => "operator_gt",
            Opcode::And => "operator_and",
            Opcode::Or => "operator_or",
            Opcode::Not => "operator_not",
            Opcode::Unsupported(raw) => raw,
        }
    }

    pub fn is_entry_point(&self) -> bool {
        matches!(self, Opcode::WhenFlagClicked | Opcode::WhenKeyPressed)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Literal(String),
    Block(BlockId),
    /// Variable, list or broadcast reporter stored inline in the input array.
    Reporter(String),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub opcode: Opcode,
    pub inputs: HashMap<String, InputValue>,
    pub fields: HashMap<String, String>,
    pub next: Option<BlockId>,
    pub substack: Option<BlockId>,
    pub substack2: Option<BlockId>,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, opcode: Opcode) -> Self {
        Self {
            id: id.into(),
            opcode,
            inputs: HashMap::new(),
            fields: HashMap::new(),
            next: None,
            substack: None,
            substack2: None,
        }
    }

    pub fn with_literal(mut self, name: &str, text: impl Into<String>) -> Self {
        self.inputs
            .insert(name.to_string(), InputValue::Literal(text.into()));
        self
    }

    pub fn with_block_input(mut self, name: &str, id: impl Into<BlockId>) -> Self {
        self.inputs.insert(name.to_string(), InputValue::Block(id.into()));
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn with_next(mut self, id: impl Into<BlockId>) -> Self {
        self.next = Some(id.into());
        self
    }

    pub fn with_substack(mut self, id: impl Into<BlockId>) -> Self {
        self.substack = Some(id.into());
        self
    }

    pub fn with_substack2(mut self, id: impl Into<BlockId>) -> Self {
        self.substack2 = Some(id.into());
        self
    }

    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Blocks of one actor, keyed by id, iterated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockMap {
    blocks: Vec<Block>,
    index: HashMap<BlockId, usize>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a block; a second block with the same id replaces the first
    /// in place.
    pub fn insert(&mut self, block: Block) {
        if let Some(&slot) = self.index.get(&block.id) {
            self.blocks[slot] = block;
            return;
        }
        self.index.insert(block.id.clone(), self.blocks.len());
        self.blocks.push(block);
    }

    pub fn get(&self, id: &str) -> Option<&Block> {
        self.index.get(id).map(|&slot| &self.blocks[slot])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl FromIterator<Block> for BlockMap {
    fn from_iter<T: IntoIterator<Item = Block>>(iter: T) -> Self {
        let mut map = BlockMap::new();
        for block in iter {
            map.insert(block);
        }
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub name: String,
    pub is_stage: bool,
    pub x: f64,
    pub y: f64,
    pub blocks: BlockMap,
}

impl Actor {
    pub fn sprite(name: impl Into<String>, blocks: BlockMap) -> Self {
        Self {
            name: name.into(),
            is_stage: false,
            x: 0.0,
            y: 0.0,
            blocks,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Project {
    pub actors: Vec<Actor>,
}

impl Project {
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("Invalid project.json.")?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let targets = value
            .get("targets")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Invalid project.json: missing 'targets' array."))?;
        let mut actors = Vec::with_capacity(targets.len());
        let mut sprite_count = 0usize;
        for target in targets {
            let actor = read_actor(target, sprite_count)?;
            if !actor.is_stage {
                sprite_count += 1;
            }
            actors.push(actor);
        }
        Ok(Self { actors })
    }

    /// Non-stage actors in project order; their position in this sequence is
    /// the actor's slot in the emitted state array.
    pub fn sprites(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter().filter(|actor| !actor.is_stage)
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites().count()
    }
}

fn read_actor(target: &Value, sprite_index: usize) -> Result<Actor> {
    let is_stage = target
        .get("isStage")
        .and_then(Value::as_bool)
        .ok_or_else(|| anyhow!("Target #{} missing isStage.", sprite_index))?;
    let name = target
        .get("name")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .unwrap_or_else(|| {
            if is_stage {
                "Stage".to_string()
            } else {
                format!("Sprite{}", sprite_index + 1)
            }
        });
    let blocks_obj = target
        .get("blocks")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("Target '{}' missing blocks object.", name))?;

    let x = target.get("x").and_then(Value::as_f64).unwrap_or(0.0);
    let y = target.get("y").and_then(Value::as_f64).unwrap_or(0.0);

    Ok(Actor {
        name,
        is_stage,
        x,
        y,
        blocks: read_blocks(blocks_obj),
    })
}

fn read_blocks(blocks_obj: &Map<String, Value>) -> BlockMap {
    blocks_obj
        .iter()
        .filter_map(|(id, block)| read_block(id, block))
        .collect()
}

fn read_block(id: &str, block: &Value) -> Option<Block> {
    // Top-level variable reporters are stored as bare arrays.
    let obj = block.as_object()?;
    let opcode = Opcode::parse(obj.get("opcode").and_then(Value::as_str).unwrap_or(""));
    let mut out = Block::new(id, opcode);
    out.next = obj
        .get("next")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    if let Some(inputs) = obj.get("inputs").and_then(Value::as_object) {
        for (name, raw) in inputs {
            let value = read_input(raw);
            match name.as_str() {
                "SUBSTACK" => out.substack = block_link(value),
                "SUBSTACK2" => out.substack2 = block_link(value),
                _ => {
                    out.inputs.insert(name.clone(), value);
                }
            }
        }
    }

    if let Some(fields) = obj.get("fields").and_then(Value::as_object) {
        for (name, raw) in fields {
            if let Some(value) = field_first_string(raw) {
                out.fields.insert(name.clone(), value);
            }
        }
    }

    Some(out)
}

fn block_link(value: InputValue) -> Option<BlockId> {
    match value {
        InputValue::Block(id) => Some(id),
        _ => None,
    }
}

fn read_input(raw: &Value) -> InputValue {
    if let Some(block_id) = raw.as_str() {
        return InputValue::Block(block_id.to_string());
    }
    let Some(arr) = raw.as_array() else {
        return InputValue::Empty;
    };
    if arr.len() < 2 {
        return InputValue::Empty;
    }
    match arr[0].as_i64().unwrap_or_default() {
        1..=3 => match &arr[1] {
            Value::String(block_id) => InputValue::Block(block_id.clone()),
            Value::Array(primitive) => read_primitive(primitive),
            // Obscured shadow with no block on top: fall back to the shadow.
            Value::Null => arr.get(2).map(read_input_payload).unwrap_or(InputValue::Empty),
            _ => InputValue::Empty,
        },
        _ => InputValue::Empty,
    }
}

fn read_input_payload(payload: &Value) -> InputValue {
    match payload {
        Value::String(block_id) => InputValue::Block(block_id.clone()),
        Value::Array(primitive) => read_primitive(primitive),
        _ => InputValue::Empty,
    }
}

fn read_primitive(primitive: &[Value]) -> InputValue {
    if primitive.len() < 2 {
        return InputValue::Empty;
    }
    match primitive[0].as_i64().unwrap_or_default() {
        4..=10 => InputValue::Literal(value_text(&primitive[1])),
        11..=13 => InputValue::Reporter(value_text(&primitive[1])),
        _ => InputValue::Empty,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn field_first_string(value: &Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    let arr = value.as_array()?;
    arr.first()?.as_str().map(ToString::to_string)
}
