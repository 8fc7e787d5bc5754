use crate::error::{CompileError, Warning, WarningKind};
use crate::project::{Block, BlockMap};
use log::warn;

/// Per-actor translation state: the actor's block graph plus the warnings
/// collected while translating it.
pub struct ActorScope<'a> {
    pub actor: usize,
    pub name: &'a str,
    pub blocks: &'a BlockMap,
    warnings: Vec<Warning>,
}

impl<'a> ActorScope<'a> {
    pub fn new(actor: usize, name: &'a str, blocks: &'a BlockMap) -> Self {
        Self {
            actor,
            name,
            blocks,
            warnings: Vec::new(),
        }
    }

    /// Follows the `link` of `from` to block `id` within the same actor.
    pub fn resolve(&self, from: &Block, link: &str, id: &str) -> Result<&'a Block, CompileError> {
        self.blocks
            .get(id)
            .ok_or_else(|| CompileError::MissingBlock {
                actor: self.actor,
                actor_name: self.name.to_string(),
                block: from.id.clone(),
                opcode: from.opcode.to_string(),
                link: link.to_string(),
                missing: id.to_string(),
            })
    }

    pub fn warn(&mut self, block: &Block, kind: WarningKind) {
        warn!("sprite '{}' block '{}': {}", self.name, block.id, kind);
        self.warnings.push(Warning {
            actor: self.actor,
            actor_name: self.name.to_string(),
            block: block.id.clone(),
            kind,
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub fn cycle(&self, block: &Block) -> CompileError {
        CompileError::Cycle {
            actor: self.actor,
            actor_name: self.name.to_string(),
            block: block.id.clone(),
        }
    }

    pub fn too_deep(&self, block: &Block, limit: usize) -> CompileError {
        CompileError::TooDeep {
            actor: self.actor,
            actor_name: self.name.to_string(),
            block: block.id.clone(),
            limit,
        }
    }

    pub fn invalid_number(&self, block: &Block, input: &str, text: &str) -> CompileError {
        CompileError::InvalidNumber {
            actor: self.actor,
            actor_name: self.name.to_string(),
            block: block.id.clone(),
            opcode: block.opcode.to_string(),
            input: input.to_string(),
            text: text.to_string(),
        }
    }
}
