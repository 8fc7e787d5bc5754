use crate::project::BlockId;
use thiserror::Error;

/// Hard failures. Any of these aborts the actor it was found in, and the
/// compile as a whole produces no program text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(
        "sprite '{actor_name}' (#{actor}): block '{block}' ({opcode}) references missing block '{missing}' through '{link}'"
    )]
    MissingBlock {
        actor: usize,
        actor_name: String,
        block: BlockId,
        opcode: String,
        link: String,
        missing: BlockId,
    },

    #[error("sprite '{actor_name}' (#{actor}): block '{block}' is reached twice, the script contains a cycle")]
    Cycle {
        actor: usize,
        actor_name: String,
        block: BlockId,
    },

    #[error("sprite '{actor_name}' (#{actor}): nesting at block '{block}' exceeds {limit} levels")]
    TooDeep {
        actor: usize,
        actor_name: String,
        block: BlockId,
        limit: usize,
    },

    #[error(
        "sprite '{actor_name}' (#{actor}): block '{block}' ({opcode}) input {input}: expected a number, found {text:?}"
    )]
    InvalidNumber {
        actor: usize,
        actor_name: String,
        block: BlockId,
        opcode: String,
        input: String,
        text: String,
    },
}

impl CompileError {
    pub fn actor(&self) -> usize {
        match self {
            CompileError::MissingBlock { actor, .. }
            | CompileError::Cycle { actor, .. }
            | CompileError::TooDeep { actor, .. }
            | CompileError::InvalidNumber { actor, .. } => *actor,
        }
    }

    /// The block the error was detected on.
    pub fn block(&self) -> &str {
        match self {
            CompileError::MissingBlock { block, .. }
            | CompileError::Cycle { block, .. }
            | CompileError::TooDeep { block, .. }
            | CompileError::InvalidNumber { block, .. } => block,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarningKind {
    #[error("unsupported opcode '{0}' skipped")]
    UnsupportedOpcode(String),
    #[error("unsupported reporter '{0}' read as 0")]
    UnsupportedReporter(String),
    #[error("key '{0}' has no button mapping, using the default button")]
    UnmappedKey(String),
}

/// A construct that was translated to a safe default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("sprite '{actor_name}' (#{actor}): block '{block}': {kind}")]
pub struct Warning {
    pub actor: usize,
    pub actor_name: String,
    pub block: BlockId,
    pub kind: WarningKind,
}

/// Every error found across the project, with the warnings gathered on the
/// way. The first error leads the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compile failed{}", summary(.errors))]
pub struct CompileFailure {
    pub errors: Vec<CompileError>,
    pub warnings: Vec<Warning>,
}

fn summary(errors: &[CompileError]) -> String {
    match errors {
        [] => String::new(),
        [only] => format!(": {}", only),
        [first, rest @ ..] => format!(": {} (and {} more error(s))", first, rest.len()),
    }
}
