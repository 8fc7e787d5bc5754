use crate::compiler::CompileOptions;
use crate::error::{CompileError, Warning};
use crate::expr::{key_button, Button};
use crate::lower::{lower_script, Stmt};
use crate::project::{Actor, Block, BlockId, Opcode};
use crate::scope::ActorScope;
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    FlagClicked,
    /// Runs the body each time the button is seen held.
    KeyPressed(Button),
}

/// One independently scheduled statement sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub entry: BlockId,
    pub trigger: Trigger,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionUnit {
    /// Slot of the actor in the emitted state array.
    pub actor: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: Result<ExecutionUnit, CompileError>,
    pub warnings: Vec<Warning>,
}

/// Entry blocks of an actor in block insertion order.
pub fn entry_points(actor: &Actor) -> impl Iterator<Item = &Block> {
    actor.blocks.iter().filter(|block| block.opcode.is_entry_point())
}

pub fn build_unit(slot: usize, actor: &Actor, options: &CompileOptions) -> UnitReport {
    let mut scope = ActorScope::new(slot, &actor.name, &actor.blocks);
    let unit = build_tasks(&mut scope, actor, options).map(|tasks| ExecutionUnit {
        actor: slot,
        name: actor.name.clone(),
        x: actor.x,
        y: actor.y,
        tasks,
    });
    match &unit {
        Ok(unit) => debug!(
            "sprite '{}' (#{}): {} task(s), {} top-level statement(s)",
            unit.name,
            slot,
            unit.tasks.len(),
            unit.tasks.iter().map(|t| t.body.len()).sum::<usize>()
        ),
        Err(err) => debug!("sprite '{}' (#{}) failed: {}", actor.name, slot, err),
    }
    UnitReport {
        unit,
        warnings: scope.into_warnings(),
    }
}

fn build_tasks(
    scope: &mut ActorScope<'_>,
    actor: &Actor,
    options: &CompileOptions,
) -> Result<Vec<Task>, CompileError> {
    let mut tasks = Vec::new();
    for entry in entry_points(actor) {
        let trigger = match &entry.opcode {
            Opcode::WhenKeyPressed => Trigger::KeyPressed(key_button(scope, entry)?),
            _ => Trigger::FlagClicked,
        };
        let body = lower_script(scope, entry, options)?;
        tasks.push(Task {
            entry: entry.id.clone(),
            trigger,
            body,
        });
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::Axis;
    use crate::project::BlockMap;
    use std::time::Duration;

    fn sprite(blocks: Vec<Block>) -> Actor {
        Actor::sprite("Cat", blocks.into_iter().collect::<BlockMap>()).at(10.0, -5.0)
    }

    #[test]
    fn flag_script_becomes_one_task() {
        let actor = sprite(vec![
            Block::new("hat", Opcode::WhenFlagClicked).with_next("mv"),
            Block::new("mv", Opcode::MoveSteps)
                .with_literal("STEPS", "10")
                .with_next("w"),
            Block::new("w", Opcode::Wait)
                .with_literal("DURATION", "1")
                .with_next("say"),
            Block::new("say", Opcode::Say).with_literal("MESSAGE", "hi"),
        ]);
        let report = build_unit(0, &actor, &CompileOptions::default());
        let unit = report.unit.unwrap();
        assert_eq!(unit.actor, 0);
        assert_eq!((unit.x, unit.y), (10.0, -5.0));
        assert_eq!(unit.tasks.len(), 1);
        assert_eq!(unit.tasks[0].trigger, Trigger::FlagClicked);
        assert_eq!(
            unit.tasks[0].body,
            vec![
                Stmt::Change { axis: Axis::X, delta: 10.0 },
                Stmt::Present,
                Stmt::Sleep(Duration::from_millis(1000)),
                Stmt::Say {
                    actor: 0,
                    text: "hi".to_string()
                },
            ]
        );
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn every_entry_point_is_its_own_task_in_insertion_order() {
        let actor = sprite(vec![
            Block::new("b-hat", Opcode::WhenKeyPressed)
                .with_field("KEY_OPTION", "right arrow")
                .with_next("b"),
            Block::new("b", Opcode::ChangeXBy).with_literal("DX", "2"),
            Block::new("a-hat", Opcode::WhenFlagClicked).with_next("a"),
            Block::new("a", Opcode::ChangeYBy).with_literal("DY", "1"),
        ]);
        let unit = build_unit(3, &actor, &CompileOptions::default()).unit.unwrap();
        let entries = unit.tasks.iter().map(|t| t.entry.as_str()).collect::<Vec<_>>();
        assert_eq!(entries, vec!["b-hat", "a-hat"]);
        assert_eq!(unit.tasks[0].trigger, Trigger::KeyPressed(Button::Right));
        assert_eq!(unit.tasks[1].trigger, Trigger::FlagClicked);
    }

    #[test]
    fn actor_without_entry_points_is_inert() {
        let actor = sprite(vec![Block::new("mv", Opcode::MoveSteps).with_literal("STEPS", "1")]);
        let unit = build_unit(0, &actor, &CompileOptions::default()).unit.unwrap();
        assert!(unit.tasks.is_empty());
    }

    #[test]
    fn entry_without_body_is_an_empty_task() {
        let actor = sprite(vec![Block::new("hat", Opcode::WhenFlagClicked)]);
        let unit = build_unit(0, &actor, &CompileOptions::default()).unit.unwrap();
        assert_eq!(unit.tasks.len(), 1);
        assert!(unit.tasks[0].body.is_empty());
    }

    #[test]
    fn broken_script_fails_the_unit_but_keeps_warnings() {
        let actor = sprite(vec![
            Block::new("hat", Opcode::WhenFlagClicked).with_next("odd"),
            Block::new("odd", Opcode::Unsupported("looks_show".into())).with_next("missing"),
        ]);
        let report = build_unit(0, &actor, &CompileOptions::default());
        let err = report.unit.unwrap_err();
        assert_eq!(err.block(), "odd");
        assert_eq!(report.warnings.len(), 1);
    }
}
