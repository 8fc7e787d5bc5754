use crate::emit::assemble;
use crate::error::{CompileFailure, Warning};
use crate::expr::Button;
use crate::project::Project;
use crate::unit::{build_unit, entry_points, ExecutionUnit};
use log::{info, warn};

pub const DEFAULT_GLIDE_STEPS: u32 = 30;
pub const DEFAULT_MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// Animation steps a glide is split into.
    pub glide_steps: u32,
    /// Deepest loop/conditional nesting accepted before the script is
    /// treated as malformed.
    pub max_nesting: usize,
    /// Button that ends the program.
    pub exit_button: Button,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            glide_steps: DEFAULT_GLIDE_STEPS,
            max_nesting: DEFAULT_MAX_NESTING,
            exit_button: Button::Plus,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compilation {
    pub units: Vec<ExecutionUnit>,
    pub program: String,
    pub warnings: Vec<Warning>,
}

pub fn compile(project: &Project, options: CompileOptions) -> Result<Compilation, CompileFailure> {
    let (units, warnings) = build_units(project, &options)?;
    let program = assemble(&units, &options);
    info!(
        "compiled {} sprite(s), {} task(s), {} warning(s)",
        units.len(),
        units.iter().map(|u| u.tasks.len()).sum::<usize>(),
        warnings.len()
    );
    Ok(Compilation {
        units,
        program,
        warnings,
    })
}

/// Builds one unit per sprite. A failing sprite does not stop the others from
/// being checked, but any failure fails the whole build.
pub fn build_units(
    project: &Project,
    options: &CompileOptions,
) -> Result<(Vec<ExecutionUnit>, Vec<Warning>), CompileFailure> {
    for stage in project.actors.iter().filter(|actor| actor.is_stage) {
        let ignored = entry_points(stage).count();
        if ignored > 0 {
            warn!("stage '{}': {} script(s) ignored", stage.name, ignored);
        }
    }

    let mut units = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for (slot, actor) in project.sprites().enumerate() {
        let report = build_unit(slot, actor, options);
        warnings.extend(report.warnings);
        match report.unit {
            Ok(unit) => units.push(unit),
            Err(err) => errors.push(err),
        }
    }

    if !errors.is_empty() {
        return Err(CompileFailure { errors, warnings });
    }
    Ok((units, warnings))
}
