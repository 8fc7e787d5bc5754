pub mod compiler;
pub mod emit;
pub mod error;
pub mod expr;
pub mod lower;
pub mod project;
pub mod sb3;
pub mod scope;
pub mod unit;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use anyhow::{Context, Result};
use compiler::{Compilation, CompileOptions};
use project::Project;
use std::path::{Path, PathBuf};

pub const DEFAULT_OUTPUT_NAME: &str = "main.c";

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let total_stages = 3 + usize::from(!args.print);
    let progress = CliProgress::new("Compile", total_stages);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Resolving input path");
    let input = canonicalize_file(&args.input)?;

    stage += 1;
    progress.emit(stage, "Loading project");
    let project = sb3::load_project(&input)?;

    stage += 1;
    progress.emit(stage, "Translating scripts");
    let options = CompileOptions {
        glide_steps: args.glide_steps,
        ..CompileOptions::default()
    };
    let compilation = match compiler::compile(&project, options) {
        Ok(compilation) => compilation,
        Err(failure) => {
            for warning in &failure.warnings {
                eprintln!("warning: {}", warning);
            }
            for err in &failure.errors {
                eprintln!("error: {}", err);
            }
            return Err(failure.into());
        }
    };
    for warning in &compilation.warnings {
        eprintln!("warning: {}", warning);
    }
    if args.deny_warnings && !compilation.warnings.is_empty() {
        anyhow::bail!(
            "compile failed: {} warning(s) with --deny-warnings",
            compilation.warnings.len()
        );
    }

    if args.print {
        print!("{}", compilation.program);
    } else {
        stage += 1;
        progress.emit(stage, "Writing C program");
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&input));
        write_program(&output, &compilation.program)?;
    }

    eprintln!("compiled with {} warnings", compilation.warnings.len());
    Ok(())
}

pub fn compile_project_file(input: &Path, options: CompileOptions) -> Result<Compilation> {
    let input = canonicalize_file(input)?;
    let project = sb3::load_project(&input)?;
    Ok(compiler::compile(&project, options)?)
}

pub fn compile_project_source(source: &str, options: CompileOptions) -> Result<Compilation> {
    let project = Project::from_json_str(source)?;
    Ok(compiler::compile(&project, options)?)
}

/// Compiles an in-memory `.sb3` archive.
pub fn compile_project_archive(bytes: &[u8], options: CompileOptions) -> Result<Compilation> {
    let project_json = sb3::read_project_json_bytes(bytes)?;
    let project = Project::from_json(&project_json)?;
    Ok(compiler::compile(&project, options)?)
}

pub fn write_program(output: &Path, program: &str) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, program.as_bytes())
        .with_context(|| format!("Failed to write '{}'.", output.display()))
}

pub fn default_output_path(input: &Path) -> PathBuf {
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(DEFAULT_OUTPUT_NAME)
}

pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize) -> Self {
        Self {
            prefix,
            total: total.max(1),
        }
    }

    fn emit(&self, step: usize, label: &str) {
        let total = self.total;
        let step = step.clamp(1, total);
        let bar = render_progress_bar(step, total, 14);
        eprintln!("[{}] {}... ({}/{}) {}", self.prefix, label, step, total, bar);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
