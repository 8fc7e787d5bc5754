use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sbswitch",
    about = "Compile Scratch 3 projects (.sb3) to Nintendo Switch homebrew C."
)]
pub struct Args {
    #[arg(value_name = "INPUT", help = "A .sb3 archive, or a bare project.json.")]
    pub input: PathBuf,

    #[arg(
        value_name = "OUTPUT",
        help = "Where to write the C program (default: main.c next to INPUT)."
    )]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = 30, help = "Animation steps per glide block.")]
    pub glide_steps: u32,

    #[arg(long, help = "Treat warnings (unsupported blocks, unmapped keys) as errors.")]
    pub deny_warnings: bool,

    #[arg(long, help = "Write the program to stdout instead of a file.")]
    pub print: bool,
}
