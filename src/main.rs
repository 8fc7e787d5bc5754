use anyhow::Result;
use clap::Parser;
use sbswitch_core::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    sbswitch_core::run_cli(&args)
}
