// Offline helpers for preparing and checking dataset files.

use std::path::PathBuf;

use anyhow::Context;
use blank_viewer::{corpus, stats};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// More logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate several dataset files into one
    Combine {
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Print sample counts and per-model hit rates
    Stats {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    blank_viewer::init_tracing(args.verbose);

    match args.command {
        Command::Combine { output, inputs } => {
            let (combined, skipped) = corpus::combine_files(&inputs)?;
            let text = serde_json::to_string_pretty(&combined)?;
            std::fs::write(&output, text)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Combined {} files ({} samples) into {}",
                inputs.len() - skipped.len(),
                combined.len(),
                output.display()
            );
        }
        Command::Stats { paths } => {
            for path in paths {
                let data = corpus::load_dataset(&path)?;
                print!("{}: {}", path.display(), stats::dataset_stats(&data));
            }
        }
    }
    Ok(())
}
