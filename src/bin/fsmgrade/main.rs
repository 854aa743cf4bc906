//! fsmgrade CLI — hard gating and weighted rubric scoring over a directory
//! of saved FSM design files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsmgrade::grading::{self, GatingOptions, RubricOptions};
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "fsmgrade")]
#[command(about = "Offline consistency and rubric grader for FSM design files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hard pass/fail consistency check (ports autograder.py)
    Gate(GateArgs),
    /// Weighted rubric scoring (ports grade_fsm.py)
    Rubric(RubricArgs),
}

#[derive(Debug, Parser)]
struct GateArgs {
    /// Directory to scan for *.json save files
    #[arg(long, default_value = ".")]
    path: PathBuf,

    #[arg(long, default_value = "0")]
    min_states: usize,

    #[arg(long, default_value = "0")]
    min_inputs: usize,

    #[arg(long, default_value = "0")]
    min_outputs: usize,
}

#[derive(Debug, Parser)]
struct RubricArgs {
    /// Directory to scan for *.json save files
    #[arg(long)]
    path: PathBuf,

    #[arg(long, default_value = "2")]
    min_states: usize,

    #[arg(long, default_value = "0")]
    min_inputs: usize,

    #[arg(long, default_value = "0")]
    min_outputs: usize,

    /// Print every section's notes, not just failing ones
    #[arg(long)]
    verbose: bool,
}

fn collect_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("could not read directory {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();
    Ok(files)
}

/// Returns `true` iff the directory was non-empty and every file passed.
fn run_gate(args: GateArgs) -> Result<bool> {
    let files = collect_json_files(&args.path)?;
    let opts = GatingOptions::default()
        .with_min_states(args.min_states)
        .with_min_inputs(args.min_inputs)
        .with_min_outputs(args.min_outputs);

    let mut all_passed = true;
    for file in &files {
        let result = grading::grade_file_gate(file, &opts);
        if result.passed() {
            println!("[PASS] {}", result.file);
        } else {
            all_passed = false;
            println!("[FAIL] {}", result.file);
            for issue in &result.issues {
                println!("  - {issue}");
            }
        }
    }
    Ok(all_passed && !files.is_empty())
}

fn run_rubric(args: RubricArgs) -> Result<()> {
    let files = collect_json_files(&args.path)?;
    let opts = RubricOptions::default()
        .with_min_states(args.min_states)
        .with_min_inputs(args.min_inputs)
        .with_min_outputs(args.min_outputs)
        .with_verbose(args.verbose);

    let mut report = String::new();
    for file in &files {
        let result = grading::grade_file_rubric(file, &opts);
        let rendered = result.render();
        println!("{rendered}");
        report.push_str(&rendered);
        report.push('\n');
        if opts.verbose {
            println!();
            report.push('\n');
        }
    }

    let out_path = args.path.join("grading_results.txt");
    std::fs::write(&out_path, &report)
        .with_context(|| format!("could not write {}", out_path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Gate(args) => {
            if !run_gate(args)? {
                std::process::exit(1);
            }
        }
        Command::Rubric(args) => run_rubric(args)?,
    }
    Ok(())
}
