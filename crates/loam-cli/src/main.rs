use std::process::ExitCode;

use clap::{Parser, Subcommand};
use loam_core::model::OutputLevel;

mod commands;
mod context;
mod keystore;
mod telemetry;

use commands::{branch, diff, repo, stage};

/// loam — a content-addressed, distributed version-control engine.
///
/// A repository tracks a workspace/stage/head triad per branch: the
/// workspace mirrors the filesystem, the stage holds what the next commit
/// will contain, and head is the last commit. `loam stage add` moves
/// filesystem changes into the stage; `loam stage commit` moves the stage
/// into a new commit.
#[derive(Parser)]
#[command(name = "loam")]
#[command(version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Reduce output. Repeat for less.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,
    /// Increase output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the repository registry: init, ls, rm, mv, identity, display name.
    #[command(subcommand)]
    Repo(repo::RepoCommands),

    /// Branch lifecycle, merge, and replay.
    #[command(subcommand)]
    Branch(branch::BranchCommands),

    /// Workspace/stage/commit cycle.
    #[command(subcommand)]
    Stage(stage::StageCommands),

    /// Ad hoc diff between two refs.
    Diff(diff::DiffArgs),
}

fn output_level(cli: &Cli) -> OutputLevel {
    match cli.quiet {
        0 if cli.verbose => OutputLevel::Verbose,
        0 => OutputLevel::Normal,
        1 => OutputLevel::Quiet,
        _ => OutputLevel::Quieter,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let output = output_level(&cli);
    match cli.command {
        Commands::Repo(cmd) => repo::run(cmd, output),
        Commands::Branch(cmd) => branch::run(cmd, output),
        Commands::Stage(cmd) => stage::run(cmd, output),
        Commands::Diff(args) => diff::run(args, output),
    }
}

fn main() -> ExitCode {
    telemetry::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
