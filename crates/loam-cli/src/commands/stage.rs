//! `loam stage` — the workspace/stage side of the commit cycle. Grounded on
//! `ipvc/stage.py`'s `add`/`rm`/`status`/`commit`/`uncommit`.

use std::env;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use loam_core::model::OutputLevel;
use loam_store::{ChangeType, ObjectChange};

use crate::context;

#[derive(Debug, Subcommand)]
pub enum StageCommands {
    /// Sync the workspace ref to match the filesystem, then stage the result.
    Add(AddArgs),
    /// Remove a path from the stage without touching the filesystem.
    Remove(RemoveArgs),
    /// Show staged and unstaged changes.
    Status,
    /// Show a line-level diff of staged changes against head.
    Diff,
    /// Commit the stage, making it the new head.
    Commit(CommitArgs),
    /// Undo the last commit, restoring it to the stage.
    Uncommit,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Paths (relative to the repository root) to stage. Defaults to everything.
    pub paths: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    pub paths: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CommitArgs {
    #[arg(short = 'm', long)]
    pub message: String,
}

pub fn run(cmd: StageCommands, output: OutputLevel) -> Result<()> {
    match cmd {
        StageCommands::Add(args) => add(args, output),
        StageCommands::Remove(args) => remove(args, output),
        StageCommands::Status => status(output),
        StageCommands::Diff => diff(output),
        StageCommands::Commit(args) => commit(args, output),
        StageCommands::Uncommit => uncommit(output),
    }
}

fn cwd() -> Result<std::path::PathBuf> {
    env::current_dir().context("reading current directory")
}

fn add(args: AddArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    let fs_root = opened.fs_root.clone();
    let paths: Vec<&str> = if args.paths.is_empty() { vec![""] } else { args.paths.iter().map(String::as_str).collect() };
    let mut all_changes = Vec::new();
    for path in paths {
        all_changes.extend(opened.repo.stage_add(&fs_root, path)?);
    }
    context::finish(&opened)?;
    print_changes(&all_changes);
    Ok(())
}

fn remove(args: RemoveArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    let mut all_changes = Vec::new();
    for path in &args.paths {
        all_changes.extend(opened.repo.stage_remove(path)?);
    }
    context::finish(&opened)?;
    print_changes(&all_changes);
    Ok(())
}

fn status(output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    let (staged, unstaged) = opened.repo.stage_status()?;
    println!("staged changes:");
    print_changes(&staged);
    println!("unstaged changes (workspace vs. stage):");
    print_changes(&unstaged);
    Ok(())
}

fn diff(output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    print_diff(&opened.repo.stage_diff()?);
    Ok(())
}

fn commit(args: CommitArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    let id = opened.repo.stage_commit(&args.message)?;
    context::finish(&opened)?;
    println!("{id}");
    Ok(())
}

fn uncommit(output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    opened.repo.stage_uncommit()?;
    context::finish(&opened)?;
    println!("last commit moved back to stage");
    Ok(())
}

fn change_glyph(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Added => "A",
        ChangeType::Removed => "D",
        ChangeType::Modified => "M",
    }
}

pub fn print_changes(changes: &[ObjectChange]) {
    if changes.is_empty() {
        println!("  (none)");
        return;
    }
    for change in changes {
        println!("  {} {}", change_glyph(change.change_type), change.path);
    }
}

pub fn print_diff(files: &[(String, Vec<loam_core::diff::DiffLine>)]) {
    for (path, lines) in files {
        println!("--- {path}");
        for line in lines {
            if !line.is_hint() {
                println!("{line}");
            }
        }
    }
}
