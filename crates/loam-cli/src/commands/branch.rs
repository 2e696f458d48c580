//! `loam branch` — branch lifecycle, merge, and replay. Grounded on
//! `ipvc/branch.py`'s `create`/`checkout`/`history`/`merge` command set.

use std::env;

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use loam_core::model::OutputLevel;
use loam_core::MergeReport;
use loam_core::ReplayStatus;

use crate::context;

#[derive(Debug, Subcommand)]
pub enum BranchCommands {
    /// Create a new branch.
    Create(CreateArgs),
    /// Switch the active branch and sync the working directory to match it.
    Checkout(CheckoutArgs),
    /// List every branch in the repository.
    Ls,
    /// Show the active branch and whether a merge/replay is pending.
    Status,
    /// Show a branch's commit history (first-parent only).
    History(HistoryArgs),
    /// List the files tracked at a ref (`@head`, `@stage`, a branch name, or a hash).
    Show(ShowArgs),
    /// Merge another branch into the active one.
    Merge(MergeArgs),
    /// Replay the active branch's commits on top of another branch.
    Replay(ReplayArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    pub name: String,
    /// Ref to start from. Defaults to `@head`.
    #[arg(short = 'f', long = "from-commit")]
    pub from: Option<String>,
    /// Don't switch to the new branch after creating it.
    #[arg(short = 'n', long = "no-checkout")]
    pub no_checkout: bool,
}

#[derive(Debug, Args)]
pub struct CheckoutArgs {
    pub name: String,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Branch to show history for. Defaults to the active branch.
    pub branch: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    pub refexpr: String,
    /// Pipe the listing through `$PAGER` instead of printing it directly.
    #[arg(short = 'b', long)]
    pub viewer: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Branch to merge into the active branch.
    pub theirs: Option<String>,
    /// Finish a pending merge after resolving conflict markers by hand.
    /// Takes an optional commit message.
    #[arg(short = 'r', long, num_args = 0..=1, default_missing_value = "")]
    pub resolve: Option<String>,
    /// Back out of a pending merge, discarding its conflict state.
    #[arg(short = 'a', long)]
    pub abort: bool,
}

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Branch to replay the active branch's commits onto.
    pub theirs: Option<String>,
    /// Continue a pending replay after resolving conflict markers by hand.
    #[arg(short = 'r', long)]
    pub resume: bool,
    /// Back out of a pending replay, discarding its conflict state.
    #[arg(short = 'a', long)]
    pub abort: bool,
}

pub fn run(cmd: BranchCommands, output: OutputLevel) -> Result<()> {
    match cmd {
        BranchCommands::Create(args) => create(args, output),
        BranchCommands::Checkout(args) => checkout(args, output),
        BranchCommands::Ls => ls(output),
        BranchCommands::Status => status(output),
        BranchCommands::History(args) => history(args, output),
        BranchCommands::Show(args) => show(args, output),
        BranchCommands::Merge(args) => merge(args, output),
        BranchCommands::Replay(args) => replay(args, output),
    }
}

fn cwd() -> Result<std::path::PathBuf> {
    env::current_dir().context("reading current directory")
}

fn create(args: CreateArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    opened.repo.branch_create(
        &args.name,
        args.from.as_deref(),
        !args.no_checkout,
        Some(&opened.fs_root),
    )?;
    context::finish(&opened)?;
    println!("created branch '{}'", args.name);
    Ok(())
}

fn checkout(args: CheckoutArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    let fs_root = opened.fs_root.clone();
    opened.repo.branch_checkout(&args.name, &fs_root)?;
    context::finish(&opened)?;
    println!("switched to branch '{}'", args.name);
    Ok(())
}

fn ls(output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    let active = opened.repo.active_branch()?;
    for name in opened.repo.branch_ls()? {
        if name == active.as_str() {
            println!("* {name}");
        } else {
            println!("  {name}");
        }
    }
    Ok(())
}

fn status(output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    let (branch, state) = opened.repo.branch_status()?;
    println!("on branch {branch}");
    match state {
        loam_core::refs::BranchState::Clean => {}
        loam_core::refs::BranchState::MergePending => {
            println!("merge pending: resolve conflicts and run `loam branch merge --resolve`, or `--abort`");
        }
        loam_core::refs::BranchState::ReplayPending => {
            println!("replay pending: resolve conflicts and run `loam branch replay --resume`, or `--abort`");
        }
    }
    Ok(())
}

fn history(args: HistoryArgs, output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    for id in opened.repo.branch_history(args.branch.as_deref())? {
        println!("{id}");
    }
    Ok(())
}

fn show(args: ShowArgs, output: OutputLevel) -> Result<()> {
    let opened = context::open_existing_repo(&cwd()?, output)?;
    let lines: Vec<String> = opened
        .repo
        .branch_show(&args.refexpr)?
        .into_iter()
        .map(|entry| format!("{}  {}  {}", entry.id, format!("{:?}", entry.kind).to_lowercase(), entry.name))
        .collect();

    if args.viewer {
        page(&lines.join("\n"))
    } else {
        for line in lines {
            println!("{line}");
        }
        Ok(())
    }
}

/// Pipe `text` through `$PAGER`, falling back to stdout if it isn't set or
/// can't be launched.
fn page(text: &str) -> Result<()> {
    use std::io::Write as _;
    use std::process::{Command, Stdio};

    let Ok(pager) = std::env::var("PAGER") else {
        println!("{text}");
        return Ok(());
    };
    let Ok(mut child) = Command::new(&pager).stdin(Stdio::piped()).spawn() else {
        println!("{text}");
        return Ok(());
    };
    if let Some(stdin) = child.stdin.as_mut() {
        let _ = stdin.write_all(text.as_bytes());
    }
    child.wait().context("waiting for pager")?;
    Ok(())
}

fn merge(args: MergeArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;

    let report = if args.abort {
        opened.repo.branch_merge_abort()?
    } else if let Some(message) = &args.resolve {
        let message = if message.is_empty() { None } else { Some(message.as_str()) };
        opened.repo.branch_merge_resolve(message)?
    } else {
        let theirs = args
            .theirs
            .as_deref()
            .context("a branch to merge is required unless --resolve or --abort is given")?;
        opened.repo.branch_merge(theirs, None)?
    };
    context::finish(&opened)?;
    print_merge_report(&report);
    Ok(())
}

fn replay(args: ReplayArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;

    if args.abort {
        opened.repo.branch_replay_abort()?;
        context::finish(&opened)?;
        println!("replay aborted");
        return Ok(());
    }

    let status = if args.resume {
        opened.repo.branch_replay_resume()?
    } else {
        let theirs = args.theirs.as_deref().context("a branch to replay onto is required unless --resume or --abort is given")?;
        opened.repo.branch_replay(theirs)?
    };
    context::finish(&opened)?;
    print_replay_status(&status);
    Ok(())
}

fn print_merge_report(report: &MergeReport) {
    match report {
        MergeReport::AlreadyUpToDate => println!("already up to date"),
        MergeReport::FastForward => println!("fast-forwarded"),
        MergeReport::Merged => println!("merged"),
        MergeReport::Conflicts { paths } => {
            println!("conflicts in:");
            for p in paths {
                println!("  {p}");
            }
            println!("resolve the conflict markers, then run `loam branch merge --resolve`");
        }
        MergeReport::Aborted => println!("merge aborted"),
    }
}

fn print_replay_status(status: &ReplayStatus) {
    match status {
        ReplayStatus::Complete => println!("replay complete"),
        ReplayStatus::ResumeRequired { conflict_files } => {
            println!("conflicts in:");
            for p in conflict_files {
                println!("  {p}");
            }
            println!("resolve the conflict markers, then run `loam branch replay --resume`");
        }
    }
}
