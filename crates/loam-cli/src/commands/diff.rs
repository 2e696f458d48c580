//! `loam diff` — ad hoc diff between two refs, independent of the stage.
//! Grounded on `ipvc/diff.py`'s free-standing `diff(refpath_a, refpath_b)`.

use std::env;

use anyhow::{Context as _, Result};
use clap::Args;
use loam_core::model::OutputLevel;

use crate::commands::stage::print_diff;
use crate::context;

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Ref to diff. Defaults to `@workspace`.
    pub to: Option<String>,
    /// Ref to diff against. Defaults to `@stage`.
    pub from: Option<String>,
    /// List changed paths only, without line-level output.
    #[arg(short = 'f', long)]
    pub files_only: bool,
}

pub fn run(args: DiffArgs, output: OutputLevel) -> Result<()> {
    let cwd = env::current_dir().context("reading current directory")?;
    let opened = context::open_existing_repo(&cwd, output)?;
    let files = opened.repo.diff(args.to.as_deref(), args.from.as_deref())?;
    if args.files_only {
        for (path, _) in &files {
            println!("{path}");
        }
    } else {
        print_diff(&files);
    }
    Ok(())
}
