//! `loam repo` — operations on the repo registry itself, rather than on one
//! repo's branches/stage. Grounded on `ipvc/repo.py`'s `init`/`ls`/`rm`/`mv`
//! and `ipvc/id.py`'s get/set-identity pair.

use std::path::PathBuf;

use anyhow::{bail, Context as _, Result};
use clap::{Args, Subcommand};
use loam_core::model::OutputLevel;

use crate::context;

#[derive(Debug, Subcommand)]
pub enum RepoCommands {
    /// Create a new repository rooted at the current directory.
    Init(InitArgs),
    /// List every repository this machine's store knows about.
    Ls,
    /// Remove a repository's tracked history from the store. Does not touch
    /// the working directory's files.
    Rm(RmArgs),
    /// Move a repository: update its tracked path after the directory moves.
    ///
    /// `loam repo mv NEW` moves the repository discovered from the current
    /// directory to `NEW`. `loam repo mv OLD NEW` moves the repository
    /// rooted at `OLD` to `NEW` instead.
    Mv(MvArgs),
    /// Print or set the repo's signing identity name.
    Id(IdArgs),
    /// Print or set the repo's display name.
    Name(NameArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Human-readable name for the repository.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Path to the repository to remove. Defaults to the current directory.
    #[arg(long)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MvArgs {
    pub path1: PathBuf,
    pub path2: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    /// If given, set the identity name instead of printing it.
    pub key_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct NameArgs {
    /// If given, set the display name instead of printing it.
    pub name: Option<String>,
}

pub fn run(cmd: RepoCommands, output: OutputLevel) -> Result<()> {
    match cmd {
        RepoCommands::Init(args) => init(args, output),
        RepoCommands::Ls => ls(),
        RepoCommands::Rm(args) => rm(args),
        RepoCommands::Mv(args) => mv(args),
        RepoCommands::Id(args) => id(args, output),
        RepoCommands::Name(args) => name(args, output),
    }
}

fn cwd() -> Result<PathBuf> {
    std::env::current_dir().context("reading current directory")
}

fn init(args: InitArgs, output: OutputLevel) -> Result<()> {
    let fs_root = cwd()?;
    std::fs::create_dir_all(fs_root.join(".loam")).context("creating .loam marker directory")?;

    let mut opened = context::open_repo_at(&fs_root, output)?;
    opened.repo.init(args.name.as_deref())?;
    context::finish(&opened)?;

    println!("initialized repository at {}", fs_root.display());
    Ok(())
}

fn ls() -> Result<()> {
    let home = context::loam_home()?;
    let store = context::open_store(&home)?;
    let hexes = loam_core::list_repos(&store)?;
    for hex in hexes {
        match context::hex_to_path(&hex) {
            Ok(path) => println!("{}", path.display()),
            Err(_) => println!("{hex} (unreadable path)"),
        }
    }
    Ok(())
}

fn rm(args: RmArgs) -> Result<()> {
    let path = match args.path {
        Some(p) => p,
        None => cwd()?,
    };
    let hex = context::path_to_hex(&path)?;
    let home = context::loam_home()?;
    let mut store = context::open_store(&home)?;
    loam_core::remove_repo(&mut store, &hex)?;
    context::save_root(&home, &store)?;
    println!("removed repository record for {}", path.display());
    Ok(())
}

/// `path1`/`path2` mirror `ipvc repo.py`'s `mv`: when only one path is
/// given, it's the destination, and the source is whatever repo contains
/// the current directory.
fn mv(args: MvArgs) -> Result<()> {
    let (old, new) = match args.path2 {
        Some(new) => (args.path1, new),
        None => (context::discover_repo_root(&cwd()?)?, args.path1),
    };

    if !old.exists() {
        bail!(loam_core::LoamError::NoRepoHere { path: old.clone() });
    }
    if new.exists() {
        bail!(loam_core::LoamError::RepoConflict { existing: new.clone(), requested: old.clone() });
    }

    let old_hex = context::path_to_hex(&old)?;

    let parent = new.parent().map(std::path::Path::to_path_buf);
    if let Some(parent) = &parent {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::rename(&old, &new).with_context(|| format!("moving {} to {}", old.display(), new.display()))?;

    let new_hex = context::path_to_hex(&new)?;
    let home = context::loam_home()?;
    let mut store = context::open_store(&home)?;
    loam_core::move_repo(&mut store, &old_hex, &new_hex)?;
    context::save_root(&home, &store)?;

    println!("moved repository from {} to {}", old.display(), new.display());
    Ok(())
}

fn id(args: IdArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    match args.key_name {
        Some(name) => {
            opened.repo.set_repo_id(&name)?;
            context::finish(&opened)?;
        }
        None => {
            if let Some(id) = opened.repo.repo_id()? {
                println!("{id}");
            }
        }
    }
    Ok(())
}

fn name(args: NameArgs, output: OutputLevel) -> Result<()> {
    let mut opened = context::open_existing_repo(&cwd()?, output)?;
    match args.name {
        Some(n) => {
            opened.repo.set_repo_name(&n)?;
            context::finish(&opened)?;
        }
        None => {
            if let Some(n) = opened.repo.repo_name()? {
                println!("{n}");
            }
        }
    }
    Ok(())
}
