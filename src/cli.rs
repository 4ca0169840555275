//! Command line interface.
//!
//! Without a subcommand the binary serves LSP over stdio. `index` and
//! `deps` run the engine once against a directory and print the result.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::workspace::{all_referenced_files, MixinDefinition, Workspace};

#[derive(Parser, Debug)]
#[command(name = "pugls", version, about = "Language server for Pug templates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Serve the Language Server Protocol over stdio (default)
    Serve,
    /// Build the mixin index of a workspace and print it
    Index {
        root: PathBuf,
        /// Print JSON instead of one line per definition
        #[arg(long)]
        json: bool,
    },
    /// Print every template a file transitively includes or extends
    Deps {
        file: PathBuf,
        /// Workspace root used for `/`-rooted targets (defaults to the file's directory)
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("invalid path {}", path.display()))
}

fn open_workspace(root: &Path) -> anyhow::Result<Workspace> {
    let settings = Settings::new(root)?;
    Ok(Workspace::new(settings, vec![root.to_path_buf()]))
}

pub async fn index(root: &Path, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
    let root = absolute(root)?;
    let workspace = open_workspace(&root)?;

    workspace
        .build_index(&CancellationToken::new())
        .await
        .map_err(|err| anyhow!("index build: {err}"))?;
    let snapshot = workspace
        .index()
        .snapshot()
        .ok_or(anyhow!("index is not ready"))?;

    let definitions: Vec<&MixinDefinition> = snapshot
        .values()
        .flatten()
        .sorted_by(|a, b| a.name.cmp(&b.name).then(a.path.cmp(&b.path)))
        .collect();

    if json {
        serde_json::to_writer_pretty(&mut *out, &definitions)?;
        writeln!(out)?;
        return Ok(());
    }

    for definition in definitions {
        writeln!(
            out,
            "{}\t{}:{}",
            definition.signature(),
            definition.path.display(),
            definition.range.start.line + 1
        )?;
    }
    Ok(())
}

pub async fn deps(file: &Path, root: Option<&Path>, out: &mut impl Write) -> anyhow::Result<()> {
    let file = absolute(file)?;
    let root = match root {
        Some(root) => absolute(root)?,
        None => file
            .parent()
            .map(Path::to_path_buf)
            .ok_or(anyhow!("{} has no parent directory", file.display()))?,
    };
    let workspace = open_workspace(&root)?;

    let files = all_referenced_files(&workspace, &file, &CancellationToken::new())
        .await
        .map_err(|err| anyhow!("traversal: {err}"))?;

    for path in files {
        writeln!(out, "{}", path.display())?;
    }
    Ok(())
}
