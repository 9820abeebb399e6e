//! treefs command-line driver.
//!
//! Each invocation mounts the snapshot, runs one operation and unmounts,
//! writing the snapshot back unless `--dry-run` is given.
//!
//! Usage:
//!   treefs mkdir /docs
//!   echo hello | treefs write /docs/hello.txt
//!   treefs cat /docs/hello.txt
//!   treefs --snapshot other.treefs tree --json

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt};

use treefs_kernel::{
    EntryAttr, EntryKind, FsOps, MountSession, ROOT, S_IFDIR, S_IFREG, SharedTree, Timestamp,
    TreeConfig, TreeError,
};

/// Drive a treefs snapshot from the command line.
#[derive(Parser, Debug)]
#[command(name = "treefs")]
#[command(about = "Inspect and modify a treefs snapshot")]
struct Args {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Snapshot file, overriding the configuration
    #[arg(long, short)]
    snapshot: Option<PathBuf>,

    /// Run the command without saving the snapshot
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory's children
    Ls {
        #[arg(default_value = ROOT)]
        path: String,
    },
    /// Show an entry's attributes
    Stat {
        path: String,
        #[arg(long)]
        json: bool,
    },
    /// Create a directory
    Mkdir {
        path: String,
        /// Permission bits, in octal
        #[arg(long, short, default_value = "755", value_parser = parse_mode)]
        mode: u32,
    },
    /// Create an empty file or update an existing file's mtime
    Touch {
        path: String,
        /// Permission bits, in octal
        #[arg(long, short, default_value = "644", value_parser = parse_mode)]
        mode: u32,
    },
    /// Write data into a file, creating it if needed
    Write {
        path: String,
        #[arg(long, short, default_value_t = 0)]
        offset: i64,
        /// Bytes to write; read from stdin when omitted
        data: Option<String>,
    },
    /// Print a file's contents
    Cat { path: String },
    /// Set a file's size
    Truncate { path: String, size: i64 },
    /// Remove a file
    Rm { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Set access and modification times, in seconds since the epoch
    Utimens {
        path: String,
        atime: i64,
        mtime: i64,
    },
    /// Print the whole tree
    Tree {
        #[arg(long)]
        json: bool,
    },
}

fn parse_mode(s: &str) -> Result<u32, String> {
    let mode = u32::from_str_radix(s, 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))?;
    if mode > 0o7777 {
        return Err(format!("mode {s} has bits outside 7777"));
    }
    Ok(mode)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("treefs: {e:#}");
            exit_code(&e)
        }
    }
}

/// Exit with the errno of the underlying tree error, or 1.
fn exit_code(e: &anyhow::Error) -> ExitCode {
    e.downcast_ref::<TreeError>()
        .and_then(|te| u8::try_from(te.errno()).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from)
}

fn load_config(args: &Args) -> Result<TreeConfig> {
    let config = match &args.config {
        Some(path) => TreeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TreeConfig::default(),
    };
    let config = match &args.snapshot {
        Some(snapshot) => config.with_snapshot(snapshot),
        None => config,
    };
    Ok(config.with_persist(!args.dry_run))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let snapshot = config.snapshot.clone();
    let session = MountSession::start(config)
        .with_context(|| format!("mounting {}", snapshot.display()))?;

    let result = execute(session.tree(), args.command);
    let stopped = session
        .stop()
        .with_context(|| format!("saving {}", snapshot.display()));
    result?;
    stopped
}

fn execute(fs: &SharedTree, command: Command) -> Result<()> {
    let mut out = io::stdout().lock();
    match command {
        Command::Ls { path } => {
            for child in fs.readdir(&path).with_context(|| format!("ls {path}"))? {
                match child.kind {
                    EntryKind::Directory => writeln!(out, "{}/", child.name)?,
                    EntryKind::File => writeln!(out, "{}", child.name)?,
                }
            }
        }
        Command::Stat { path, json } => {
            let attr = fs.getattr(&path).with_context(|| format!("stat {path}"))?;
            if json {
                serde_json::to_writer_pretty(&mut out, &attr)?;
                writeln!(out)?;
            } else {
                print_attr(&mut out, &path, &attr)?;
            }
        }
        Command::Mkdir { path, mode } => {
            fs.mkdir(&path, S_IFDIR | mode)
                .with_context(|| format!("mkdir {path}"))?;
        }
        Command::Touch { path, mode } => {
            fs.create(&path, S_IFREG | mode)
                .with_context(|| format!("touch {path}"))?;
        }
        Command::Write { path, offset, data } => {
            let bytes = match data {
                Some(data) => data.into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    io::stdin().read_to_end(&mut buf).context("reading stdin")?;
                    buf
                }
            };
            let written = fs
                .write(&path, offset, &bytes)
                .with_context(|| format!("write {path}"))?;
            tracing::debug!(path = %path, written, "write complete");
        }
        Command::Cat { path } => {
            let data = fs.read_all(&path).with_context(|| format!("cat {path}"))?;
            out.write_all(&data)?;
        }
        Command::Truncate { path, size } => {
            fs.truncate(&path, size)
                .with_context(|| format!("truncate {path}"))?;
        }
        Command::Rm { path } => {
            fs.unlink(&path).with_context(|| format!("rm {path}"))?;
        }
        Command::Rmdir { path } => {
            fs.rmdir(&path).with_context(|| format!("rmdir {path}"))?;
        }
        Command::Utimens { path, atime, mtime } => {
            fs.utimens(&path, Timestamp(atime), Timestamp(mtime))
                .with_context(|| format!("utimens {path}"))?;
        }
        Command::Tree { json } => {
            let nodes = walk(fs)?;
            if json {
                serde_json::to_writer_pretty(&mut out, &nodes)?;
                writeln!(out)?;
            } else {
                for node in &nodes {
                    print_node(&mut out, node)?;
                }
            }
        }
    }
    Ok(())
}

fn print_attr(out: &mut impl Write, path: &str, attr: &EntryAttr) -> io::Result<()> {
    writeln!(out, "  path: {path}")?;
    writeln!(out, "  kind: {}", attr.kind)?;
    writeln!(out, "    id: {}", attr.id)?;
    writeln!(out, "  mode: {:o}", attr.mode)?;
    writeln!(out, " links: {}", attr.nlink)?;
    writeln!(out, "   uid: {}", attr.uid)?;
    writeln!(out, "   gid: {}", attr.gid)?;
    writeln!(out, "  size: {}", attr.size)?;
    writeln!(out, " atime: {}", attr.atime.secs())?;
    writeln!(out, " mtime: {}", attr.mtime.secs())?;
    writeln!(out, " ctime: {}", attr.ctime.secs())?;
    Ok(())
}

/// One entry of a full tree listing.
#[derive(Debug, Serialize)]
struct Node {
    path: String,
    depth: usize,
    #[serde(flatten)]
    attr: EntryAttr,
}

/// Depth-first listing starting at the root, files before subdirectories.
fn walk(fs: &SharedTree) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut stack = vec![(ROOT.to_string(), 0usize)];
    while let Some((path, depth)) = stack.pop() {
        let attr = fs.getattr(&path).with_context(|| format!("stat {path}"))?;
        let is_dir = attr.is_dir();
        nodes.push(Node {
            path: path.clone(),
            depth,
            attr,
        });
        if !is_dir {
            continue;
        }
        let children = fs.readdir(&path).with_context(|| format!("ls {path}"))?;
        for child in children.into_iter().rev() {
            stack.push((join(&path, &child.name), depth + 1));
        }
    }
    Ok(nodes)
}

fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

fn print_node(out: &mut impl Write, node: &Node) -> io::Result<()> {
    let indent = "  ".repeat(node.depth);
    let name = if node.path == ROOT {
        ROOT
    } else {
        node.path.rsplit('/').next().unwrap_or(&node.path)
    };
    match node.attr.kind {
        EntryKind::Directory if node.path == ROOT => writeln!(out, "{name}"),
        EntryKind::Directory => writeln!(out, "{indent}{name}/"),
        EntryKind::File => writeln!(out, "{indent}{name} ({} bytes)", node.attr.size),
    }
}
