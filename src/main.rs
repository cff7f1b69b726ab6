//! linemark: line bookmarks that survive branch switches.
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use linemark::config::Config;
use linemark::exec::{ManualScheduler, QueueScheduler, Scheduler};
use linemark::host::{DiskDocuments, GitHeadSource};
use linemark::model::{Node, NodeKind};
use linemark::session::Session;
use linemark::storage::JsonFileStore;
use linemark::watch::{BranchTrigger, NotifyOutcome, RepositorySource};
use std::fmt::Write;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::Level;

#[derive(Parser)]
#[command(name = "linemark")]
#[command(about = "Line bookmarks that survive branch switches", long_about = None)]
struct Args {
    /// Configuration file to read instead of ./linemark.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bookmark store, overriding the configured path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Directory that bookmark file paths are relative to
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log debug detail
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the bookmark tree
    Show,
    /// Bookmark a line of a file
    Add {
        /// File path relative to the root
        file: String,
        /// Zero-based line index
        line: usize,
        /// Label for the bookmark (defaults to file:line)
        #[arg(long)]
        name: Option<String>,
        /// Top-level group to file it under, created if missing
        #[arg(long)]
        group: Option<String>,
    },
    /// Correct bookmark lines against the files on disk and save
    Reconcile,
    /// Correct bookmarks whenever a repository's checkout changes
    Watch {
        /// Working trees to watch (defaults to the root)
        #[arg(value_name = "REPO")]
        repos: Vec<PathBuf>,
        /// Stop after this many seconds instead of running until killed
        #[arg(long)]
        for_secs: Option<u64>,
    },
}

fn main() -> linemark::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(io::stderr)
        .init();

    let cfg = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    match &args.command {
        Command::Show => {
            let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler::new());
            let mut session = open_session(&args, &cfg, scheduler)?;
            let mut out = String::new();
            render(session.tree().root(), 0, &mut out);
            print!("{out}");
            // Writes any fingerprints backfilled while loading.
            session.flush()?;
        }
        Command::Add {
            file,
            line,
            name,
            group,
        } => {
            let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler::new());
            let mut session = open_session(&args, &cfg, scheduler)?;
            let parent = match group {
                Some(group) => Some(find_or_create_group(&mut session, group)?),
                None => None,
            };
            let name = name.clone().unwrap_or_else(|| format!("{file}:{line}"));
            let id = session.add_bookmark(parent.as_deref(), &name, file, *line)?;
            session.flush()?;
            println!("{id}");
        }
        Command::Reconcile => {
            let scheduler: Arc<dyn Scheduler> = Arc::new(ManualScheduler::new());
            let mut session = open_session(&args, &cfg, scheduler)?;
            let report = session.reconcile_lines();
            session.flush()?;
            println!(
                "examined {}, corrected {}, removed {}",
                report.examined,
                report.corrected.len(),
                report.removed.len()
            );
        }
        Command::Watch { repos, for_secs } => {
            let repos = if repos.is_empty() {
                vec![args.root.clone()]
            } else {
                repos.clone()
            };
            watch(&args, &cfg, repos, for_secs.map(Duration::from_secs))?;
        }
    }

    Ok(())
}

fn open_session(
    args: &Args,
    cfg: &Config,
    scheduler: Arc<dyn Scheduler>,
) -> linemark::Result<Session> {
    let store_path = args
        .store
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.store_path));
    let session = Session::load(
        Box::new(DiskDocuments::new(&args.root)),
        Box::new(JsonFileStore::new(store_path)),
        scheduler,
    )?;
    Ok(session.with_save_delay(cfg.save_delay()))
}

fn find_or_create_group(session: &mut Session, name: &str) -> linemark::Result<String> {
    let existing = session
        .tree()
        .root()
        .as_group()
        .and_then(|root| {
            root.iter()
                .find(|child| !child.is_bookmark() && child.name == name)
        })
        .map(|child| child.id.clone());
    match existing {
        Some(id) => Ok(id),
        None => session.add_group(None, name),
    }
}

fn watch(
    args: &Args,
    cfg: &Config,
    repos: Vec<PathBuf>,
    run_for: Option<Duration>,
) -> linemark::Result<()> {
    let (scheduler, worker) = QueueScheduler::channel();
    let scheduler = Arc::new(scheduler);
    let shared: Arc<dyn Scheduler> = scheduler.clone();

    let session = open_session(args, cfg, Arc::clone(&shared))?;
    let handle = worker.spawn(session);

    // Files may have moved while nobody was watching.
    shared.run_on_ui_queue(Box::new(|session: &mut Session| {
        session.reconcile_lines();
    }));

    let trigger = BranchTrigger::new(GitHeadSource::new(repos), shared);
    let deadline = run_for.map(|run_for| Instant::now() + run_for);

    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        for repository in trigger.source().repositories() {
            if let NotifyOutcome::Scheduled { current, .. } = trigger.notify(&repository) {
                tracing::debug!(repository = %repository, %current, "correction scheduled");
            }
        }
        thread::sleep(cfg.poll_interval());
    }

    scheduler.shutdown();
    let mut session = handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload));
    session.flush()?;
    Ok(())
}

fn render(node: &Node, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node.kind() {
        NodeKind::Group(group) => {
            let _ = writeln!(out, "{indent}{}/", node.name);
            for child in group {
                render(child, depth + 1, out);
            }
        }
        NodeKind::Bookmark(bookmark) => {
            let _ = writeln!(
                out,
                "{indent}{} -> {}:{}",
                node.name, bookmark.file_path, bookmark.line
            );
        }
    }
}
