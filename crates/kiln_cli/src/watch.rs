//! `kiln watch`: rebuild on change.
//!
//! Each selected configuration keeps a [`BuildSession`], so rebuilds reuse
//! the in-memory cache store. File system events arrive through `notify`;
//! a burst of events is collected until `--debounce-ms` passes without a
//! new one, then every configuration with a changed input is rebuilt. The
//! command runs until interrupted.

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;

use kiln_builder::{BuildError, BuildSession, Builder};
use kiln_config::{load_config, resolve_schema};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::build::report;
use crate::pipeline::{artifact_path, render_diagnostics, resolve_project_root, select_schemas};
use crate::{GlobalArgs, ReportFormat, WatchArgs};

/// A watched configuration and the path its artifact is written to.
pub struct Watched {
    /// The configuration's session.
    pub session: BuildSession,
    /// Artifact output path.
    pub out: PathBuf,
}

/// Runs the `kiln watch` command.
pub fn run(args: &WatchArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    // Events carry absolute paths.
    let project_dir = resolve_project_root(global)?.canonicalize()?;
    let mut watched = match open_sessions(&project_dir, args) {
        Ok(watched) => watched,
        Err(err) => {
            render_diagnostics(&err.to_diagnostics(), None, ReportFormat::Text, global.color);
            return Ok(1);
        }
    };

    for entry in &mut watched {
        rebuild(entry, global);
    }

    let (tx, rx) = channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let _ = tx.send(res);
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(&project_dir, RecursiveMode::Recursive)?;
    if !global.quiet {
        eprintln!("   Watching {} for changes", project_dir.display());
    }

    let debounce = Duration::from_millis(args.debounce_ms);
    while let Ok(first) = rx.recv() {
        let mut paths = Vec::new();
        collect(first, &mut paths);
        while let Ok(next) = rx.recv_timeout(debounce) {
            collect(next, &mut paths);
        }
        for index in affected(&watched, &paths) {
            debug!(config = %watched[index].session.builder().config().name, "inputs changed");
            rebuild(&mut watched[index], global);
        }
    }
    Ok(0)
}

/// Opens a session per selected configuration.
pub fn open_sessions(project_dir: &Path, args: &WatchArgs) -> Result<Vec<Watched>, BuildError> {
    let config = load_config(project_dir)?;
    select_schemas(&config, args.schema.as_deref())
        .into_iter()
        .map(|schema| {
            let resolved = resolve_schema(&config, &schema, project_dir)?;
            let mut builder = Builder::new(resolved);
            if args.partial {
                builder = builder.with_partial(true);
            }
            Ok(Watched {
                session: BuildSession::new(builder),
                out: artifact_path(project_dir, &args.out, &schema),
            })
        })
        .collect()
}

fn collect(event: Result<Event, notify::Error>, paths: &mut Vec<PathBuf>) {
    match event {
        Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
        Ok(event) => paths.extend(event.paths),
        Err(err) => warn!(%err, "file watcher error"),
    }
}

/// Indexes of the configurations that one of `paths` is an input of.
///
/// Artifact writes land next to `out` and never count, even when the
/// output directory is matched by the include patterns.
pub fn affected(watched: &[Watched], paths: &[PathBuf]) -> Vec<usize> {
    let outputs: Vec<&Path> = watched.iter().filter_map(|entry| entry.out.parent()).collect();
    let changed: Vec<&PathBuf> = paths
        .iter()
        .filter(|path| !path.parent().is_some_and(|dir| outputs.contains(&dir)))
        .collect();
    watched
        .iter()
        .enumerate()
        .filter(|(_, entry)| changed.iter().any(|path| entry.session.is_input(path)))
        .map(|(index, _)| index)
        .collect()
}

fn rebuild(entry: &mut Watched, global: &GlobalArgs) -> bool {
    let result = entry.session.build();
    report(
        result,
        &entry.out,
        entry.session.builder().config(),
        ReportFormat::Text,
        global,
    )
}
