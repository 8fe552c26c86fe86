//! Hit/miss/skip classification with invalidation propagation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kiln_common::ContentHash;
use tracing::trace;

use crate::payload::FilePayload;
use crate::store::CacheStore;

/// Why a file has to be evaluated again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissReason {
    /// The file is not in the cache.
    New,
    /// The file's content hash changed.
    Changed,
    /// The cached payload is missing or corrupt.
    Unreadable,
    /// A file it depends on is a miss.
    Dependency(String),
}

impl fmt::Display for MissReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissReason::New => f.write_str("new file"),
            MissReason::Changed => f.write_str("content changed"),
            MissReason::Unreadable => f.write_str("cached payload unreadable"),
            MissReason::Dependency(file) => write!(f, "depends on `{file}`"),
        }
    }
}

/// The classification of every file of a build.
#[derive(Debug, Default)]
pub struct Classification {
    /// Files whose cached payloads are reused, with those payloads.
    pub hits: BTreeMap<String, FilePayload>,
    /// Files that must be evaluated, with the reason.
    pub misses: BTreeMap<String, MissReason>,
    /// Files excluded by configuration.
    pub skips: BTreeSet<String>,
}

impl Classification {
    /// Returns `true` if the file must be evaluated.
    pub fn is_miss(&self, file: &str) -> bool {
        self.misses.contains_key(file)
    }
}

/// Classifies the files of a build against the store.
///
/// `files` maps each file key in the graph to its current content hash;
/// `dependencies` maps each file to the files it reads values from. A file
/// is a hit when its hash matches the stored entry, its payload is readable
/// and none of its dependencies is a miss. Misses are propagated to
/// dependents until nothing changes, so a changed leaf invalidates every
/// transitive dependent.
pub fn classify(
    store: &CacheStore,
    files: &BTreeMap<String, ContentHash>,
    dependencies: &BTreeMap<String, BTreeSet<String>>,
    skipped: impl IntoIterator<Item = String>,
) -> Classification {
    let mut result = Classification {
        skips: skipped.into_iter().collect(),
        ..Classification::default()
    };

    let mut candidates: BTreeSet<&String> = BTreeSet::new();
    for (file, hash) in files {
        match store.entry(file) {
            None => {
                result.misses.insert(file.clone(), MissReason::New);
            }
            Some(entry) if entry.content_hash != *hash => {
                result.misses.insert(file.clone(), MissReason::Changed);
            }
            Some(_) => {
                candidates.insert(file);
            }
        }
    }

    loop {
        let mut changed = false;
        candidates.retain(|file| {
            let culprit = dependencies
                .get(*file)
                .and_then(|deps| deps.iter().find(|dep| result.misses.contains_key(*dep)));
            match culprit {
                Some(dep) => {
                    trace!(file = %file, dependency = %dep, "miss propagated");
                    result
                        .misses
                        .insert((*file).clone(), MissReason::Dependency(dep.clone()));
                    changed = true;
                    false
                }
                None => true,
            }
        });
        if !changed {
            break;
        }
    }

    for file in candidates {
        match store.load_payload(file) {
            Some(payload) => {
                result.hits.insert(file.clone(), payload);
            }
            None => {
                result.misses.insert(file.clone(), MissReason::Unreadable);
            }
        }
    }

    // An unreadable payload is a miss discovered late; propagate it too.
    loop {
        let newly: Vec<(String, String)> = result
            .hits
            .keys()
            .filter_map(|file| {
                dependencies.get(file).and_then(|deps| {
                    deps.iter()
                        .find(|dep| result.misses.contains_key(*dep))
                        .map(|dep| (file.clone(), dep.clone()))
                })
            })
            .collect();
        if newly.is_empty() {
            break;
        }
        for (file, dep) in newly {
            result.hits.remove(&file);
            result.misses.insert(file, MissReason::Dependency(dep));
        }
    }

    result
}
