//! Fleet-wide fan-out
//!
//! Runs per-repository work over every discovered repository with at most
//! `concurrency` repositories in flight. Results come back in discovery
//! order; progress lines for a repository are forwarded together once that
//! repository finishes. Work for a single repository is never split across
//! tasks.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

use crate::git::{BranchEngine, BranchStatus, GitRepositoryStatus, PruneCriteria};
use crate::progress::{CollectingSink, ProgressSink};
use crate::scanner::Scanner;
use crate::sync::{SyncOptions, SyncReport, Synchronizer};

/// A discovered repository and the root it was found under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FleetEntry {
    pub path: PathBuf,
    pub root: PathBuf,
}

/// Every repository under `roots`, each listed once
pub fn discover(scanner: &Scanner, roots: &[PathBuf]) -> Vec<FleetEntry> {
    scanner
        .scan_grouped(roots)
        .into_iter()
        .flat_map(|(root, repos)| {
            repos.into_iter().map(move |path| FleetEntry {
                path,
                root: root.clone(),
            })
        })
        .collect()
}

/// One finished unit of per-repository work
#[derive(Debug, Clone)]
pub struct Completed<T> {
    /// Position of the entry in the input slice
    pub index: usize,
    pub entry: FleetEntry,
    pub result: T,
    /// Progress lines the work emitted, in order
    pub progress: Vec<String>,
}

/// Outcome of pruning one repository
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneReport {
    pub repo_path: PathBuf,
    pub hierarchical_name: String,
    /// Branches the criteria selected
    pub candidates: Vec<BranchStatus>,
    /// Branches actually deleted
    pub deleted: Vec<String>,
    /// Branches whose deletion failed, with the reason
    pub failed: Vec<(String, String)>,
}

/// Bounded-concurrency driver over a set of repositories
#[derive(Debug, Clone)]
pub struct Fleet {
    engine: BranchEngine,
    concurrency: usize,
}

impl Fleet {
    /// `concurrency` is clamped to at least one
    pub fn new(engine: BranchEngine, concurrency: usize) -> Self {
        Self {
            engine,
            concurrency: concurrency.max(1),
        }
    }

    pub fn engine(&self) -> &BranchEngine {
        &self.engine
    }

    /// Spawn `work` for every entry and stream each result as it finishes
    ///
    /// At most `concurrency` entries run at once. The channel closes once
    /// every entry has reported; an entry whose task panicked never reports.
    pub fn spawn_each<T, F, Fut>(&self, entries: &[FleetEntry], work: F) -> mpsc::Receiver<Completed<T>>
    where
        T: Send + 'static,
        F: Fn(BranchEngine, FleetEntry, Arc<CollectingSink>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, rx) = mpsc::channel(self.concurrency);

        for (index, entry) in entries.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();
            let lines = Arc::new(CollectingSink::new());
            let job = work(self.engine.clone(), entry.clone(), Arc::clone(&lines));
            let entry = entry.clone();

            tokio::spawn(async move {
                let result = {
                    // The semaphore is never closed, so acquisition cannot fail
                    let _permit = semaphore.acquire_owned().await.ok();
                    job.await
                };
                let completed = Completed {
                    index,
                    entry,
                    result,
                    progress: lines.messages(),
                };
                if tx.send(completed).await.is_err() {
                    debug!("Result receiver dropped before repository {} finished", index);
                }
            });
        }

        rx
    }

    /// Run `work` for every entry, returning results in entry order
    async fn fan_out<T, F, Fut>(&self, entries: &[FleetEntry], sink: &dyn ProgressSink, work: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(BranchEngine, FleetEntry, Arc<CollectingSink>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut rx = self.spawn_each(entries, work);
        let mut results: Vec<Option<T>> = entries.iter().map(|_| None).collect();

        while let Some(completed) = rx.recv().await {
            for line in &completed.progress {
                sink.report(line);
            }
            results[completed.index] = Some(completed.result);
        }

        let missing = results.iter().filter(|r| r.is_none()).count();
        if missing > 0 {
            warn!("{} repository task(s) ended without a result", missing);
        }

        results.into_iter().flatten().collect()
    }

    /// Stream the status of every entry in completion order
    pub fn status_stream(&self, entries: &[FleetEntry], fetch: bool) -> mpsc::Receiver<Completed<GitRepositoryStatus>> {
        self.spawn_each(entries, move |engine, entry, lines| async move {
            collect_status(&engine, &entry, fetch, lines.as_ref()).await
        })
    }

    /// Status of every entry, optionally fetching first
    pub async fn statuses(
        &self,
        entries: &[FleetEntry],
        fetch: bool,
        sink: &dyn ProgressSink,
    ) -> Vec<GitRepositoryStatus> {
        debug!("Collecting status for {} repositories", entries.len());
        self.fan_out(entries, sink, move |engine, entry, lines| async move {
            collect_status(&engine, &entry, fetch, lines.as_ref()).await
        })
        .await
    }

    /// Synchronize every entry
    pub async fn synchronize(
        &self,
        entries: &[FleetEntry],
        options: SyncOptions,
        sink: &dyn ProgressSink,
    ) -> Vec<SyncReport> {
        self.fan_out(entries, sink, move |engine, entry, lines| async move {
            Synchronizer::new(engine)
                .synchronize_path(&entry.path, Some(&entry.root), options, lines.as_ref())
                .await
        })
        .await
    }

    /// Select prunable branches of every entry, deleting them when `apply`
    pub async fn prune(
        &self,
        entries: &[FleetEntry],
        criteria: PruneCriteria,
        apply: bool,
        sink: &dyn ProgressSink,
    ) -> Vec<PruneReport> {
        self.fan_out(entries, sink, move |engine, entry, lines| {
            let criteria = criteria.clone();
            async move {
                prune_repository(&engine, &entry.path, &entry.root, &criteria, apply, lines.as_ref())
                    .await
            }
        })
        .await
    }
}

async fn collect_status(
    engine: &BranchEngine,
    entry: &FleetEntry,
    fetch: bool,
    sink: &dyn ProgressSink,
) -> GitRepositoryStatus {
    if fetch {
        if let Err(e) = engine.fetch(&entry.path).await {
            sink.report(&format!("{}: fetch failed: {}", entry.path.display(), e));
        }
    }
    engine.repository_status(&entry.path, Some(&entry.root)).await
}

async fn prune_repository(
    engine: &BranchEngine,
    path: &Path,
    root: &Path,
    criteria: &PruneCriteria,
    apply: bool,
    sink: &dyn ProgressSink,
) -> PruneReport {
    let mut report = PruneReport {
        repo_path: path.to_path_buf(),
        hierarchical_name: crate::git::hierarchical_name(path, Some(root)),
        candidates: engine.prunable_branches(path, criteria).await,
        ..Default::default()
    };

    if !apply {
        return report;
    }

    for branch in &report.candidates {
        // Selection already admitted unmerged branches only when asked to
        let force = !branch.is_fully_merged;
        match engine.delete_branch(path, &branch.name, force).await {
            Ok(()) => {
                sink.report(&format!("{}: deleted {}", report.hierarchical_name, branch.name));
                report.deleted.push(branch.name.clone());
            }
            Err(e) => {
                sink.report(&format!("{}: could not delete {}: {}", report.hierarchical_name, branch.name, e));
                report.failed.push((branch.name.clone(), e.to_string()));
            }
        }
    }

    report
}
