// src/prune.rs

//! Namespace retention.
//!
//! Namespaces are append-only while the service runs; this sweep is the only
//! thing that removes them. Only directories whose name parses as a UUID are
//! touched, so anything else living under the storage root survives.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use crate::namespace::NamespaceId;

#[derive(Debug, Default, Serialize)]
pub struct PruneReport {
    pub scanned: usize,
    pub removed: Vec<String>,
    pub kept: usize,
}

/// Delete namespaces under `root` last modified more than `max_age` ago.
pub fn prune(root: &Path, max_age: Duration) -> Result<PruneReport> {
    let mut report = PruneReport::default();
    if !root.exists() {
        return Ok(report);
    }

    let max_age = chrono::Duration::from_std(max_age).context("Retention age out of range")?;
    let cutoff = Utc::now() - max_age;

    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to scan {:?}", root))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !NamespaceId::is_valid(&name) {
            continue;
        }
        report.scanned += 1;

        let modified: DateTime<Utc> = entry
            .metadata()
            .with_context(|| format!("Failed to stat {:?}", entry.path()))?
            .modified()
            .with_context(|| format!("No modification time for {:?}", entry.path()))?
            .into();

        if modified <= cutoff {
            std::fs::remove_dir_all(entry.path())
                .with_context(|| format!("Failed to remove namespace {:?}", entry.path()))?;
            report.removed.push(name);
        } else {
            report.kept += 1;
        }
    }

    tracing::info!(
        root = %root.display(),
        cutoff = %cutoff.to_rfc3339(),
        scanned = report.scanned,
        removed = report.removed.len(),
        "retention sweep finished"
    );
    Ok(report)
}

/// Run `prune` every `every` on the blocking pool for the life of the process.
pub fn spawn_retention_sweeper(root: PathBuf, max_age: Duration, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let root = root.clone();
            match tokio::task::spawn_blocking(move || prune(&root, max_age)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    let cause = format!("{e:#}");
                    tracing::warn!(error = %cause, "retention sweep failed");
                }
                Err(e) => tracing::warn!(error = %e, "retention sweep panicked"),
            }
        }
    });
}
