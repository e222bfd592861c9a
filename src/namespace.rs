// src/namespace.rs

//! Per-request artifact namespaces.
//!
//! A namespace is a UUIDv4 directory under the storage root. It is created
//! with a non-recursive `create_dir`, so an existing directory is never
//! picked up again: a collision is an error, not a reuse.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::util::ensure_dir;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceId(pub String);

impl NamespaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Whether a directory name looks like something we allocated.
    pub fn is_valid(name: &str) -> bool {
        Uuid::parse_str(name).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Namespace {
    pub id: NamespaceId,
    pub dir: PathBuf,
}

impl Namespace {
    /// Create a fresh namespace directory under `root`.
    pub fn allocate(root: &Path) -> Result<Self> {
        ensure_dir(root)?;

        let id = NamespaceId::new();
        let dir = root.join(id.as_str());
        std::fs::create_dir(&dir)
            .with_context(|| format!("Failed to create namespace directory {:?}", dir))?;

        tracing::debug!(namespace = %id, dir = %dir.display(), "namespace allocated");
        Ok(Self { id, dir })
    }

    /// Reference handed to the caller: `<namespace>/<filename>`.
    pub fn reference(&self, filename: &str) -> String {
        format!("{}/{}", self.id, filename)
    }
}
