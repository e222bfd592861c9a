// src/engine/mod.rs

//! Execution orchestrator.
//!
//! `Pipeline::run` is the single entry point used by both the HTTP runtime
//! and the CLI: validate, allocate a namespace, persist the raw code,
//! classify, execute, and map the outcome.

use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub mod response;
pub mod validate;

pub use validate::{validate_request, VisualizeRequest};

use crate::classify::{classify, OutputKind};
use crate::config::{Config, Runtime};
use crate::error::PipelineError;
use crate::executor::Executor;
use crate::lang::adapter_for;
use crate::namespace::{Namespace, NamespaceId};

/* ---------------- validation ---------------- */

#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Serialize)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn push_error(&mut self, code: &'static str, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(ValidationError {
            code,
            message: message.into(),
        });
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }

    /// Collapse into the caller-facing error, messages joined in push order.
    pub fn into_error(self) -> PipelineError {
        let message = self
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        PipelineError::Validation(message)
    }
}

/* ---------------- execution output ---------------- */

/// A successfully produced artifact.
#[derive(Debug, Clone, Serialize)]
pub struct Visualization {
    pub viz_id: NamespaceId,
    /// `<namespace>/<filename>`
    pub artifact_reference: String,
    /// Path under the static route, e.g. `/visualizations/<id>/visualization.png`.
    pub visualization_url: String,
    pub kind: OutputKind,
    #[serde(skip)]
    pub artifact_path: PathBuf,
    pub duration_ms: u64,
    pub max_rss_kb: Option<u64>,
}

/* ---------------- pipeline ---------------- */

#[derive(Debug, Clone)]
pub struct Pipeline {
    storage: PathBuf,
    runtime: Runtime,
    executor: Executor,
    max_code_bytes: usize,
}

impl Pipeline {
    pub fn new(
        storage: PathBuf,
        runtime: Runtime,
        executor: Executor,
        max_code_bytes: usize,
    ) -> Self {
        Self {
            storage,
            runtime,
            executor,
            max_code_bytes,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.storage.dir.clone(),
            cfg.runtime.clone(),
            Executor::from_config(cfg),
            cfg.execution.max_code_bytes,
        )
    }

    pub fn storage(&self) -> &Path {
        &self.storage
    }

    /// Run one request end to end.
    ///
    /// Validation failures happen before anything touches the filesystem.
    /// A namespace allocated for a failed run is left on disk but never
    /// returned to the caller.
    pub async fn run(&self, req: VisualizeRequest) -> Result<Visualization, PipelineError> {
        let req = validate_request(&req, self.max_code_bytes)?;
        let adapter = adapter_for(req.language, &self.runtime);

        let namespace = Namespace::allocate(&self.storage)?;
        let source_path = namespace.dir.join(adapter.source_name());
        tokio::fs::write(&source_path, &req.code)
            .await
            .with_context(|| format!("Failed to persist code to {:?}", source_path))?;

        let spec = classify(&req.code, req.language);
        tracing::info!(
            namespace = %namespace.id,
            language = %req.language,
            kind = spec.kind.as_str(),
            filename = %spec.filename,
            code_bytes = req.code.len(),
            "executing visualization"
        );

        let outcome = self
            .executor
            .execute(adapter.as_ref(), &req.code, &spec, &namespace.dir)
            .await;

        tracing::debug!(
            namespace = %namespace.id,
            stdout = %outcome.stdout,
            stderr = %outcome.stderr,
            "child output"
        );

        match outcome.artifact_path {
            Some(artifact_path) if outcome.succeeded => Ok(Visualization {
                artifact_reference: namespace.reference(&spec.filename),
                visualization_url: format!("/visualizations/{}/{}", namespace.id, spec.filename),
                viz_id: namespace.id,
                kind: spec.kind,
                artifact_path,
                duration_ms: outcome.metrics.duration_ms,
                max_rss_kb: outcome.metrics.max_rss_kb,
            }),
            _ => {
                tracing::warn!(
                    namespace = %namespace.id,
                    timed_out = outcome.timed_out,
                    exit_code = ?outcome.exit_code,
                    "visualization failed"
                );
                Err(PipelineError::Execution(outcome.diagnostic.unwrap_or_else(|| {
                    format!("No artifact was created at {}.", spec.filename)
                })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pipeline(root: &Path, python: &str) -> Pipeline {
        let runtime = Runtime {
            python: python.to_string(),
            r: "vizexec-no-such-rscript".to_string(),
        };
        Pipeline::new(
            root.join("store"),
            runtime,
            Executor::new(Duration::from_secs(30), 64 * 1024),
            256 * 1024,
        )
    }

    fn namespaces(root: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn python_available(module: &str) -> bool {
        std::process::Command::new("python3")
            .args(["-c", &format!("import {module}")])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn unsupported_language_creates_no_namespace() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "python3");

        let err = p
            .run(VisualizeRequest::new("print(1)", "javascript"))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(!p.storage().exists());
    }

    #[tokio::test]
    async fn missing_interpreter_fails_but_keeps_the_code() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "vizexec-no-such-python");

        let err = p
            .run(VisualizeRequest::new("fig = None", "python"))
            .await
            .unwrap_err();

        match err {
            PipelineError::Execution(diag) => assert!(diag.starts_with("Execution error:")),
            other => panic!("unexpected error: {other:?}"),
        }

        let dirs = namespaces(p.storage());
        assert_eq!(dirs.len(), 1);
        let source = std::fs::read_to_string(dirs[0].join("source.py")).unwrap();
        assert_eq!(source, "fig = None");
    }

    #[tokio::test]
    async fn concurrent_requests_get_separate_namespaces() {
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "vizexec-no-such-python");

        let (a, b) = tokio::join!(
            p.run(VisualizeRequest::new("a = 1", "python")),
            p.run(VisualizeRequest::new("b <- 2", "r")),
        );
        assert!(a.is_err() && b.is_err());

        let dirs = namespaces(p.storage());
        assert_eq!(dirs.len(), 2);
        assert_ne!(dirs[0], dirs[1]);

        let mut sources: Vec<String> = dirs
            .iter()
            .map(|d| {
                let files: Vec<_> = std::fs::read_dir(d)
                    .unwrap()
                    .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                    .filter(|n| n.starts_with("source."))
                    .collect();
                assert_eq!(files.len(), 1, "each namespace holds only its own source");
                std::fs::read_to_string(d.join(&files[0])).unwrap()
            })
            .collect();
        sources.sort();
        assert_eq!(sources, vec!["a = 1".to_string(), "b <- 2".to_string()]);
    }

    #[tokio::test]
    async fn python_error_trace_reaches_the_caller() {
        if !python_available("sys") {
            eprintln!("python3 not available, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "python3");

        let err = p
            .run(VisualizeRequest::new("raise ValueError('no data for chart')", "python"))
            .await
            .unwrap_err();

        let diag = err.to_string();
        assert!(diag.starts_with("No artifact was created at visualization.png."));
        assert!(diag.contains("ValueError: no data for chart"));
        assert!(diag.contains("Traceback"));
    }

    #[tokio::test]
    async fn python_without_figure_is_a_clean_failure() {
        if !python_available("sys") {
            eprintln!("python3 not available, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "python3");

        let err = p
            .run(VisualizeRequest::new("total = sum(range(10))\nprint(total)", "python"))
            .await
            .unwrap_err();

        let diag = err.to_string();
        assert!(diag.contains("Execution output: 45"));
        assert!(diag.contains("[vizexec] no figure found"));
    }

    #[tokio::test]
    async fn matplotlib_bar_chart_end_to_end() {
        if !python_available("matplotlib") {
            eprintln!("matplotlib not available, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "python3");
        let code = "import matplotlib.pyplot as plt\n\
                    plt.figure(figsize=(4, 3))\n\
                    plt.bar(['A', 'B', 'C'], [3, 1, 2], color='skyblue')\n\
                    plt.title('Simple Bar Chart')\n\
                    plt.show()\n";

        let viz = p.run(VisualizeRequest::new(code, "python")).await.unwrap();

        assert_eq!(viz.kind, OutputKind::StaticImage);
        assert_eq!(
            viz.artifact_reference,
            format!("{}/visualization.png", viz.viz_id)
        );
        let bytes = std::fs::read(&viz.artifact_path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG"));
    }

    #[tokio::test]
    async fn matplotlib_fig_variable_end_to_end() {
        if !python_available("matplotlib") {
            eprintln!("matplotlib not available, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let p = pipeline(tmp.path(), "python3");
        let code = "import matplotlib.pyplot as plt\n\
                    fig, ax = plt.subplots()\n\
                    ax.plot([0, 1, 2], [0, 1, 4])\n";

        let viz = p.run(VisualizeRequest::new(code, "python")).await.unwrap();
        assert!(std::fs::metadata(&viz.artifact_path).unwrap().len() > 0);
    }
}
