// src/executor.rs

//! Isolated execution of one plotting script.
//!
//! The executor writes `user code + save fragment` into the namespace,
//! spawns the language interpreter on its wrapper program, and waits for it
//! under a wall-clock limit. Success is decided by one thing only: does
//! `<namespace>/<filename>` exist once the child is gone. The exit code is
//! recorded but never consulted.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::classify::OutputSpec;
use crate::config::Config;
use crate::lang::LanguageAdapter;
use crate::metrics::{InvocationMetrics, MemoryTracker};

/// How long to keep draining pipes after the child is gone. Grandchildren
/// that inherited stdout/stderr can otherwise hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const MEMORY_SAMPLE_EVERY: Duration = Duration::from_millis(20);

/// Result of one execution. `artifact_path` is `Some` exactly when
/// `succeeded` is true; build values through the constructors.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub succeeded: bool,
    pub artifact_path: Option<PathBuf>,
    pub stdout: String,
    pub stderr: String,
    pub diagnostic: Option<String>,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub metrics: InvocationMetrics,
}

impl ExecutionOutcome {
    fn saved(artifact_path: PathBuf, run: ChildRun) -> Self {
        Self {
            succeeded: true,
            artifact_path: Some(artifact_path),
            stdout: run.stdout,
            stderr: run.stderr,
            diagnostic: None,
            exit_code: run.exit_code,
            timed_out: false,
            metrics: run.metrics,
        }
    }

    fn failed(headline: String, run: ChildRun) -> Self {
        let diagnostic = compose_diagnostic(&headline, &run.stdout, &run.stderr);
        Self {
            succeeded: false,
            artifact_path: None,
            stdout: run.stdout,
            stderr: run.stderr,
            diagnostic: Some(diagnostic),
            exit_code: run.exit_code,
            timed_out: run.timed_out,
            metrics: run.metrics,
        }
    }

    /// The interpreter never ran (missing binary, unwritable namespace, ...).
    fn environment_failure(cause: String) -> Self {
        Self {
            succeeded: false,
            artifact_path: None,
            stdout: String::new(),
            stderr: String::new(),
            diagnostic: Some(format!("Execution error: {cause}")),
            exit_code: None,
            timed_out: false,
            metrics: InvocationMetrics::default(),
        }
    }
}

fn compose_diagnostic(headline: &str, stdout: &str, stderr: &str) -> String {
    format!("{headline}\nExecution output: {stdout}\nError: {stderr}")
}

/// What came back from the child process.
#[derive(Debug)]
struct ChildRun {
    stdout: String,
    stderr: String,
    exit_code: Option<i32>,
    timed_out: bool,
    metrics: InvocationMetrics,
}

#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
    max_output_bytes: usize,
    env: BTreeMap<String, String>,
}

impl Executor {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
            env: BTreeMap::new(),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.execution.timeout(), cfg.execution.max_output_bytes).with_env(cfg.env.clone())
    }

    /// Environment variables injected into every child.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Run `user_code` in a fresh interpreter and report whether the artifact
    /// described by `spec` appeared in `namespace_dir`.
    ///
    /// Never returns an error: environment problems become a failed outcome
    /// with an `Execution error:` diagnostic.
    pub async fn execute(
        &self,
        adapter: &dyn LanguageAdapter,
        user_code: &str,
        spec: &OutputSpec,
        namespace_dir: &Path,
    ) -> ExecutionOutcome {
        let namespace_dir = match tokio::fs::canonicalize(namespace_dir).await {
            Ok(dir) => dir,
            Err(e) => {
                return ExecutionOutcome::environment_failure(format!(
                    "namespace directory {:?} is not accessible: {e}",
                    namespace_dir
                ))
            }
        };

        let run = match self.run_child(adapter, user_code, spec, &namespace_dir).await {
            Ok(run) => run,
            Err(e) => {
                let cause = format!("{e:#}");
                tracing::warn!(
                    language = %adapter.language(),
                    interpreter = adapter.interpreter(),
                    error = %cause,
                    "execution environment failure"
                );
                return ExecutionOutcome::environment_failure(cause);
            }
        };

        if run.timed_out {
            let headline = format!(
                "Execution timed out after {}s and the process was terminated.",
                self.timeout.as_secs_f64()
            );
            return ExecutionOutcome::failed(headline, run);
        }

        // The child has been reaped at this point, so nothing is still writing.
        let artifact_path = namespace_dir.join(&spec.filename);
        match tokio::fs::metadata(&artifact_path).await {
            Ok(meta) if meta.is_file() => {
                tracing::info!(
                    artifact = %artifact_path.display(),
                    bytes = meta.len(),
                    exit_code = ?run.exit_code,
                    duration_ms = run.metrics.duration_ms,
                    max_rss_kb = ?run.metrics.max_rss_kb,
                    "artifact saved"
                );
                ExecutionOutcome::saved(artifact_path, run)
            }
            _ => {
                tracing::info!(
                    expected = %artifact_path.display(),
                    exit_code = ?run.exit_code,
                    duration_ms = run.metrics.duration_ms,
                    "no artifact produced"
                );
                ExecutionOutcome::failed(
                    format!("No artifact was created at {}.", spec.filename),
                    run,
                )
            }
        }
    }

    async fn run_child(
        &self,
        adapter: &dyn LanguageAdapter,
        user_code: &str,
        spec: &OutputSpec,
        namespace_dir: &Path,
    ) -> Result<ChildRun> {
        let script_path = namespace_dir.join(adapter.script_name());
        let mut script = String::with_capacity(user_code.len() + 1024);
        script.push_str(user_code);
        if !script.ends_with('\n') {
            script.push('\n');
        }
        script.push_str(&adapter.save_code(spec));
        tokio::fs::write(&script_path, script)
            .await
            .with_context(|| format!("Failed to write script {:?}", script_path))?;

        // The wrapper lives outside the namespace so the served directory only
        // holds what the user submitted and what it produced.
        let wrapper_dir = tempdir().context("Failed to create wrapper directory")?;
        let wrapper_path = wrapper_dir.path().join(adapter.wrapper_name());
        tokio::fs::write(&wrapper_path, adapter.wrapper_source())
            .await
            .context("Failed to write wrapper entry point")?;

        let mut cmd = Command::new(adapter.interpreter());
        cmd.arg(&wrapper_path)
            .arg(&script_path)
            .arg(namespace_dir)
            .arg(&spec.filename)
            .current_dir(namespace_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down anything the
        // interpreter forked along with it.
        #[cfg(unix)]
        cmd.process_group(0);

        for (k, v) in adapter.env() {
            cmd.env(k, v);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn interpreter `{}`", adapter.interpreter()))?;

        tracing::debug!(
            pid = ?child.id(),
            interpreter = adapter.interpreter(),
            script = %script_path.display(),
            "child spawned"
        );

        let mem = child
            .id()
            .map(|pid| MemoryTracker::start(pid, MEMORY_SAMPLE_EVERY));

        let stdout = child.stdout.take().context("Child stdout was not captured")?;
        let stderr = child.stderr.take().context("Child stderr was not captured")?;
        let stdout_task = tokio::spawn(read_capped(stdout, self.max_output_bytes));
        let stderr_task = tokio::spawn(read_capped(stderr, self.max_output_bytes));

        let (exit_code, timed_out) = match tokio::time::timeout(self.timeout, child.wait()).await
        {
            Ok(status) => {
                let status = status.context("Failed while waiting for the interpreter")?;
                (status.code(), false)
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    pid = ?child.id(),
                    "execution timed out, killing child"
                );
                #[cfg(unix)]
                {
                    if let Some(pid) = child.id() {
                        kill_process_group(pid);
                    }
                }
                // `kill` also reaps, so the child is gone when this returns.
                child
                    .kill()
                    .await
                    .context("Failed to terminate timed-out interpreter")?;
                (None, true)
            }
        };

        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let max_rss_kb = match mem {
            Some(tracker) => tracker.finish().await,
            None => None,
        };

        let (stdout, stderr) =
            tokio::join!(collect_stream(stdout_task), collect_stream(stderr_task));

        Ok(ChildRun {
            stdout,
            stderr,
            exit_code,
            timed_out,
            metrics: InvocationMetrics {
                duration_ms,
                max_rss_kb,
            },
        })
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        tracing::debug!(pgid, error = %e, "failed to kill process group");
    }
}

#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    dropped: usize,
}

impl Captured {
    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.dropped > 0 {
            text.push_str(&format!("\n[... {} bytes truncated]", self.dropped));
        }
        text
    }
}

/// Drain `reader` to EOF, keeping at most `cap` bytes.
async fn read_capped<R>(mut reader: R, cap: usize) -> std::io::Result<Captured>
where
    R: AsyncRead + Unpin,
{
    let mut captured = Captured::default();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(captured.bytes.len());
        let keep = room.min(n);
        captured.bytes.extend_from_slice(&buf[..keep]);
        captured.dropped += n - keep;
    }

    Ok(captured)
}

async fn collect_stream(task: JoinHandle<std::io::Result<Captured>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(Ok(captured))) => captured.into_text(),
        Ok(Ok(Err(e))) => format!("[output unavailable: {e}]"),
        Ok(Err(e)) => format!("[output unavailable: {e}]"),
        Err(_) => {
            abort.abort();
            "[output unavailable: stream still held open by a background process]".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::OutputSpec;
    use crate::lang::python::PythonAdapter;
    use crate::lang::r::RAdapter;
    use crate::lang::Language;

    /// POSIX shell stand-in for an interpreter: the "script" is sourced by
    /// the wrapper and `fig` plays the role of the figure variable.
    struct ShellAdapter {
        interpreter: String,
    }

    impl ShellAdapter {
        fn new() -> Self {
            Self {
                interpreter: "sh".to_string(),
            }
        }
    }

    impl LanguageAdapter for ShellAdapter {
        fn language(&self) -> Language {
            Language::Python
        }

        fn interpreter(&self) -> &str {
            &self.interpreter
        }

        fn source_name(&self) -> &'static str {
            "source.sh"
        }

        fn script_name(&self) -> &'static str {
            "script.sh"
        }

        fn wrapper_name(&self) -> &'static str {
            "wrapper.sh"
        }

        fn wrapper_source(&self) -> &'static str {
            r#"output_dir="$2"
output_file="$3"
. "$1"
if [ -f "$output_dir/$output_file" ]; then
  echo "saved"
  exit 0
fi
echo "Warning: not created"
exit 1
"#
        }

        fn save_code(&self, _spec: &OutputSpec) -> String {
            r#"
if [ -n "${fig:-}" ]; then
  printf '%s' "$fig" > "$output_dir/$output_file"
else
  echo "[vizexec] no figure found" >&2
fi
"#
            .to_string()
        }
    }

    fn executor() -> Executor {
        Executor::new(Duration::from_secs(10), 64 * 1024)
    }

    #[tokio::test]
    async fn saves_artifact_when_figure_is_bound() {
        let ns = tempfile::tempdir().unwrap();
        let spec = OutputSpec::static_image();

        let outcome = executor()
            .execute(&ShellAdapter::new(), "fig=bars", &spec, ns.path())
            .await;

        assert!(outcome.succeeded, "{:?}", outcome.diagnostic);
        assert!(outcome.diagnostic.is_none());
        let path = outcome.artifact_path.unwrap();
        assert!(path.ends_with("visualization.png"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "bars");
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    async fn script_error_reports_both_streams() {
        let ns = tempfile::tempdir().unwrap();
        let code = "echo starting\necho 'Traceback: boom' >&2\nexit 3";

        let outcome = executor()
            .execute(&ShellAdapter::new(), code, &OutputSpec::static_image(), ns.path())
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.artifact_path.is_none());
        assert_eq!(outcome.exit_code, Some(3));
        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.contains("Execution output: starting"));
        assert!(diagnostic.contains("Error: Traceback: boom"));
    }

    #[tokio::test]
    async fn clean_exit_without_figure_notes_the_absence() {
        let ns = tempfile::tempdir().unwrap();

        let outcome = executor()
            .execute(&ShellAdapter::new(), "echo hello", &OutputSpec::static_image(), ns.path())
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.artifact_path.is_none());
        assert!(!outcome.timed_out);
        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.starts_with("No artifact was created at visualization.png."));
        assert!(diagnostic.contains("[vizexec] no figure found"));
        assert!(diagnostic.contains("hello"));
    }

    #[tokio::test]
    async fn artifact_wins_over_nonzero_exit() {
        let ns = tempfile::tempdir().unwrap();
        let code = "printf x > \"$output_dir/$output_file\"\nexit 1";

        let outcome = executor()
            .execute(&ShellAdapter::new(), code, &OutputSpec::static_image(), ns.path())
            .await;

        assert!(outcome.succeeded);
        assert_eq!(outcome.exit_code, Some(1));
    }

    #[tokio::test]
    async fn runaway_script_is_killed() {
        let ns = tempfile::tempdir().unwrap();
        let exec = Executor::new(Duration::from_millis(300), 1024);
        let started = Instant::now();

        let outcome = exec
            .execute(
                &ShellAdapter::new(),
                "sleep 5\nfig=late",
                &OutputSpec::static_image(),
                ns.path(),
            )
            .await;

        assert!(started.elapsed() < Duration::from_millis(4500));
        assert!(outcome.timed_out);
        assert!(!outcome.succeeded);
        assert!(outcome.exit_code.is_none());
        assert!(outcome.diagnostic.unwrap().starts_with("Execution timed out after 0.3s"));
        assert!(!ns.path().join("visualization.png").exists());
    }

    #[tokio::test]
    async fn missing_interpreter_is_an_execution_error() {
        let ns = tempfile::tempdir().unwrap();
        let adapter = ShellAdapter {
            interpreter: "vizexec-no-such-interpreter".to_string(),
        };

        let outcome = executor()
            .execute(&adapter, "fig=bars", &OutputSpec::static_image(), ns.path())
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.exit_code.is_none());
        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.starts_with("Execution error:"));
        assert!(diagnostic.contains("vizexec-no-such-interpreter"));
    }

    #[tokio::test]
    async fn missing_namespace_is_an_execution_error() {
        let root = tempfile::tempdir().unwrap();
        let outcome = executor()
            .execute(
                &ShellAdapter::new(),
                "fig=bars",
                &OutputSpec::static_image(),
                &root.path().join("gone"),
            )
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.diagnostic.unwrap().starts_with("Execution error:"));
    }

    #[tokio::test]
    async fn captured_output_is_capped() {
        let ns = tempfile::tempdir().unwrap();
        let exec = Executor::new(Duration::from_secs(10), 100);
        let code = "i=0\nwhile [ $i -lt 500 ]; do echo \"line $i\"; i=$((i+1)); done";

        let outcome = exec
            .execute(&ShellAdapter::new(), code, &OutputSpec::static_image(), ns.path())
            .await;

        assert!(outcome.stdout.starts_with("line 0\n"));
        assert!(outcome.stdout.contains("bytes truncated]"));
        assert!(outcome.stdout.len() < 200);
    }

    #[tokio::test]
    async fn script_file_holds_user_code_then_save_code() {
        let ns = tempfile::tempdir().unwrap();
        executor()
            .execute(&ShellAdapter::new(), "fig=bars", &OutputSpec::static_image(), ns.path())
            .await;

        let script = std::fs::read_to_string(ns.path().join("script.sh")).unwrap();
        assert!(script.starts_with("fig=bars\n"));
        assert!(script.contains("[vizexec] no figure found"));
    }

    #[tokio::test]
    async fn configured_env_reaches_the_child() {
        let ns = tempfile::tempdir().unwrap();
        let mut env = BTreeMap::new();
        env.insert("VIZEXEC_TEST_FIG".to_string(), "from-env".to_string());
        let exec = executor().with_env(env);

        let outcome = exec
            .execute(
                &ShellAdapter::new(),
                "fig=\"$VIZEXEC_TEST_FIG\"",
                &OutputSpec::static_image(),
                ns.path(),
            )
            .await;

        let path = outcome.artifact_path.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "from-env");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_takes_background_children_down_too() {
        let ns = tempfile::tempdir().unwrap();
        let exec = Executor::new(Duration::from_millis(300), 1024);
        let started = Instant::now();

        // The backgrounded sleep inherits stdout and would hold it open.
        let outcome = exec
            .execute(
                &ShellAdapter::new(),
                "sleep 30 &\nsleep 30",
                &OutputSpec::static_image(),
                ns.path(),
            )
            .await;

        assert!(outcome.timed_out);
        assert!(started.elapsed() < DRAIN_GRACE);
        assert!(!outcome.stdout.contains("output unavailable"));
    }

    fn interpreter_available(program: &str) -> bool {
        std::process::Command::new(program)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    const CANVAS_STUB: &str = r#"
class Canvas:
    def savefig(self, path, **kwargs):
        with open(path, "wb") as fh:
            fh.write(b"png")
"#;

    #[tokio::test]
    async fn python_static_fragment_saves_fig_with_savefig() {
        if !interpreter_available("python3") {
            eprintln!("skipping: python3 not found");
            return;
        }
        let ns = tempfile::tempdir().unwrap();
        let code = format!("{CANVAS_STUB}\nfig = Canvas()\n");

        let outcome = executor()
            .execute(&PythonAdapter::new("python3"), &code, &OutputSpec::static_image(), ns.path())
            .await;

        assert!(outcome.succeeded, "{:?}", outcome.diagnostic);
        assert_eq!(std::fs::read(ns.path().join("visualization.png")).unwrap(), b"png");
    }

    #[tokio::test]
    async fn python_interactive_fragment_falls_back_to_write_html() {
        if !interpreter_available("python3") {
            eprintln!("skipping: python3 not found");
            return;
        }
        let ns = tempfile::tempdir().unwrap();
        let code = r#"
class Page:
    def write_html(self, path):
        with open(path, "w") as fh:
            fh.write("<html></html>")

fig = Page()
"#;

        let outcome = executor()
            .execute(&PythonAdapter::new("python3"), code, &OutputSpec::interactive(), ns.path())
            .await;

        assert!(outcome.succeeded, "{:?}", outcome.diagnostic);
        let html = std::fs::read_to_string(ns.path().join("visualization.html")).unwrap();
        assert_eq!(html, "<html></html>");
    }

    #[tokio::test]
    async fn python_code_ending_in_an_indented_block_still_saves() {
        if !interpreter_available("python3") {
            eprintln!("skipping: python3 not found");
            return;
        }
        let ns = tempfile::tempdir().unwrap();
        let code = format!(
            "{CANVAS_STUB}\nfig = None\n\
             for attempt in range(2):\n    if attempt == 1:\n        fig = Canvas()"
        );

        let outcome = executor()
            .execute(&PythonAdapter::new("python3"), &code, &OutputSpec::static_image(), ns.path())
            .await;

        assert!(outcome.succeeded, "{:?}", outcome.diagnostic);
    }

    #[tokio::test]
    async fn python_interactive_fragment_without_fig_warns() {
        if !interpreter_available("python3") {
            eprintln!("skipping: python3 not found");
            return;
        }
        let ns = tempfile::tempdir().unwrap();

        let outcome = executor()
            .execute(&PythonAdapter::new("python3"), "x = 1", &OutputSpec::interactive(), ns.path())
            .await;

        assert!(!outcome.succeeded);
        assert!(outcome.stderr.contains("[vizexec] no figure found"));
    }

    #[tokio::test]
    async fn r_fragments_run_and_report_a_missing_plot() {
        if !interpreter_available("Rscript") {
            eprintln!("skipping: Rscript not found");
            return;
        }

        for spec in [OutputSpec::static_image(), OutputSpec::interactive()] {
            let ns = tempfile::tempdir().unwrap();
            let outcome = executor()
                .execute(&RAdapter::new("Rscript"), "x <- 1", &spec, ns.path())
                .await;

            assert!(!outcome.succeeded, "{}", spec.filename);
            let diagnostic = outcome.diagnostic.unwrap();
            assert!(
                diagnostic.contains("[vizexec] no figure found"),
                "{}: {diagnostic}",
                spec.filename
            );
            assert!(!diagnostic.contains("Error executing script"));
        }
    }
}
