use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clarity_core::errors::{output_tail, ClarityError, ErrorInfo};
use clarity_core::settings::RuntimeSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// File receiving the runner's captured standard output.
pub const STDOUT_LOG: &str = "runner.stdout.log";
/// File receiving the runner's captured standard error.
pub const STDERR_LOG: &str = "runner.stderr.log";

/// Directory, relative to the spec's directory, receiving the artifact bundle.
pub const ARTIFACT_DIR: &str = "artifacts";
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Upper bound on draining the pipes after a timed-out runner was killed.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Outcome of a successful runner invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Directory holding the artifact bundle (`manifest.json`, optional `trace.jsonl`).
    pub artifact_dir: PathBuf,
}

/// Single call shape used to execute the external model runner.
///
/// Implementations must report a timeout as [`ClarityError::Timeout`] and any
/// other failed invocation as [`ClarityError::Execution`].
pub trait Runner {
    /// Runs inference for the specification at `spec_path`.
    fn invoke(&self, spec_path: &Path, timeout: Duration) -> Result<RunResult, ClarityError>;
}

impl<R: Runner + ?Sized> Runner for &R {
    fn invoke(&self, spec_path: &Path, timeout: Duration) -> Result<RunResult, ClarityError> {
        (**self).invoke(spec_path, timeout)
    }
}

impl<R: Runner + ?Sized> Runner for Box<R> {
    fn invoke(&self, spec_path: &Path, timeout: Duration) -> Result<RunResult, ClarityError> {
        (**self).invoke(spec_path, timeout)
    }
}

/// Runner executing an external command per invocation.
///
/// The command template may reference `{spec}` (the spec path), `{out}` (the
/// artifact directory, `<spec dir>/artifacts`) and `{adapter}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubprocessRunner {
    command: Vec<String>,
    adapter: String,
}

impl SubprocessRunner {
    /// Builds a runner from an explicit command template.
    pub fn new(command: Vec<String>, adapter: impl Into<String>) -> Result<Self, ClarityError> {
        if command.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ClarityError::Validation(
                ErrorInfo::new("runner.command_missing", "runner command is empty").with_hint(
                    "set CLARITY_RUNNER_CMD, e.g. `model-runner --spec {spec} --out {out}`",
                ),
            ));
        }
        let adapter = adapter.into();
        if adapter.trim().is_empty() {
            return Err(ClarityError::validation(
                "runner.adapter_missing",
                "adapter name must not be empty",
            ));
        }
        Ok(Self { command, adapter })
    }

    /// Builds a runner from runtime settings, enforcing the real-model gate.
    pub fn from_settings(settings: &RuntimeSettings, adapter: &str) -> Result<Self, ClarityError> {
        settings.check_adapter(adapter)?;
        Self::new(settings.runner_command.clone(), adapter)
    }

    /// Unrendered command template.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    /// Adapter substituted for `{adapter}`.
    pub fn adapter(&self) -> &str {
        &self.adapter
    }

    fn render(&self, spec_path: &Path, artifact_dir: &Path) -> Vec<String> {
        let spec = spec_path.display().to_string();
        let out = artifact_dir.display().to_string();
        self.command
            .iter()
            .map(|part| {
                part.replace("{spec}", &spec)
                    .replace("{out}", &out)
                    .replace("{adapter}", &self.adapter)
            })
            .collect()
    }
}

impl Runner for SubprocessRunner {
    fn invoke(&self, spec_path: &Path, timeout: Duration) -> Result<RunResult, ClarityError> {
        let run_dir = spec_path.parent().unwrap_or_else(|| Path::new("."));
        let artifact_dir = run_dir.join(ARTIFACT_DIR);
        fs::create_dir_all(&artifact_dir)
            .map_err(|err| ClarityError::io("runner.artifact_dir", &artifact_dir, err))?;

        let argv = self.render(spec_path, &artifact_dir);
        let Some((program, args)) = argv.split_first() else {
            return Err(ClarityError::validation(
                "runner.command_missing",
                "runner command is empty",
            ));
        };
        debug!(program = %program, spec = %spec_path.display(), "spawning runner");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                ClarityError::Execution(
                    ErrorInfo::new("runner.spawn", err.to_string())
                        .with_context("program", program.clone())
                        .with_context("spec", spec_path.display().to_string()),
                )
            })?;

        let stdout_reader = capture(child.stdout.take());
        let stderr_reader = capture(child.stderr.take());

        let Some(status) = wait_with_timeout(&mut child, timeout)? else {
            // A surviving grandchild may keep the pipes open; take what was read so far.
            let stdout = stdout_reader.map(|c| c.drain(DRAIN_GRACE)).unwrap_or_default();
            let stderr = stderr_reader.map(|c| c.drain(DRAIN_GRACE)).unwrap_or_default();
            warn!(spec = %spec_path.display(), timeout_secs = timeout.as_secs_f64(), "runner timed out");
            write_stream_logs(run_dir, &stdout, &stderr)?;
            return Err(ClarityError::Timeout(
                ErrorInfo::new("runner.timeout", "runner exceeded its time budget")
                    .with_context("spec", spec_path.display().to_string())
                    .with_context("timeout_secs", format!("{}", timeout.as_secs_f64()))
                    .with_context("stdout_tail", output_tail(&stdout))
                    .with_context("stderr_tail", output_tail(&stderr)),
            ));
        };
        let stdout = stdout_reader.map(StreamCapture::finish).unwrap_or_default();
        let stderr = stderr_reader.map(StreamCapture::finish).unwrap_or_default();
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            write_stream_logs(run_dir, &stdout, &stderr)?;
            return Err(ClarityError::Execution(
                ErrorInfo::new("runner.exit_status", "runner exited with non-zero status")
                    .with_context("spec", spec_path.display().to_string())
                    .with_context("exit_code", exit_code.to_string())
                    .with_context("stdout_tail", output_tail(&stdout))
                    .with_context("stderr_tail", output_tail(&stderr)),
            ));
        }

        Ok(RunResult {
            exit_code,
            stdout,
            stderr,
            artifact_dir,
        })
    }
}

/// Persists captured runner streams next to a run's spec.
pub fn write_stream_logs(dir: &Path, stdout: &str, stderr: &str) -> Result<(), ClarityError> {
    for (name, text) in [(STDOUT_LOG, stdout), (STDERR_LOG, stderr)] {
        let path = dir.join(name);
        fs::write(&path, text).map_err(|err| ClarityError::io("runner.log_write", &path, err))?;
    }
    Ok(())
}

struct StreamCapture {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl StreamCapture {
    /// Waits for end of stream.
    fn finish(self) -> String {
        let StreamCapture { buf, handle } = self;
        let _ = handle.join();
        snapshot(&buf)
    }

    /// Waits up to `grace` for end of stream, then returns whatever was read.
    fn drain(self, grace: Duration) -> String {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        snapshot(&self.buf)
    }
}

fn snapshot(buf: &Mutex<Vec<u8>>) -> String {
    let bytes = match buf.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

fn capture<R: Read + Send + 'static>(stream: Option<R>) -> Option<StreamCapture> {
    stream.map(|mut stream| {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => match sink.lock() {
                        Ok(mut guard) => guard.extend_from_slice(&chunk[..n]),
                        Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..n]),
                    },
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(_) => break,
                }
            }
        });
        StreamCapture { buf, handle }
    })
}

/// Polls the child until it exits; `None` means it was killed on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Option<ExitStatus>, ClarityError> {
    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) => {}
            Err(err) => {
                return Err(ClarityError::Execution(ErrorInfo::new(
                    "runner.wait",
                    err.to_string(),
                )))
            }
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}
