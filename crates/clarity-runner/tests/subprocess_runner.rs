#![cfg(unix)]

use std::fs;
use std::time::Duration;

use clarity_core::{ClarityError, RuntimeSettings};
use clarity_runner::{Runner, SubprocessRunner, STDERR_LOG, STDOUT_LOG};
use tempfile::tempdir;

fn sh(script: &str) -> SubprocessRunner {
    SubprocessRunner::new(
        vec!["sh".to_string(), "-c".to_string(), script.to_string()],
        "fake",
    )
    .unwrap()
}

fn spec_in(dir: &std::path::Path) -> std::path::PathBuf {
    let spec = dir.join("spec.json");
    fs::write(&spec, b"{\"prompt\": \"what animal?\"}").unwrap();
    spec
}

#[test]
fn successful_run_returns_artifact_dir() {
    let dir = tempdir().unwrap();
    let spec = spec_in(dir.path());
    let runner = sh("cp \"{spec}\" \"{out}/manifest.json\"; echo adapter={adapter}");
    let result = runner.invoke(&spec, Duration::from_secs(30)).unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout.trim(), "adapter=fake");
    assert_eq!(result.artifact_dir, dir.path().join("artifacts"));
    let copied = fs::read(result.artifact_dir.join("manifest.json")).unwrap();
    assert_eq!(copied, fs::read(&spec).unwrap());
}

#[test]
fn non_zero_exit_is_an_execution_error_with_tails() {
    let dir = tempdir().unwrap();
    let spec = spec_in(dir.path());
    let runner = sh("echo partial; echo boom >&2; exit 3");
    let err = runner.invoke(&spec, Duration::from_secs(30)).unwrap_err();
    assert!(matches!(err, ClarityError::Execution(_)));
    assert!(!err.is_timeout());
    let info = err.info();
    assert_eq!(info.code, "runner.exit_status");
    assert_eq!(info.context["exit_code"], "3");
    assert_eq!(info.context["stdout_tail"].trim(), "partial");
    assert_eq!(info.context["stderr_tail"].trim(), "boom");
    let stderr_log = fs::read_to_string(dir.path().join(STDERR_LOG)).unwrap();
    assert_eq!(stderr_log.trim(), "boom");
    assert!(dir.path().join(STDOUT_LOG).exists());
}

#[test]
fn slow_runner_times_out_distinctly() {
    let dir = tempdir().unwrap();
    let spec = spec_in(dir.path());
    let runner = sh("exec sleep 5");
    let err = runner.invoke(&spec, Duration::from_millis(200)).unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err.info().code, "runner.timeout");
}

#[test]
fn missing_program_fails_to_spawn() {
    let dir = tempdir().unwrap();
    let spec = spec_in(dir.path());
    let runner = SubprocessRunner::new(
        vec!["/nonexistent/clarity-runner-binary".to_string()],
        "fake",
    )
    .unwrap();
    let err = runner.invoke(&spec, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err.info().code, "runner.spawn");
}

#[test]
fn construction_validates_command_and_gate() {
    let err = SubprocessRunner::new(Vec::new(), "fake").unwrap_err();
    assert_eq!(err.info().code, "runner.command_missing");

    let settings = RuntimeSettings {
        runner_command: vec!["model-runner".to_string(), "{spec}".to_string()],
        ..RuntimeSettings::default()
    };
    let err = SubprocessRunner::from_settings(&settings, "llava").unwrap_err();
    assert_eq!(err.info().code, "settings.real_model_disabled");
    let runner = SubprocessRunner::from_settings(&settings, "fake").unwrap();
    assert_eq!(runner.command(), ["model-runner", "{spec}"]);
}

#[test]
fn timeout_keeps_output_captured_before_the_kill() {
    let dir = tempdir().unwrap();
    let spec = spec_in(dir.path());
    let runner = sh("echo loading-weights; echo cuda-oom >&2; exec sleep 5");
    let err = runner.invoke(&spec, Duration::from_millis(500)).unwrap_err();
    assert!(err.is_timeout());
    let info = err.info();
    assert_eq!(info.context["stdout_tail"].trim(), "loading-weights");
    assert_eq!(info.context["stderr_tail"].trim(), "cuda-oom");
    let stdout_log = fs::read_to_string(dir.path().join(STDOUT_LOG)).unwrap();
    assert_eq!(stdout_log.trim(), "loading-weights");
    let stderr_log = fs::read_to_string(dir.path().join(STDERR_LOG)).unwrap();
    assert_eq!(stderr_log.trim(), "cuda-oom");
}
