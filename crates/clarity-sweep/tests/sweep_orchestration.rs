use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clarity_core::errors::ErrorInfo;
use clarity_core::{ClarityError, RuntimeSettings};
use clarity_perturb::PerturbationRegistry;
use clarity_runner::{RunResult, Runner, STDOUT_LOG};
use clarity_sweep::{
    load_sweep_manifest, SweepAxis, SweepConfig, SweepOrchestrator, SPEC_FILE,
    SWEEP_MANIFEST_FILE,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    Succeed,
    FailAt(usize),
    TimeoutAt(usize),
    NoManifest,
}

struct ScriptedRunner {
    mode: Mode,
    calls: RefCell<Vec<PathBuf>>,
}

impl ScriptedRunner {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl Runner for ScriptedRunner {
    fn invoke(&self, spec_path: &Path, _timeout: Duration) -> Result<RunResult, ClarityError> {
        let idx = self.calls.borrow().len();
        self.calls.borrow_mut().push(spec_path.to_path_buf());
        match self.mode {
            Mode::FailAt(at) if at == idx => {
                return Err(ClarityError::Execution(
                    ErrorInfo::new("runner.exit_status", "boom").with_context("exit_code", "2"),
                ))
            }
            Mode::TimeoutAt(at) if at == idx => {
                return Err(ClarityError::Timeout(ErrorInfo::new(
                    "runner.timeout",
                    "too slow",
                )))
            }
            _ => {}
        }
        let spec: Value = serde_json::from_slice(&fs::read(spec_path).unwrap()).unwrap();
        let artifact_dir = spec_path.parent().unwrap().join("artifacts");
        fs::create_dir_all(&artifact_dir).unwrap();
        if self.mode != Mode::NoManifest {
            let factor = spec["perturbations"][0]["parameters"]["factor"]
                .as_f64()
                .unwrap_or(1.0);
            let manifest = json!({
                "output": if factor < 1.0 { "dog" } else { "cat" },
                "justification": format!("brightness {factor} seed {}", spec["seed"]),
            });
            fs::write(
                artifact_dir.join("manifest.json"),
                serde_json::to_vec(&manifest).unwrap(),
            )
            .unwrap();
        }
        Ok(RunResult {
            exit_code: 0,
            stdout: format!("run {idx}\n"),
            stderr: String::new(),
            artifact_dir,
        })
    }
}

fn fixture() -> (TempDir, SweepConfig) {
    let dir = tempdir().unwrap();
    let base = dir.path().join("base.json");
    fs::write(
        &base,
        br#"{"prompt": "which animal?", "seed": 999, "image_path": "img.png"}"#,
    )
    .unwrap();
    let config = SweepConfig::new(
        &base,
        vec![
            SweepAxis::new("contrast", vec![json!(1.0)]),
            SweepAxis::new("brightness", vec![json!(0.8), json!(1.0)]),
        ],
        vec![1, 2],
        "fake",
        &PerturbationRegistry::builtin(),
    )
    .unwrap();
    (dir, config)
}

fn orchestrator<R: Runner>(config: SweepConfig, runner: R) -> SweepOrchestrator<R> {
    SweepOrchestrator::new(
        config,
        PerturbationRegistry::builtin(),
        runner,
        &RuntimeSettings::default(),
    )
    .unwrap()
}

#[test]
fn runs_follow_axis_value_seed_order() {
    let (dir, config) = fixture();
    let runner = ScriptedRunner::new(Mode::Succeed);
    let result = orchestrator(config, &runner).run(&dir.path().join("out")).unwrap();
    let names: Vec<String> = result
        .runs
        .iter()
        .map(|run| run.output_dir.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "brightness=0p8__contrast=1p0__seed=1",
            "brightness=0p8__contrast=1p0__seed=2",
            "brightness=1p0__contrast=1p0__seed=1",
            "brightness=1p0__contrast=1p0__seed=2",
        ]
    );
    assert_eq!(runner.calls.borrow().len(), 4);
    assert_eq!(result.runs[1].seed, 2);
    assert_eq!(result.runs[2].axis_values["brightness"], json!(1.0));
    for run in &result.runs {
        assert!(run.output_dir.join(STDOUT_LOG).is_file());
        assert_eq!(run.manifest_hash.len(), 64);
    }
}

#[test]
fn identical_sweeps_write_identical_manifests() {
    let (dir, config) = fixture();
    let first = orchestrator(config.clone(), ScriptedRunner::new(Mode::Succeed))
        .run(&dir.path().join("a"))
        .unwrap();
    let second = orchestrator(config, ScriptedRunner::new(Mode::Succeed))
        .run(&dir.path().join("b"))
        .unwrap();
    let a = fs::read(&first.manifest_path).unwrap();
    let b = fs::read(&second.manifest_path).unwrap();
    assert_eq!(a, b);

    let text = String::from_utf8(a).unwrap();
    assert!(text.starts_with("{\n  \"axes\": {\n    \"brightness\": ["));
    assert!(text.ends_with("}\n"));
    let manifest = load_sweep_manifest(&first.manifest_path).unwrap();
    assert_eq!(manifest.seeds, vec![1, 2]);
    assert_eq!(manifest.runs.len(), 4);
    assert_eq!(manifest.runs[0].dir_name(), "brightness=0p8__contrast=1p0__seed=1");
    assert_eq!(manifest.runs[3].manifest_hash, first.runs[3].manifest_hash);
}

#[test]
fn spec_injection_leaves_base_untouched() {
    let (dir, config) = fixture();
    let base_before = fs::read(config.base_spec_path()).unwrap();
    let result = orchestrator(config.clone(), ScriptedRunner::new(Mode::Succeed))
        .run(&dir.path().join("out"))
        .unwrap();
    assert_eq!(fs::read(config.base_spec_path()).unwrap(), base_before);

    let spec_bytes = fs::read(result.runs[1].output_dir.join(SPEC_FILE)).unwrap();
    let spec: Value = serde_json::from_slice(&spec_bytes).unwrap();
    assert_eq!(spec["seed"], json!(2));
    assert_eq!(spec["prompt"], json!("which animal?"));
    assert_eq!(
        spec["perturbations"],
        json!([
            {"name": "brightness", "version": "1", "parameters": {"factor": 0.8}},
            {"name": "contrast", "version": "1", "parameters": {"factor": 1.0}},
        ])
    );
    let text = String::from_utf8(spec_bytes).unwrap();
    let prompt_at = text.find("\"prompt\"").unwrap();
    let image_at = text.find("\"image_path\"").unwrap();
    assert!(prompt_at < image_at, "opaque key order is preserved");
}

#[test]
fn existing_output_root_is_a_conflict_before_any_run() {
    let (dir, config) = fixture();
    let root = dir.path().join("out");
    fs::create_dir(&root).unwrap();
    let runner = ScriptedRunner::new(Mode::Succeed);
    let err = orchestrator(config, &runner).run(&root).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(err.info().code, "sweep.output_exists");
    assert!(runner.calls.borrow().is_empty());
}

#[test]
fn failed_run_names_its_combination_and_keeps_earlier_runs() {
    let (dir, config) = fixture();
    let root = dir.path().join("out");
    let err = orchestrator(config, ScriptedRunner::new(Mode::FailAt(2)))
        .run(&root)
        .unwrap_err();
    assert!(matches!(err, ClarityError::Execution(_)));
    let info = err.info();
    assert_eq!(info.context["combination"], "brightness=1p0__contrast=1p0__seed=1");
    assert_eq!(info.context["run_index"], "2");
    assert_eq!(info.context["exit_code"], "2");
    assert!(root.join("brightness=0p8__contrast=1p0__seed=1/artifacts/manifest.json").is_file());
    assert!(root.join("brightness=0p8__contrast=1p0__seed=2").is_dir());
    assert!(!root.join(SWEEP_MANIFEST_FILE).exists());
}

#[test]
fn timeouts_keep_their_family() {
    let (dir, config) = fixture();
    let err = orchestrator(config, ScriptedRunner::new(Mode::TimeoutAt(0)))
        .run(&dir.path().join("out"))
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(
        err.info().context["combination"],
        "brightness=0p8__contrast=1p0__seed=1"
    );
}

#[test]
fn missing_artifact_manifest_is_an_execution_error() {
    let (dir, config) = fixture();
    let err = orchestrator(config, ScriptedRunner::new(Mode::NoManifest))
        .run(&dir.path().join("out"))
        .unwrap_err();
    assert!(matches!(err, ClarityError::Execution(_)));
    assert_eq!(err.info().code, "sweep.missing_manifest");
}

#[test]
fn real_adapters_need_the_gate() {
    let (_dir, config) = fixture();
    let gated = SweepConfig::new(
        config.base_spec_path(),
        config.axes().to_vec(),
        vec![1],
        "llava",
        &PerturbationRegistry::builtin(),
    )
    .unwrap();
    let err = SweepOrchestrator::new(
        gated.clone(),
        PerturbationRegistry::builtin(),
        ScriptedRunner::new(Mode::Succeed),
        &RuntimeSettings::default(),
    )
    .err()
    .expect("gate closed");
    assert_eq!(err.info().code, "settings.real_model_disabled");

    let open = RuntimeSettings {
        enable_real_model: true,
        ..RuntimeSettings::default()
    };
    assert!(SweepOrchestrator::new(
        gated,
        PerturbationRegistry::builtin(),
        ScriptedRunner::new(Mode::Succeed),
        &open
    )
    .is_ok());
}

#[test]
fn cancellation_stops_before_the_next_run() {
    let (dir, config) = fixture();
    let runner = ScriptedRunner::new(Mode::Succeed);
    let flag = Arc::new(AtomicBool::new(true));
    let err = orchestrator(config, &runner)
        .with_cancel_flag(flag)
        .run(&dir.path().join("out"))
        .unwrap_err();
    assert_eq!(err.info().code, "sweep.cancelled");
    assert!(runner.calls.borrow().is_empty());
    assert!(dir.path().join("out").is_dir());
}
