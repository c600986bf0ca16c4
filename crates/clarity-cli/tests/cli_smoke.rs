use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use clarity_cache::cache_key;
use clarity_metrics::{compute_metrics, report_inputs};
use clarity_perturb::{image_hash, CanonicalImage};
use serde_json::Value;
use tempfile::tempdir;

fn clarity(args: &[&str], envs: &[(&str, &Path)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_clarity"));
    command
        .args(args)
        .env_remove("CLARITY_RUNNER_CMD")
        .env_remove("CLARITY_ENABLE_REAL_MODEL")
        .env_remove("RUST_LOG");
    for (key, value) in envs {
        command.env(key, value);
    }
    command.output().expect("run clarity")
}

fn stdout_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "clarity failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout.clone()).expect("utf8 stdout")
}

fn write_config(dir: &Path) -> std::path::PathBuf {
    fs::write(dir.join("base.json"), br#"{"prompt": "what animal?"}"#).unwrap();
    let config = dir.join("sweep.yaml");
    fs::write(
        &config,
        "base_spec_path: base.json\nseeds: [7]\naxes:\n  - name: brightness\n    values: [1.0, 0.5]\n  - name: blur\n    values: [0.5, 2.0]\n",
    )
    .unwrap();
    config
}

#[test]
fn help_lists_every_subcommand() {
    let stdout = stdout_of(&clarity(&["--help"], &[]));
    for name in [
        "sweep",
        "metrics",
        "probe",
        "perturb",
        "hash-image",
        "report",
        "cache-status",
    ] {
        assert!(stdout.contains(name), "missing {name} in help");
    }
}

#[test]
fn hash_image_matches_library_hash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("img.png");
    let image = CanonicalImage::filled(3, 2, [9, 8, 7]).unwrap();
    image.save_png(&path).unwrap();
    let stdout = stdout_of(&clarity(&["hash-image", path.to_str().unwrap()], &[]));
    assert_eq!(stdout.trim(), image_hash(&image));
}

#[test]
fn perturb_writes_output_and_reports_hashes() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.png");
    let output = dir.path().join("out.png");
    CanonicalImage::filled(4, 4, [100, 100, 100])
        .unwrap()
        .save_png(&input)
        .unwrap();
    let stdout = stdout_of(&clarity(
        &[
            "perturb",
            "--name",
            "brightness",
            "--param",
            "factor=0.5",
            "--input",
            input.to_str().unwrap(),
            "--out",
            output.to_str().unwrap(),
        ],
        &[],
    ));
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["perturbation"]["name"], "brightness");
    let written = CanonicalImage::load(&output).unwrap();
    assert_eq!(summary["output_hash"], image_hash(&written).as_str());
    assert_ne!(summary["input_hash"], summary["output_hash"]);
}

#[test]
fn dry_run_prints_the_plan_without_touching_disk() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let stdout = stdout_of(&clarity(
        &["sweep", "--config", config.to_str().unwrap(), "--dry-run"],
        &[],
    ));
    let plan: Value = serde_json::from_str(&stdout).unwrap();
    let names: Vec<&str> = plan
        .as_array()
        .unwrap()
        .iter()
        .map(|run| run["dir_name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        [
            "blur=0p5__brightness=1p0__seed=7",
            "blur=0p5__brightness=0p5__seed=7",
            "blur=2p0__brightness=1p0__seed=7",
            "blur=2p0__brightness=0p5__seed=7",
        ]
    );
}

#[test]
fn unknown_axes_fail_before_running() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("base.json"), b"{}").unwrap();
    let config = dir.path().join("bad.yaml");
    fs::write(
        &config,
        "base_spec_path: base.json\nseeds: [1]\naxes:\n  - name: sharpen\n    values: [1]\n",
    )
    .unwrap();
    let output = clarity(&["sweep", "--config", config.to_str().unwrap(), "--dry-run"], &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("perturb.unknown"));
}

#[cfg(unix)]
#[test]
fn sweep_metrics_and_cached_report_end_to_end() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path());
    let script = dir.path().join("runner.sh");
    fs::write(
        &script,
        "printf '{\"output\": \"cat\", \"justification\": \"pointy ears\"}' > \"$2/manifest.json\"\n",
    )
    .unwrap();
    let runner_cmd = format!("sh {} {{spec}} {{out}}", script.display());
    let cache_dir = dir.path().join("cache");
    let sweep_root = dir.path().join("sweep");
    let envs: [(&str, &Path); 2] = [
        ("CLARITY_RUNNER_CMD", Path::new(&runner_cmd)),
        ("CLARITY_CACHE_DIR", &cache_dir),
    ];

    let stdout = stdout_of(&clarity(
        &[
            "sweep",
            "--config",
            config.to_str().unwrap(),
            "--out",
            sweep_root.to_str().unwrap(),
        ],
        &envs,
    ));
    assert!(stdout.trim().ends_with("sweep_manifest.json"));

    let rerun = clarity(
        &[
            "sweep",
            "--config",
            config.to_str().unwrap(),
            "--out",
            sweep_root.to_str().unwrap(),
        ],
        &envs,
    );
    assert!(!rerun.status.success());

    let metrics: Value = serde_json::from_str(&stdout_of(&clarity(
        &["metrics", "--sweep", sweep_root.to_str().unwrap()],
        &envs,
    )))
    .unwrap();
    assert_eq!(metrics["overall"]["esi"], 1.0);
    assert_eq!(metrics["overall"]["runs"], 4);

    let first = stdout_of(&clarity(
        &["report", "--sweep", sweep_root.to_str().unwrap()],
        &envs,
    ));
    let second = stdout_of(&clarity(
        &["report", "--sweep", sweep_root.to_str().unwrap()],
        &envs,
    ));
    assert_eq!(first, second);
    assert!(first.contains("| value | runs | ESI | drift |"));

    let key = cache_key(&report_inputs(&compute_metrics(&sweep_root).unwrap())).unwrap();
    assert_eq!(fs::read_to_string(cache_dir.join(&key)).unwrap(), first);
    let status: Value = serde_json::from_str(&stdout_of(&clarity(
        &["cache-status", &key],
        &envs,
    )))
    .unwrap();
    assert_eq!(status["exists"], true);
    assert_eq!(status["generation_in_progress"], false);
}
