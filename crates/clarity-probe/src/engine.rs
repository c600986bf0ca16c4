use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clarity_core::errors::{ClarityError, ErrorInfo};
use clarity_core::rounding::round8;
use clarity_core::serde::{to_canonical_pretty_bytes, to_ordered_pretty_bytes};
use clarity_core::settings::RuntimeSettings;
use clarity_metrics::{
    extract_answer, extract_justification, normalized_edit_distance, stability,
};
use clarity_perturb::{image_hash, CanonicalImage};
use clarity_runner::{load_manifest, write_stream_logs, Runner, ARTIFACT_DIR, MANIFEST_FILE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::mask::{apply_mask, MASK_FILL};
use crate::regions::{validate_regions, Region, BASELINE_DIR};

/// Spec field receiving the path of the (masked) image by default.
pub const DEFAULT_IMAGE_FIELD: &str = "image_path";
/// File name of the serialized [`ProbeSurface`] inside the probe root.
pub const PROBE_SURFACE_FILE: &str = "probe_surface.json";

const IMAGE_FILE: &str = "image.png";
const SPEC_FILE: &str = "spec.json";

/// Metric compared between the baseline and each masked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMetric {
    /// Exact answer match against the baseline (1 or 0).
    Stability,
    /// Normalized edit distance of the justification.
    Drift,
}

impl ProbeMetric {
    fn measure(self, observed: &Observation, baseline: &Observation) -> f64 {
        match self {
            ProbeMetric::Stability => stability(&observed.answer, &baseline.answer),
            ProbeMetric::Drift => {
                normalized_edit_distance(&observed.justification, &baseline.justification)
            }
        }
    }
}

/// Effect of masking one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionDelta {
    pub region_id: String,
    pub baseline_metric: f64,
    pub masked_metric: f64,
    /// `masked_metric - baseline_metric`.
    pub delta: f64,
}

/// Per-region deltas with summary statistics, rounded to eight decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSurface {
    pub metric: ProbeMetric,
    pub baseline_answer: String,
    pub baseline_image_hash: String,
    pub regions: Vec<RegionDelta>,
    pub mean_abs_delta: f64,
    pub max_abs_delta: f64,
}

struct Observation {
    answer: String,
    justification: String,
}

/// Drives a baseline run plus one masked run per region.
pub struct ProbeEngine<R> {
    runner: R,
    metric: ProbeMetric,
    image_field: String,
    timeout: Duration,
}

impl<R: Runner> ProbeEngine<R> {
    pub fn new(
        runner: R,
        metric: ProbeMetric,
        adapter: &str,
        settings: &RuntimeSettings,
    ) -> Result<Self, ClarityError> {
        settings.check_adapter(adapter)?;
        Ok(Self {
            runner,
            metric,
            image_field: DEFAULT_IMAGE_FIELD.to_string(),
            timeout: settings.runner_timeout,
        })
    }

    /// Overrides the spec field that receives the image path.
    pub fn with_image_field(mut self, field: impl Into<String>) -> Self {
        self.image_field = field.into();
        self
    }

    /// Probes `regions` of the image at `image_path`. Results are written under
    /// `output_root`, which must not exist.
    pub fn run(
        &self,
        base_spec_path: &Path,
        image_path: &Path,
        regions: &[Region],
        output_root: &Path,
    ) -> Result<ProbeSurface, ClarityError> {
        if self.image_field.trim().is_empty() {
            return Err(ClarityError::validation(
                "probe.image_field",
                "image field name must not be empty",
            ));
        }
        let image = CanonicalImage::load(image_path)?;
        validate_regions(regions, image.width(), image.height())?;
        let base_spec = load_base_spec(base_spec_path)?;

        if let Some(parent) = output_root.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|err| ClarityError::io("probe.output_parent", parent, err))?;
            }
        }
        create_exclusive_dir(output_root)?;
        info!(
            root = %output_root.display(),
            regions = regions.len(),
            metric = ?self.metric,
            "starting probe"
        );

        let baseline = self
            .observe(&base_spec, &image, None, &output_root.join(BASELINE_DIR))
            .map_err(|err| err.with_context("region", BASELINE_DIR))?;
        let baseline_metric = self.metric.measure(&baseline, &baseline);

        let mut deltas = Vec::with_capacity(regions.len());
        let mut raw = Vec::with_capacity(regions.len());
        for region in regions {
            let masked = apply_mask(&image, region, MASK_FILL)?;
            let run_dir = output_root.join(&region.id);
            let observed = self
                .observe(&base_spec, &masked, Some(region.id.as_str()), &run_dir)
                .map_err(|err| err.with_context("region", region.id.clone()))?;
            let masked_metric = self.metric.measure(&observed, &baseline);
            let delta = masked_metric - baseline_metric;
            info!(region = %region.id, masked_metric, delta, "probe region complete");
            raw.push(delta.abs());
            deltas.push(RegionDelta {
                region_id: region.id.clone(),
                baseline_metric: round8(baseline_metric),
                masked_metric: round8(masked_metric),
                delta: round8(delta),
            });
        }

        let mean_abs = raw.iter().sum::<f64>() / raw.len().max(1) as f64;
        let max_abs = raw.iter().copied().fold(0.0_f64, f64::max);
        let surface = ProbeSurface {
            metric: self.metric,
            baseline_answer: baseline.answer,
            baseline_image_hash: image_hash(&image),
            regions: deltas,
            mean_abs_delta: round8(mean_abs),
            max_abs_delta: round8(max_abs),
        };
        let surface_path = output_root.join(PROBE_SURFACE_FILE);
        fs::write(&surface_path, to_canonical_pretty_bytes(&surface)?)
            .map_err(|err| ClarityError::io("probe.surface_write", &surface_path, err))?;
        Ok(surface)
    }

    fn observe(
        &self,
        base_spec: &Map<String, Value>,
        image: &CanonicalImage,
        region_id: Option<&str>,
        run_dir: &Path,
    ) -> Result<Observation, ClarityError> {
        create_exclusive_dir(run_dir)?;
        let image_path = absolute(&run_dir.join(IMAGE_FILE));
        image.save_png(&image_path)?;

        let mut spec = base_spec.clone();
        spec.insert(
            self.image_field.clone(),
            Value::String(image_path.display().to_string()),
        );
        spec.insert(
            "probe_region".to_string(),
            region_id.map_or(Value::Null, |id| Value::String(id.to_string())),
        );
        let spec_path = run_dir.join(SPEC_FILE);
        fs::write(&spec_path, to_ordered_pretty_bytes(&Value::Object(spec))?)
            .map_err(|err| ClarityError::io("probe.spec_write", &spec_path, err))?;

        let result = self.runner.invoke(&spec_path, self.timeout)?;
        write_stream_logs(run_dir, &result.stdout, &result.stderr)?;
        let expected_dir = run_dir.join(ARTIFACT_DIR);
        if result.artifact_dir != expected_dir {
            return Err(ClarityError::Contract(
                ErrorInfo::new(
                    "probe.artifact_dir",
                    "runner must write artifacts inside the run directory",
                )
                .with_context("artifact_dir", result.artifact_dir.display().to_string())
                .with_context("expected", expected_dir.display().to_string()),
            ));
        }
        let manifest_path = expected_dir.join(MANIFEST_FILE);
        let manifest = load_manifest(&manifest_path)?;
        let answer = extract_answer(&manifest)
            .map_err(|err| err.with_context("path", manifest_path.display().to_string()))?;
        Ok(Observation {
            answer,
            justification: extract_justification(&manifest),
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn load_base_spec(path: &Path) -> Result<Map<String, Value>, ClarityError> {
    let bytes = fs::read(path).map_err(|err| ClarityError::io("probe.base_spec_read", path, err))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ClarityError::Validation(
            ErrorInfo::new("probe.base_spec_shape", "base spec must be a JSON object")
                .with_context("path", path.display().to_string()),
        )),
        Err(err) => Err(ClarityError::Validation(
            ErrorInfo::new("probe.base_spec_json", err.to_string())
                .with_context("path", path.display().to_string()),
        )),
    }
}

fn create_exclusive_dir(path: &Path) -> Result<(), ClarityError> {
    match fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => Err(ClarityError::Conflict(
            ErrorInfo::new("probe.output_exists", "output directory already exists")
                .with_context("path", path.display().to_string()),
        )),
        Err(err) => Err(ClarityError::io("probe.create_dir", path, err)),
    }
}
