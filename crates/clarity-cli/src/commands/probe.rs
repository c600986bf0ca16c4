use std::error::Error;
use std::path::PathBuf;

use clap::{Args, ValueEnum};
use clarity_core::RuntimeSettings;
use clarity_perturb::CanonicalImage;
use clarity_probe::{
    evidence_regions, grid_regions, EvidenceMap, ProbeEngine, ProbeMetric, DEFAULT_IMAGE_FIELD,
};
use clarity_runner::SubprocessRunner;

use super::emit_json;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MetricArg {
    Stability,
    Drift,
}

impl From<MetricArg> for ProbeMetric {
    fn from(value: MetricArg) -> Self {
        match value {
            MetricArg::Stability => ProbeMetric::Stability,
            MetricArg::Drift => ProbeMetric::Drift,
        }
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Base run specification (JSON object).
    #[arg(long)]
    pub spec: PathBuf,
    /// Baseline image to mask.
    #[arg(long)]
    pub image: PathBuf,
    /// Output root; must not exist yet.
    #[arg(long)]
    pub out: PathBuf,
    /// Split the image into a k x k grid.
    #[arg(long, required_unless_present = "evidence", conflicts_with = "evidence")]
    pub grid: Option<u32>,
    /// Saliency map whose thresholded components become the regions.
    #[arg(long)]
    pub evidence: Option<PathBuf>,
    /// Minimum evidence value (1-255) for a pixel to belong to a region.
    #[arg(long, default_value_t = 128)]
    pub threshold: u8,
    /// Drop evidence components smaller than this many pixels.
    #[arg(long, default_value_t = 1)]
    pub min_pixels: usize,
    #[arg(long, value_enum, default_value_t = MetricArg::Stability)]
    pub metric: MetricArg,
    #[arg(long, default_value = "fake")]
    pub adapter: String,
    /// Spec field that receives the masked image path.
    #[arg(long, default_value = DEFAULT_IMAGE_FIELD)]
    pub image_field: String,
}

pub fn run(args: &ProbeArgs, settings: &RuntimeSettings) -> Result<(), Box<dyn Error>> {
    let regions = match (&args.evidence, args.grid) {
        (Some(path), _) => {
            let evidence = EvidenceMap::load(path)?;
            evidence_regions(&evidence, args.threshold, args.min_pixels)?
        }
        (None, Some(k)) => {
            let image = CanonicalImage::load(&args.image)?;
            grid_regions(image.width(), image.height(), k)?
        }
        (None, None) => return Err("either --grid or --evidence is required".into()),
    };

    let runner = SubprocessRunner::from_settings(settings, &args.adapter)?;
    let engine = ProbeEngine::new(runner, args.metric.into(), &args.adapter, settings)?
        .with_image_field(args.image_field.clone());
    let surface = engine.run(&args.spec, &args.image, &regions, &args.out)?;
    emit_json(&surface, None)
}
