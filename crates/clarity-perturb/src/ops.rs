use std::collections::BTreeMap;
use std::fmt;

use clarity_core::errors::ClarityError;
use clarity_core::rng::RngHandle;
use image::imageops::{self, FilterType};
use serde_json::{json, Value};

use crate::canonical::CanonicalImage;
use crate::spec::{
    check_known, invalid, optional_bool, optional_str, require_f64, require_seed, Params,
    PerturbationSpec,
};

/// Pure, deterministic image transform.
///
/// Implementations take the input by shared reference and always return a new
/// image; the input is never modified.
pub trait Perturbation: fmt::Debug + Send + Sync {
    /// Frozen specification of this instance.
    fn spec(&self) -> &PerturbationSpec;

    /// Applies the transform to `image`.
    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError>;

    /// Manifest representation `{name, version, parameters}`.
    fn to_spec_dict(&self) -> Value {
        self.spec().to_spec_dict()
    }
}

const VERSION: &str = "1";
const MAX_FACTOR: f64 = 10.0;
const MAX_BLUR_SIGMA: f64 = 64.0;
const MAX_SCALE: f64 = 8.0;

fn check_range(
    perturbation: &str,
    key: &str,
    value: f64,
    min: f64,
    max: f64,
    min_inclusive: bool,
) -> Result<(), ClarityError> {
    let above_min = if min_inclusive {
        value >= min
    } else {
        value > min
    };
    if !above_min || value > max {
        let lower = if min_inclusive { "[" } else { "(" };
        return Err(invalid(
            perturbation,
            key,
            format!("{key}={value} outside {lower}{min}, {max}]"),
        ));
    }
    Ok(())
}

fn map_channels(
    image: &CanonicalImage,
    f: impl Fn(f32) -> f32,
) -> Result<CanonicalImage, ClarityError> {
    let values: Vec<f32> = image.to_unit_f32().into_iter().map(f).collect();
    CanonicalImage::from_unit_f32(image.width(), image.height(), &values)
}

/// Multiplies every channel by `factor`.
#[derive(Debug, Clone)]
pub struct Brightness {
    spec: PerturbationSpec,
    factor: f32,
}

impl Brightness {
    /// Registered name.
    pub const NAME: &'static str = "brightness";

    /// Builds a brightness perturbation; `factor` must lie in `[0, 10]`.
    pub fn new(factor: f64) -> Result<Self, ClarityError> {
        check_range(Self::NAME, "factor", factor, 0.0, MAX_FACTOR, true)?;
        let parameters = BTreeMap::from([("factor".to_string(), json!(factor))]);
        Ok(Self {
            spec: PerturbationSpec::new(Self::NAME, VERSION, parameters),
            factor: factor as f32,
        })
    }

    /// Builds from raw parameters (`factor`).
    pub fn from_params(params: &Params) -> Result<Self, ClarityError> {
        check_known(Self::NAME, params, &["factor"])?;
        Self::new(require_f64(Self::NAME, params, "factor")?)
    }
}

impl Perturbation for Brightness {
    fn spec(&self) -> &PerturbationSpec {
        &self.spec
    }

    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError> {
        let factor = self.factor;
        map_channels(image, |v| v * factor)
    }
}

/// Scales channel deviations from the mean intensity by `factor`.
#[derive(Debug, Clone)]
pub struct Contrast {
    spec: PerturbationSpec,
    factor: f32,
}

impl Contrast {
    /// Registered name.
    pub const NAME: &'static str = "contrast";

    /// Builds a contrast perturbation; `factor` must lie in `[0, 10]`.
    pub fn new(factor: f64) -> Result<Self, ClarityError> {
        check_range(Self::NAME, "factor", factor, 0.0, MAX_FACTOR, true)?;
        let parameters = BTreeMap::from([("factor".to_string(), json!(factor))]);
        Ok(Self {
            spec: PerturbationSpec::new(Self::NAME, VERSION, parameters),
            factor: factor as f32,
        })
    }

    /// Builds from raw parameters (`factor`).
    pub fn from_params(params: &Params) -> Result<Self, ClarityError> {
        check_known(Self::NAME, params, &["factor"])?;
        Self::new(require_f64(Self::NAME, params, "factor")?)
    }
}

impl Perturbation for Contrast {
    fn spec(&self) -> &PerturbationSpec {
        &self.spec
    }

    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError> {
        let values = image.to_unit_f32();
        // Accumulate in f64 so the mean does not depend on summation drift.
        let mean = (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32;
        let factor = self.factor;
        let out: Vec<f32> = values
            .into_iter()
            .map(|v| mean + (v - mean) * factor)
            .collect();
        CanonicalImage::from_unit_f32(image.width(), image.height(), &out)
    }
}

/// Adds seeded zero-mean Gaussian noise with standard deviation `sigma`.
#[derive(Debug, Clone)]
pub struct GaussianNoise {
    spec: PerturbationSpec,
    sigma: f32,
    seed: u64,
}

impl GaussianNoise {
    /// Registered name.
    pub const NAME: &'static str = "gaussian_noise";

    /// Builds a noise perturbation; `sigma` is in unit intensity and must lie in `[0, 1]`.
    pub fn new(sigma: f64, seed: u64) -> Result<Self, ClarityError> {
        check_range(Self::NAME, "sigma", sigma, 0.0, 1.0, true)?;
        let parameters = BTreeMap::from([
            ("seed".to_string(), json!(seed)),
            ("sigma".to_string(), json!(sigma)),
        ]);
        Ok(Self {
            spec: PerturbationSpec::new(Self::NAME, VERSION, parameters),
            sigma: sigma as f32,
            seed,
        })
    }

    /// Builds from raw parameters (`sigma`, `seed`). A missing seed is an error.
    pub fn from_params(params: &Params) -> Result<Self, ClarityError> {
        check_known(Self::NAME, params, &["seed", "sigma"])?;
        let seed = require_seed(Self::NAME, params)?;
        Self::new(require_f64(Self::NAME, params, "sigma")?, seed)
    }
}

impl Perturbation for GaussianNoise {
    fn spec(&self) -> &PerturbationSpec {
        &self.spec
    }

    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError> {
        // A fresh generator per call keeps repeated applications identical.
        let mut rng = RngHandle::substream(self.seed, Self::NAME);
        let sigma = self.sigma;
        let out: Vec<f32> = image
            .to_unit_f32()
            .into_iter()
            .map(|v| v + sigma * rng.standard_normal() as f32)
            .collect();
        CanonicalImage::from_unit_f32(image.width(), image.height(), &out)
    }
}

/// Separable Gaussian blur with clamped edges.
#[derive(Debug, Clone)]
pub struct Blur {
    spec: PerturbationSpec,
    kernel: Vec<f32>,
}

impl Blur {
    /// Registered name.
    pub const NAME: &'static str = "blur";

    /// Builds a blur perturbation; `sigma` (pixels) must lie in `(0, 64]`.
    pub fn new(sigma: f64) -> Result<Self, ClarityError> {
        check_range(Self::NAME, "sigma", sigma, 0.0, MAX_BLUR_SIGMA, false)?;
        let parameters = BTreeMap::from([("sigma".to_string(), json!(sigma))]);
        Ok(Self {
            spec: PerturbationSpec::new(Self::NAME, VERSION, parameters),
            kernel: gaussian_kernel(sigma as f32),
        })
    }

    /// Builds from raw parameters (`sigma`).
    pub fn from_params(params: &Params) -> Result<Self, ClarityError> {
        check_known(Self::NAME, params, &["sigma"])?;
        Self::new(require_f64(Self::NAME, params, "sigma")?)
    }
}

impl Perturbation for Blur {
    fn spec(&self) -> &PerturbationSpec {
        &self.spec
    }

    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let values = image.to_unit_f32();
        let horizontal = convolve(&values, width, height, &self.kernel, Axis::Horizontal);
        let vertical = convolve(&horizontal, width, height, &self.kernel, Axis::Vertical);
        CanonicalImage::from_unit_f32(image.width(), image.height(), &vertical)
    }
}

fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = ((3.0 * sigma).ceil() as i64).max(1);
    let denom = 2.0 * sigma * sigma;
    let mut weights: Vec<f32> = (-radius..=radius)
        .map(|offset| (-((offset * offset) as f32) / denom).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    for weight in &mut weights {
        *weight /= total;
    }
    weights
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

fn convolve(values: &[f32], width: usize, height: usize, kernel: &[f32], axis: Axis) -> Vec<f32> {
    let radius = (kernel.len() / 2) as i64;
    let mut out = vec![0.0f32; values.len()];
    for y in 0..height {
        for x in 0..width {
            for channel in 0..3 {
                let mut acc = 0.0f32;
                for (tap, weight) in kernel.iter().enumerate() {
                    let offset = tap as i64 - radius;
                    let (sx, sy) = match axis {
                        Axis::Horizontal => (clamp_index(x, offset, width), y),
                        Axis::Vertical => (x, clamp_index(y, offset, height)),
                    };
                    acc += weight * values[(sy * width + sx) * 3 + channel];
                }
                out[(y * width + x) * 3 + channel] = acc;
            }
        }
    }
    out
}

fn clamp_index(position: usize, offset: i64, len: usize) -> usize {
    (position as i64 + offset).clamp(0, len as i64 - 1) as usize
}

/// Rescales the image by `scale`, optionally restoring the original size.
#[derive(Debug, Clone)]
pub struct Resize {
    spec: PerturbationSpec,
    scale: f64,
    filter: FilterType,
    restore: bool,
}

impl Resize {
    /// Registered name.
    pub const NAME: &'static str = "resize";
    const DEFAULT_FILTER: &'static str = "triangle";

    /// Builds a resize perturbation; `scale` must lie in `(0, 8]`.
    pub fn new(scale: f64, filter: &str, restore: bool) -> Result<Self, ClarityError> {
        check_range(Self::NAME, "scale", scale, 0.0, MAX_SCALE, false)?;
        let filter_type = parse_filter(filter)?;
        let parameters = BTreeMap::from([
            ("filter".to_string(), json!(filter)),
            ("restore".to_string(), json!(restore)),
            ("scale".to_string(), json!(scale)),
        ]);
        Ok(Self {
            spec: PerturbationSpec::new(Self::NAME, VERSION, parameters),
            scale,
            filter: filter_type,
            restore,
        })
    }

    /// Builds from raw parameters (`scale`, optional `filter` and `restore`).
    pub fn from_params(params: &Params) -> Result<Self, ClarityError> {
        check_known(Self::NAME, params, &["filter", "restore", "scale"])?;
        let scale = require_f64(Self::NAME, params, "scale")?;
        let filter = optional_str(Self::NAME, params, "filter")?.unwrap_or(Self::DEFAULT_FILTER);
        let restore = optional_bool(Self::NAME, params, "restore", false)?;
        Self::new(scale, filter, restore)
    }

    /// Output dimensions for an input of `width x height`.
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scaled = |dim: u32| ((dim as f64 * self.scale).round() as u32).max(1);
        (scaled(width), scaled(height))
    }
}

fn parse_filter(name: &str) -> Result<FilterType, ClarityError> {
    match name {
        "nearest" => Ok(FilterType::Nearest),
        "triangle" => Ok(FilterType::Triangle),
        "catmull_rom" => Ok(FilterType::CatmullRom),
        "gaussian" => Ok(FilterType::Gaussian),
        "lanczos3" => Ok(FilterType::Lanczos3),
        other => Err(invalid(
            Resize::NAME,
            "filter",
            format!("unsupported filter '{other}'"),
        )),
    }
}

impl Perturbation for Resize {
    fn spec(&self) -> &PerturbationSpec {
        &self.spec
    }

    fn apply(&self, image: &CanonicalImage) -> Result<CanonicalImage, ClarityError> {
        let source = image.to_rgb32f()?;
        let (width, height) = self.target_dimensions(image.width(), image.height());
        let mut resized = imageops::resize(&source, width, height, self.filter);
        if self.restore {
            resized = imageops::resize(&resized, image.width(), image.height(), self.filter);
        }
        let (out_w, out_h) = resized.dimensions();
        CanonicalImage::from_unit_f32(out_w, out_h, resized.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(1.5);
        assert_eq!(kernel.len(), 11);
        let total: f32 = kernel.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        for idx in 0..kernel.len() / 2 {
            assert_eq!(kernel[idx], kernel[kernel.len() - 1 - idx]);
        }
    }

    #[test]
    fn resize_dimensions_never_collapse() {
        let resize = Resize::new(0.01, "nearest", false).unwrap();
        assert_eq!(resize.target_dimensions(10, 20), (1, 1));
        let resize = Resize::new(0.5, "nearest", false).unwrap();
        assert_eq!(resize.target_dimensions(9, 20), (5, 10));
    }
}
