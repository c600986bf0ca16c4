use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use clarity_perturb::{image_hash, CanonicalImage, Params, Perturbation, PerturbationRegistry};
use serde_json::{json, Value};

#[derive(Args, Debug)]
pub struct PerturbArgs {
    /// Registered perturbation name.
    #[arg(long)]
    pub name: String,
    /// Parameter as `key=value`; values are parsed as JSON, falling back to a string.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,
    /// Input image (PNG or JPEG).
    #[arg(long)]
    pub input: PathBuf,
    /// Output PNG path.
    #[arg(long)]
    pub out: PathBuf,
}

fn parse_params(raw: &[String]) -> Result<Params, Box<dyn Error>> {
    let mut params = Params::new();
    for pair in raw {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(format!("parameter `{pair}` is not KEY=VALUE").into());
        };
        let value = serde_json::from_str::<Value>(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));
        if params.insert(key.trim().to_string(), value).is_some() {
            return Err(format!("parameter `{key}` given twice").into());
        }
    }
    Ok(params)
}

pub fn run(args: &PerturbArgs) -> Result<(), Box<dyn Error>> {
    let params = parse_params(&args.params)?;
    let perturbation = PerturbationRegistry::builtin().create(&args.name, &params)?;
    let input = CanonicalImage::load(&args.input)?;
    let output = perturbation.apply(&input)?;
    output.save_png(&args.out)?;
    let summary = json!({
        "perturbation": perturbation.to_spec_dict(),
        "input_hash": image_hash(&input),
        "output_hash": image_hash(&output),
    });
    super::emit_json(&summary, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_as_json_with_string_fallback() {
        let params = parse_params(&[
            "factor=0.5".to_string(),
            "filter=nearest".to_string(),
            "restore=true".to_string(),
        ])
        .unwrap();
        assert_eq!(params["factor"], json!(0.5));
        assert_eq!(params["filter"], json!("nearest"));
        assert_eq!(params["restore"], json!(true));
        assert!(parse_params(&["factor".to_string()]).is_err());
        assert!(parse_params(&["a=1".to_string(), "a=2".to_string()]).is_err());
    }
}
