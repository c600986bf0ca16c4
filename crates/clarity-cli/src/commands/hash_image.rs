use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use clarity_perturb::{image_hash, CanonicalImage};

#[derive(Args, Debug)]
pub struct HashImageArgs {
    pub image: PathBuf,
}

pub fn run(args: &HashImageArgs) -> Result<(), Box<dyn Error>> {
    let image = CanonicalImage::load(&args.image)?;
    println!("{}", image_hash(&image));
    Ok(())
}
