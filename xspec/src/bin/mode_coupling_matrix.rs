//! Estimate the mode-coupling matrix of a synthetic point-source mask
//!
//! Builds an N×N mask with circular holes cut around randomly placed
//! sources, runs the Monte-Carlo mode-coupling estimate on it and writes the
//! matrix, its uncertainty and the bin edges to JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xspec::field::{observed_fraction, Mask};
use xspec::mode_coupling::compute_mode_coupling;
use xspec::shared_args::SpectrumArgs;

/// Command line arguments for mode-coupling estimation
#[derive(Parser, Debug)]
#[command(
    name = "Mode Coupling Matrix",
    about = "Monte-Carlo mode-coupling matrix of a point-source mask",
    long_about = None
)]
struct Args {
    #[command(flatten)]
    shared: SpectrumArgs,

    /// Side length of the mask in pixels
    #[arg(long, default_value_t = 64)]
    side: usize,

    /// Number of masked sources
    #[arg(long, default_value_t = 20)]
    sources: usize,

    /// Radius of each masked hole in pixels
    #[arg(long, default_value_t = 2.0)]
    hole_radius: f64,

    /// Run bins serially instead of in parallel
    #[arg(long, default_value_t = false)]
    serial: bool,

    /// Output JSON file path
    #[arg(long, default_value = "mode_coupling.json")]
    output: PathBuf,
}

/// Mask with a circular hole around each of `sources` random positions.
fn point_source_mask(side: usize, sources: usize, radius: f64, rng: &mut StdRng) -> Mask {
    let centers: Vec<(f64, f64)> = (0..sources)
        .map(|_| {
            (
                rng.gen_range(0.0..side as f64),
                rng.gen_range(0.0..side as f64),
            )
        })
        .collect();

    Array2::from_shape_fn((side, side), |(y, x)| {
        !centers.iter().any(|&(cx, cy)| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            dx * dx + dy * dy <= radius * radius
        })
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = args.shared.to_config().context("loading spectrum config")?;
    let binning = config
        .binning(args.side)
        .context("building multipole binning")?;

    let mut mask_rng = StdRng::seed_from_u64(config.seed.unwrap_or(0));
    let mask = point_source_mask(args.side, args.sources, args.hole_radius, &mut mask_rng);
    info!(
        "Mask: {}x{} with {} holes, observed fraction {:.3}",
        args.side,
        args.side,
        args.sources,
        observed_fraction(&mask)
    );

    let mut options = config.mode_coupling_options();
    options.parallel = !args.serial;
    let matrix = compute_mode_coupling(&mask, &binning, options)?;

    if args.shared.debug {
        for (i, ell) in binning.centers().iter().enumerate() {
            println!(
                "ell {:8.1}: Mkk {:10.4} +/- {:8.4}",
                ell,
                matrix.mkk[[i, i]],
                matrix.sigma[[i, i]]
            );
        }
    }

    let singular = matrix.singular_rows();
    if !singular.is_empty() {
        println!("Warning: singular rows {singular:?}");
    }

    matrix
        .save_to_file(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!("Mode-coupling matrix written to {}", args.output.display());

    Ok(())
}
