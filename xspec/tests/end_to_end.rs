use approx::assert_relative_eq;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use xspec::angular::angular_power_spectrum;
use xspec::binning::{BinSpacing, MultipoleBinning};
use xspec::config::{FlatFieldConfig, SpectrumConfig};
use xspec::cross_spectrum::{unit_power_normalization, CrossSpectrumOptions};
use xspec::field::{apply_mask, Field, Mask};
use xspec::flat_field::FlatFieldEstimator;
use xspec::grf::GrfSynthesizer;
use xspec::mode_coupling::{compute_mode_coupling, ModeCouplingOptions};
use xspec::noise::simple_normal_array;

/// Mask with a few square holes
fn holey_mask(side: usize) -> Mask {
    let holes = [(5usize, 7usize), (20, 12), (11, 25), (27, 27)];
    Array2::from_shape_fn((side, side), |(y, x)| {
        !holes
            .iter()
            .any(|&(hx, hy)| x.abs_diff(hx) <= 2 && y.abs_diff(hy) <= 2)
    })
}

#[test]
fn test_white_noise_profile_is_flat() {
    let _ = env_logger::builder().is_test(true).try_init();

    let side = 64;
    let fov = 2.0;
    let map = simple_normal_array((side, side), 0.0, 1.0, 2024);
    let binning = MultipoleBinning::new(90.0, 8, side, BinSpacing::Log).unwrap();
    let profile =
        angular_power_spectrum(&map, None, &binning, &CrossSpectrumOptions::with_fov(fov)).unwrap();
    let norm = unit_power_normalization(fov, side);

    assert_eq!(profile.total_count(), side * side);

    let mut checked = 0;
    for i in 0..profile.len() {
        if profile.counts[i] < 100 {
            continue;
        }
        let level = profile.means[i] / norm;
        let error = profile.std_errors[i] / norm;
        assert!(
            (level - 1.0).abs() < 6.0 * error,
            "bin {} at ell {:.0}: {:.3} +/- {:.3}",
            profile.bin_indices[i],
            profile.multipoles(&binning)[i],
            level,
            error
        );
        checked += 1;
    }
    assert!(checked >= 3);
}

#[test]
fn test_mode_coupling_predicts_masked_spectrum() {
    let _ = env_logger::builder().is_test(true).try_init();

    let side = 32;
    let fov = 2.0;
    let level = 5.0;
    let mask = holey_mask(side);
    let binning = MultipoleBinning::new(90.0, 4, side, BinSpacing::Log).unwrap();

    let options = ModeCouplingOptions {
        realizations: 30,
        ps_amplitude: 100.0,
        fov_deg: fov,
        seed: Some(11),
        parallel: true,
    };
    let mkk = compute_mode_coupling(&mask, &binning, options).unwrap();

    // Flat input spectrum everywhere, seen through the same mask
    let synth = GrfSynthesizer::new(side, &[level], &[binning.lmin()], binning.lmin()).unwrap();
    let norm = unit_power_normalization(fov, side);
    let opts = CrossSpectrumOptions::with_fov(fov);
    let mut rng = StdRng::seed_from_u64(12);
    let count = 30;
    let mut observed = vec![0.0; binning.nbins()];
    for field in synth.realizations(count, &mut rng) {
        let masked = apply_mask(&field, &mask).unwrap();
        let profile = angular_power_spectrum(&masked, None, &binning, &opts).unwrap();
        for (o, m) in observed.iter_mut().zip(profile.dense_means(binning.nbins(), 0.0)) {
            *o += m / norm / count as f64;
        }
    }

    for j in 2..binning.nbins() {
        let predicted: f64 = (0..binning.nbins())
            .map(|i| level / options.ps_amplitude * mkk.mkk[[i, j]])
            .sum();
        assert_relative_eq!(observed[j], predicted, max_relative = 0.2);
        // Masking removes power
        assert!(observed[j] < level);
    }
}

#[test]
fn test_flat_field_then_spectrum() {
    let _ = env_logger::builder().is_test(true).try_init();

    let side = 64;
    let config = SpectrumConfig {
        nbins: 8,
        ..SpectrumConfig::default()
    };
    let binning = config.binning(side).unwrap();
    let norm = unit_power_normalization(config.fov_deg, side);

    // Gain with unit mean: three full periods across the detector
    let gain = Array2::from_shape_fn((side, side), |(_, x)| {
        1.0 + 0.1 * (2.0 * std::f64::consts::PI * 3.0 * x as f64 / side as f64).sin()
    });

    // Noise-free flat exposures, each with a different hole masked out
    let levels = [800.0, 1000.0, 1300.0];
    let exposures: Vec<Field> = levels.iter().map(|l| &gain * *l).collect();
    let masks: Vec<Mask> = (0..levels.len())
        .map(|k| Array2::from_shape_fn((side, side), |(y, x)| !(x / 8 == k && y / 8 == k)))
        .collect();

    let estimate = FlatFieldEstimator::new(&exposures)
        .masks(&masks)
        .means(&levels)
        .estimate(&FlatFieldConfig::default())
        .unwrap();
    assert!(estimate.valid.iter().all(|&v| v));
    for (g, t) in estimate.gain.iter().zip(gain.iter()) {
        assert_relative_eq!(*g, *t, max_relative = 1e-10);
    }

    let sky = 1000.0;
    let noise = simple_normal_array((side, side), 0.0, 1.0, 99);
    let science = &gain * &noise.mapv(|n| sky + n);

    let calibrated = estimate.calibrate(&science).unwrap().mapv(|v| v - sky);
    let uncalibrated = science.mapv(|v| v - sky);

    let opts = config.spectrum_options();
    let clean = angular_power_spectrum(&calibrated, None, &binning, &opts).unwrap();
    let raw = angular_power_spectrum(&uncalibrated, None, &binning, &opts).unwrap();

    for i in 0..clean.len() {
        if clean.counts[i] >= 100 {
            let level = clean.means[i] / norm;
            assert!((level - 1.0).abs() < 6.0 * clean.std_errors[i] / norm);
        }
    }

    // The gain pattern dominates the uncalibrated spectrum at its frequency
    let worst = raw.means.iter().cloned().fold(0.0_f64, f64::max) / norm;
    assert!(worst > 100.0, "uncalibrated peak {worst}");
}
