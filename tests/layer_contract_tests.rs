use approx::assert_abs_diff_eq;
use ndarray::{arr1, arr2, Array3, Axis};

use spdnet::core::{identity_map, Error};
use spdnet::geometry::{frechet_mean, gl_distance, inverse3};
use spdnet::layers::{CayleyConv, Layer, SpdConv2d, SpdDistance};
use spdnet::model::{Model, SpdAutoencoder};

// =========================================================================
// TEST 1: Closed-form inverse against random SPD input
// =========================================================================

#[test]
fn test_inverse_times_input_is_identity() {
    use rand::{rngs::StdRng, Rng, SeedableRng};
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let factor = arr2(&[
            [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
            [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
            [rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>()],
        ]);
        let a = factor.dot(&factor.t()) + ndarray::Array2::<f64>::eye(3);
        let prod = inverse3(&a.view()).dot(&a);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_abs_diff_eq!(prod[[i, j]], expected, epsilon = 1e-4);
            }
        }
    }
}

// =========================================================================
// TEST 2: Fréchet-mean recursion contracts
// =========================================================================

#[test]
fn test_constant_sequence_with_half_weights_is_fixed() {
    let x = arr2(&[[2.0, 0.5, 0.0], [0.5, 1.5, 0.2], [0.0, 0.2, 1.0]]);
    let mut seq = Array3::zeros((5, 3, 3));
    for mut m in seq.axis_iter_mut(Axis(0)) {
        m.assign(&x);
    }
    let weights = arr1(&[0.5, 0.5, 0.5, 0.5]);
    let mean = frechet_mean(&seq.view(), &weights.view()).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert_abs_diff_eq!(mean[[i, j]], x[[i, j]], epsilon = 1e-4);
        }
    }
}

#[test]
fn test_length_one_sequence_ignores_weights() {
    let x = arr2(&[[3.0, 0.1, 0.0], [0.1, 2.0, 0.0], [0.0, 0.0, 1.0]]);
    let mut seq = Array3::zeros((1, 3, 3));
    seq.index_axis_mut(Axis(0), 0).assign(&x);
    // deliberately nonsensical weights; they must never be consulted
    let weights = arr1(&[42.0, -1.0]);
    let mean = frechet_mean(&seq.view(), &weights.view()).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert_abs_diff_eq!(mean[[i, j]], x[[i, j]], epsilon = 1e-15);
        }
    }
}

#[test]
fn test_weight_length_mismatch_is_fatal() {
    let x = arr2(&[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
    let mut seq = Array3::zeros((4, 3, 3));
    for mut m in seq.axis_iter_mut(Axis(0)) {
        m.assign(&x);
    }
    let weights = arr1(&[0.5, 0.5]);
    match frechet_mean(&seq.view(), &weights.view()) {
        Err(Error::WeightLength {
            sequence, expected, got,
        }) => {
            assert_eq!((sequence, expected, got), (4, 3, 2));
        }
        other => panic!("expected WeightLength error, got {:?}", other.map(|_| ())),
    }
}

// =========================================================================
// TEST 3: GL metric is ordered, not symmetric
// =========================================================================

#[test]
fn test_gl_metric_takes_ordered_arguments() {
    let x = arr2(&[[2.0, 0.5, 0.0], [0.5, 1.0, 0.3], [0.0, 0.3, 1.5]]);
    let y = arr2(&[[1.0, 0.2, 0.1], [0.2, 2.0, 0.0], [0.1, 0.0, 1.0]]);
    // the first argument is inverted, the second is not: both orders
    // are legal, independently computed, and only near-non-negativity
    // is promised
    let d_xy = gl_distance(&x.view(), &y.view()).unwrap();
    let d_yx = gl_distance(&y.view(), &x.view()).unwrap();
    assert!(d_xy.is_finite());
    assert!(d_yx.is_finite());
    assert!(d_xy > -1e-8);
    assert!(d_yx > -1e-8);
    let d_xx = gl_distance(&x.view(), &x.view()).unwrap();
    assert_abs_diff_eq!(d_xx, 0.0, epsilon = 1e-6);
}

// =========================================================================
// TEST 4: Convolution shape contract
// =========================================================================

#[test]
fn test_windowed_fm_conv_shape_contract() {
    // (6 - 3) / 1 + 1 = 4 spatial positions per dim, valid-only
    let layer = SpdConv2d::new(3, 2, 3, 1).unwrap();
    let x = identity_map(2, 3, 6, 6);
    let out = layer.forward(&x).unwrap();
    assert_eq!(out.features.shape(), &[2, 2, 4, 4, 3, 3]);
}

// =========================================================================
// TEST 5: Symmetry preservation through every SPD-valued layer
// =========================================================================

fn assert_map_symmetric(map: &spdnet::SpdFeatureMap, tolerance: f64) {
    let s = map.shape();
    for bi in 0..s[0] {
        for ch in 0..s[1] {
            for r in 0..s[2] {
                for c in 0..s[3] {
                    for i in 0..3 {
                        for j in 0..3 {
                            let a = map[[bi, ch, r, c, i, j]];
                            let b = map[[bi, ch, r, c, j, i]];
                            assert_abs_diff_eq!(a, b, epsilon = tolerance);
                        }
                    }
                }
            }
        }
    }
}

#[test]
fn test_layers_preserve_symmetry() {
    let mut x = identity_map(1, 2, 4, 4);
    for ch in 0..2 {
        for r in 0..4 {
            for c in 0..4 {
                x[[0, ch, r, c, 0, 0]] = 1.5 + 0.2 * (r as f64) + 0.1 * (ch as f64);
                x[[0, ch, r, c, 0, 1]] = 0.25;
                x[[0, ch, r, c, 1, 0]] = 0.25;
            }
        }
    }

    let fm_conv = SpdConv2d::new(2, 2, 3, 1).unwrap();
    let fm_out = fm_conv.forward(&x).unwrap().features;
    assert_map_symmetric(&fm_out, 1e-10);

    let cayley = CayleyConv::new(2, 1, 3, 1).unwrap();
    let cayley_out = cayley.forward(&x).unwrap().features;
    assert_map_symmetric(&cayley_out, 1e-12);
}

// =========================================================================
// TEST 6: Distance layer end to end
// =========================================================================

#[test]
fn test_identical_samples_give_zero_embedding() {
    // every sample equals the global mean, so the whole embedding is
    // zero up to the stabilization epsilons
    let x = identity_map(5, 1, 4, 4);
    let out = SpdDistance::new().forward(&x).unwrap();
    assert_eq!(out.shape(), &[5, 16]);
    for v in out.iter() {
        assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-6);
    }
}

// =========================================================================
// TEST 7: Autoencoder composition and persistence
// =========================================================================

#[test]
fn test_autoencoder_round_trips_shape_and_state() {
    let mut model = SpdAutoencoder::new(1, 2, 3).unwrap();
    let x = identity_map(2, 1, 6, 6);
    let out = model.forward(&x).unwrap();
    assert_eq!(out.shape(), x.shape());
    assert_map_symmetric(&out, 1e-10);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    spdnet::io::save_state_dict_json(&model.state_dict(), &path).unwrap();
    let restored = spdnet::io::load_state_dict_json(&path).unwrap();
    model.load_state_dict(&restored).unwrap();

    let again = model.forward(&x).unwrap();
    for (a, b) in out.iter().zip(again.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
    }
}
