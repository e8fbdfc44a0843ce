// Integration tests for lamina-nn layers
//
// Every layer's backward is checked against finite differences in f64, then
// the layer-specific properties (tiling, storage sharing, loss weighting) are
// verified through the public API.

use rand::rngs::StdRng;
use rand::SeedableRng;

use lamina::prelude::*;

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() < tol
}

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: {} vs {}",
        got.len(),
        expected.len()
    );
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!(
            approx_eq(*g, *e, tol),
            "index {}: got {} expected {} (tol {})",
            i,
            g,
            e,
            tol
        );
    }
}

fn softplus(x: f64) -> f64 {
    (1.0 + x.exp()).ln()
}

fn gaussian_blob(shape: (usize, usize, usize, usize), seed: u64) -> lamina::Result<Blob<f64>> {
    let blob = Blob::new(shape);
    Filler::Gaussian {
        mean: 0.0,
        std: 1.0,
    }
    .fill_data(&blob, &mut StdRng::seed_from_u64(seed))?;
    Ok(blob)
}

/// Runs setup and forward, returning the tops.
fn run_forward(
    layer: &mut dyn Layer<f64>,
    bottom: &[&Blob<f64>],
) -> lamina::Result<Vec<Blob<f64>>> {
    let mut top: Vec<Blob<f64>> = (0..layer.exact_num_top_blobs())
        .map(|_| Blob::default())
        .collect();
    layer.setup(bottom, &mut top)?;
    layer.forward(bottom, &mut top)?;
    Ok(top)
}

// Gradient checks

#[test]
fn test_expand_gradient() -> lamina::Result<()> {
    let mut bottom = vec![gaussian_blob((2, 3, 1, 1), 1)?];
    let mut layer = ExpandLayer::new(ExpandParameter::hw(2, 3));
    let report = GradientChecker::default().check(&mut layer, &mut bottom, 0)?;
    assert_eq!(report.checked, 6);
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_expand_square_gradient() -> lamina::Result<()> {
    let mut bottom = vec![gaussian_blob((3, 2, 1, 1), 2)?];
    let mut layer = ExpandLayer::new(ExpandParameter::square(4));
    let report = GradientChecker::default().check(&mut layer, &mut bottom, 0)?;
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_reshape_gradient() -> lamina::Result<()> {
    let mut bottom = vec![gaussian_blob((2, 12, 1, 1), 3)?];
    let mut layer = ReshapeLayer::new(ReshapeParameter::new(3, 0, 2));
    let report = GradientChecker::default().check(&mut layer, &mut bottom, 0)?;
    assert_eq!(report.checked, 24);
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_sigmoid_gradient() -> lamina::Result<()> {
    let mut bottom = vec![gaussian_blob((2, 2, 3, 3), 4)?];
    let report = GradientChecker::default().check(&mut SigmoidLayer::new(), &mut bottom, 0)?;
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_loss_gradient() -> lamina::Result<()> {
    let logits = gaussian_blob((2, 3, 2, 1), 5)?;
    let targets = Blob::<f64>::from_f64_slice(
        (2, 3, 2, 1),
        &[1.0, -1.0, 0.0, 1.0, 1.0, -1.0, 0.0, -1.0, 1.0, 0.0, -1.0, 1.0],
    )?;
    let mut bottom = vec![logits, targets];
    let mut layer =
        SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::with_class_weight(2.0, 0.5));
    let report = GradientChecker::default().check(&mut layer, &mut bottom, 0)?;
    assert_eq!(report.checked, 12);
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_loss_gradient_random_targets() -> lamina::Result<()> {
    let logits = gaussian_blob((1, 4, 2, 2), 6)?;
    let targets = Blob::<f64>::new((1, 4, 2, 2));
    Filler::SignedTrinary.fill_data(&targets, &mut StdRng::seed_from_u64(7))?;
    // At least one target must count towards the normaliser.
    targets.data_mut()?[0] = 1.0;
    let mut bottom = vec![logits, targets];
    let mut layer = SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::default());
    let report = GradientChecker::default().check(&mut layer, &mut bottom, 0)?;
    assert!(report.is_ok(), "{:?}", report.mismatches);
    Ok(())
}

#[test]
fn test_loss_target_gradient_refused() -> lamina::Result<()> {
    let mut bottom = vec![
        gaussian_blob((1, 2, 1, 1), 8)?,
        Blob::from_f64_slice((1, 2, 1, 1), &[1.0, -1.0])?,
    ];
    let mut layer = SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::default());
    let result = GradientChecker::default().check(&mut layer, &mut bottom, 1);
    assert!(matches!(
        result,
        Err(Error::CannotBackpropagate { index: 1, .. })
    ));
    Ok(())
}

// Expand properties

#[test]
fn test_expand_tiles_every_position() -> lamina::Result<()> {
    for &(n, c, eh, ew) in &[(1, 1, 1, 1), (2, 3, 2, 5), (4, 1, 3, 3), (1, 6, 1, 7)] {
        let bottom = gaussian_blob((n, c, 1, 1), (n * 100 + c) as u64)?;
        let mut layer = ExpandLayer::new(ExpandParameter::hw(eh, ew));
        let top = run_forward(&mut layer, &[&bottom])?;
        assert_eq!(top[0].shape(), BlobShape::new(n, c, eh, ew));

        let x = bottom.data_to_vec()?;
        let y = top[0].data_to_vec()?;
        for i in 0..n {
            for j in 0..c {
                for h in 0..eh {
                    for w in 0..ew {
                        assert_eq!(y[top[0].offset(i, j, h, w)], x[bottom.offset(i, j, 0, 0)]);
                    }
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_expand_backward_sums_each_plane() -> lamina::Result<()> {
    let bottom = Blob::<f64>::new((2, 2, 1, 1));
    let mut layer = ExpandLayer::new(ExpandParameter::hw(2, 2));
    let top = run_forward(&mut layer, &[&bottom])?;
    let upstream: Vec<f64> = (1..=16).map(f64::from).collect();
    top[0].copy_diff_from(&upstream)?;

    let mut bottoms = vec![bottom];
    layer.backward(&[&top[0]], &[true], &mut bottoms)?;
    assert_vec_approx(&bottoms[0].diff_to_vec()?, &[10.0, 26.0, 42.0, 58.0], 1e-12);
    Ok(())
}

#[test]
fn test_expand_rejects_spatial_input() {
    let bottom = Blob::<f32>::new((1, 2, 2, 1));
    let mut layer = ExpandLayer::new(ExpandParameter::square(3));
    let mut top = vec![Blob::default()];
    assert!(matches!(
        Layer::<f32>::setup(&mut layer, &[&bottom], &mut top),
        Err(Error::ShapeMismatch { .. })
    ));
}

#[test]
fn test_expand_rejects_ambiguous_sizes() {
    let param = ExpandParameter {
        expand_size: Some(2),
        expand_h: Some(2),
        expand_w: None,
    };
    let bottom = Blob::<f32>::new((1, 1, 1, 1));
    let mut top = vec![Blob::default()];
    let result = Layer::<f32>::setup(&mut ExpandLayer::new(param), &[&bottom], &mut top);
    assert!(matches!(result, Err(Error::InvalidConfig { layer: "Expand", .. })));

    let result = Layer::<f32>::setup(
        &mut ExpandLayer::new(ExpandParameter::default()),
        &[&bottom],
        &mut top,
    );
    assert!(result.is_err());
}

// Reshape properties

#[test]
fn test_reshape_aliases_both_planes() -> lamina::Result<()> {
    let bottom = gaussian_blob((3, 4, 2, 1), 9)?;
    let mut layer = ReshapeLayer::new(ReshapeParameter::new(0, 2, 2));
    let top = run_forward(&mut layer, &[&bottom])?;
    assert_eq!(top[0].shape(), BlobShape::new(3, 2, 2, 2));
    assert!(top[0].shares_data_with(&bottom));

    let mut bottoms = vec![bottom];
    layer.backward(&[&top[0]], &[false], &mut bottoms)?;
    assert!(bottoms[0].shares_diff_with(&top[0]));
    Ok(())
}

#[test]
fn test_reshape_then_expand_rejected() -> lamina::Result<()> {
    // A reshape that produces spatial extent cannot feed an Expand.
    let bottom = Blob::<f64>::new((1, 4, 1, 1));
    let mut reshape = ReshapeLayer::new(ReshapeParameter::new(1, 2, 0));
    let top = run_forward(&mut reshape, &[&bottom])?;
    let mut expand = ExpandLayer::new(ExpandParameter::square(2));
    assert!(run_forward(&mut expand, &[&top[0]]).is_err());
    Ok(())
}

// Loss properties

#[test]
fn test_loss_end_to_end() -> lamina::Result<()> {
    let logits = Blob::<f64>::from_f64_slice((1, 3, 1, 1), &[2.0, -1.0, 0.5])?;
    let targets = Blob::<f64>::from_f64_slice((1, 3, 1, 1), &[1.0, -1.0, 0.0])?;
    let mut layer = SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::default());
    let top = run_forward(&mut layer, &[&logits, &targets])?;

    let expected = (softplus(-2.0) + softplus(-1.0)) / 2.0;
    assert!(approx_eq(top[0].data()?[0], expected, 1e-12));

    top[0].fill_diff(1.0)?;
    let mut bottoms = vec![logits, targets];
    layer.backward(&[&top[0]], &[true, false], &mut bottoms)?;
    let s = |x: f64| 1.0 / (1.0 + (-x).exp());
    assert_vec_approx(
        &bottoms[0].diff_to_vec()?,
        &[(s(2.0) - 1.0) / 2.0, s(-1.0) / 2.0, 0.0],
        1e-12,
    );
    Ok(())
}

#[test]
fn test_loss_weighting_matches_formula() -> lamina::Result<()> {
    let x = [0.3, -1.2, 2.5, -0.7, 0.0];
    let t = [1.0, 1.0, -1.0, 0.0, -1.0];
    let logits = Blob::<f64>::from_f64_slice((1, 5, 1, 1), &x)?;
    let targets = Blob::<f64>::from_f64_slice((1, 5, 1, 1), &t)?;
    let (wp, wn) = (3.0, 0.25);
    let mut layer =
        SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::with_class_weight(wp, wn));
    let top = run_forward(&mut layer, &[&logits, &targets])?;

    let mut loss = 0.0;
    let mut weight_sum = 0.0;
    for (&x, &t) in x.iter().zip(t.iter()) {
        if t > 0.0 {
            loss += wp * softplus(-x);
            weight_sum += wp;
        } else if t < 0.0 {
            loss += wn * softplus(x);
            weight_sum += wn;
        }
    }
    assert!(approx_eq(top[0].data()?[0], loss / weight_sum, 1e-12));
    assert_eq!(layer.class_weights(), (wp, wn));
    Ok(())
}

#[test]
fn test_loss_extreme_logits_finite() -> lamina::Result<()> {
    let logits = Blob::<f32>::from_f64_slice((1, 4, 1, 1), &[80.0, -80.0, 80.0, -80.0])?;
    let targets = Blob::<f32>::from_f64_slice((1, 4, 1, 1), &[1.0, -1.0, -1.0, 1.0])?;
    let mut layer = SigmoidCrossEntropyLossLayer::<f32>::new(LossParameter::default());
    let mut top = vec![Blob::default()];
    layer.setup(&[&logits, &targets], &mut top)?;
    layer.forward(&[&logits, &targets], &mut top)?;
    let loss = top[0].data()?[0];
    assert!(loss.is_finite());
    // Two confident hits and two confident misses of margin 80.
    assert!((loss - 40.0).abs() < 1e-3, "loss {loss}");
    Ok(())
}

#[test]
fn test_loss_all_zero_targets_not_finite() -> lamina::Result<()> {
    let logits = Blob::<f64>::from_f64_slice((1, 2, 1, 1), &[0.5, -0.5])?;
    let targets = Blob::<f64>::new((1, 2, 1, 1));
    let mut layer = SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::default());
    let top = run_forward(&mut layer, &[&logits, &targets])?;
    assert!(!top[0].data()?[0].is_finite());
    Ok(())
}

#[test]
fn test_loss_count_mismatch_rejected() {
    let logits = Blob::<f64>::new((1, 3, 1, 1));
    let targets = Blob::<f64>::new((1, 4, 1, 1));
    let mut layer = SigmoidCrossEntropyLossLayer::<f64>::new(LossParameter::default());
    assert!(run_forward(&mut layer, &[&logits, &targets]).is_err());
}

// Registry

#[test]
fn test_registry_builds_from_json() -> lamina::Result<()> {
    let config = LayerConfig::from_json_str(
        r#"{"name": "e", "type": "Expand", "expand_param": {"expand_size": 3}, "bottom": ["x"], "top": ["y"]}"#,
    )?;
    let mut layer = create_layer::<f64>(&config);
    assert_eq!(layer.layer_type(), "Expand");

    let bottom = Blob::<f64>::from_f64_slice((1, 1, 1, 1), &[4.0])?;
    let top = run_forward(layer.as_mut(), &[&bottom])?;
    assert_eq!(top[0].data_to_vec()?, vec![4.0; 9]);
    Ok(())
}
