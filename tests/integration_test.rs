use batchnorm::{
    batch_norm,
    builders::BatchNormalizationBuilder,
    layers::{BatchNormConfig, BatchNormalization, LayerTrait, NormMode, WeightInit},
    loss::MSE,
    network::{FitOptions, Sequential},
    optimizer::SGD,
};
use ndarray::{Array1, Array2, Array3, ArrayD, Axis};
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::tempdir;

fn gaussian(rows: usize, features: usize, seed: u64) -> ArrayD<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Normal::new(5.0f32, 10.0).unwrap();
    Array2::random_using((rows, features), dist, &mut rng).into_dyn()
}

#[test]
fn test_end_to_end_training_normalizes_batch() {
    let x = gaussian(1000, 10, 17);

    let mut model = Sequential::new(SGD::new(), MSE);
    model.add(BatchNormalization::with_mode(&[10], 0).unwrap());

    let options = FitOptions {
        epochs: 5,
        batch_size: 32,
        seed: Some(3),
        ..FitOptions::default()
    };
    let history = model.fit(x.view(), x.view(), &options).unwrap();
    assert_eq!(history.loss.len(), 5);
    assert!(history.loss[4] < history.loss[0]);

    let layer = &mut model.layers_mut()[0];
    let out = layer.forward(x.view(), true).unwrap();
    let params = layer.parameters();
    let (gamma, beta) = (params[0].clone(), params[1].clone());

    let flat = out.into_shape((1000, 10)).unwrap();
    let normalized = (&flat - &beta) / &gamma;

    for m in normalized.mean_axis(Axis(0)).unwrap().iter() {
        assert!(m.abs() < 0.05, "mean {}", m);
    }
    for s in normalized.std_axis(Axis(0), 0.0).iter() {
        assert!((s - 1.0).abs() < 0.05, "std {}", s);
    }
}

#[test]
fn test_running_mode_tracks_data_distribution() {
    let mut layer = BatchNormalization::with_mode(&[4], 1).unwrap();

    for seed in 0..60 {
        let batch = gaussian(64, 4, seed);
        layer.normalize(batch.view(), true).unwrap();
    }

    // The moving averages converge toward Normal(5, 10)
    for &m in layer.running_mean().unwrap().iter() {
        assert!((m - 5.0).abs() < 1.5, "running mean {}", m);
    }
    for &s in layer.running_std().unwrap().iter() {
        assert!((s - 10.0).abs() < 1.5, "running std {}", s);
    }

    // Inference now roughly standardizes fresh data from the same source
    let fresh = gaussian(2000, 4, 999);
    let out = layer.normalize(fresh.view(), false).unwrap();
    let flat = out.into_shape((2000, 4)).unwrap();
    for m in flat.mean_axis(Axis(0)).unwrap().iter() {
        assert!(m.abs() < 0.2, "mean {}", m);
    }
}

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layer.bin");

    let mut layer = BatchNormalizationBuilder::new()
        .input_shape(&[2, 3])
        .mode(1)
        .epsilon(1e-3)
        .momentum(0.8)
        .gamma_init(WeightInit::Constant(1.5))
        .beta_init(WeightInit::Constant(-0.5))
        .build()
        .unwrap();

    let batch = Array3::from_shape_fn((4, 2, 3), |(a, b, c)| (a * 6 + b * 3 + c) as f32).into_dyn();
    layer.normalize(batch.view(), true).unwrap();
    layer.save(&path).unwrap();

    let mut loaded = BatchNormalization::load(&path).unwrap();
    assert_eq!(loaded.get_config(), layer.get_config());
    assert_eq!(loaded.get_weights(), layer.get_weights());
    assert_eq!(loaded.running_mean(), layer.running_mean());
    assert_eq!(loaded.running_std(), layer.running_std());
    assert_eq!(loaded.momentum(), Some(0.8));

    let expected = layer.normalize(batch.view(), false).unwrap();
    let actual = loaded.normalize(batch.view(), false).unwrap();
    assert_eq!(actual, expected);
}

#[test]
fn test_load_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.bin");
    std::fs::write(&path, b"not a layer").unwrap();

    assert!(BatchNormalization::load(&path).is_err());
    assert!(BatchNormalization::load(dir.path().join("missing.bin")).is_err());
}

#[test]
fn test_config_round_trip() {
    let layer = batch_norm!([10, 10], mode = 1, epsilon = 0.1).unwrap();
    let config = layer.get_config();

    assert_eq!(
        config,
        BatchNormConfig {
            input_shape: vec![10, 10],
            name: "BatchNormalization".to_string(),
            epsilon: 0.1,
            mode: NormMode::PerFeatureRunning,
        }
    );

    let json = config.to_json().unwrap();
    let parsed = BatchNormConfig::from_json(&json).unwrap();
    assert_eq!(parsed, config);

    let rebuilt = BatchNormalization::from_config(&parsed, Some(layer.get_weights())).unwrap();
    assert_eq!(rebuilt.get_config(), config);
    assert_eq!(rebuilt.gamma(), &Array1::<f32>::ones(10));
    assert_eq!(rebuilt.beta(), &Array1::<f32>::zeros(10));
}

#[test]
fn test_weight_injection() {
    let layer = batch_norm!([10], weights = vec![Array1::ones(10), Array1::ones(10)]).unwrap();
    assert_eq!(layer.gamma(), &Array1::<f32>::ones(10));
    assert_eq!(layer.beta(), &Array1::<f32>::ones(10));

    let err = batch_norm!([10], weights = vec![Array1::ones(10)]).unwrap_err();
    assert!(err.is_configuration());
}
