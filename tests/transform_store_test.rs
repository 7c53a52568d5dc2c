use cgmath::Vector3;
use herd_engine::{
    EngineConfig, EngineError, Instance, ModelRegistry, TransformEncoding, TransformStore,
    data_structures::transforms::{decode_byte, encode_byte},
};

mod common;

fn at(x: f32, y: f32, z: f32) -> Instance {
    Vector3::new(x, y, z).into()
}

fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new(&EngineConfig::default());
    registry.load_mesh("quad", &common::quad()).unwrap();
    registry.load_mesh("tri", &common::triangle()).unwrap();
    registry
}

#[test]
fn should_flush_in_registry_order() {
    let mut registry = registry();
    let mut store = TransformStore::new(TransformEncoding::Float);

    // Spawned out of registration order on purpose.
    registry.add_instances("tri", 1).unwrap();
    store.add_instance("tri", at(7.0, 0.0, 0.0));
    registry.add_instances("quad", 2).unwrap();
    store.add_instance("quad", at(1.0, 2.0, 3.0));
    store.add_instance("quad", at(4.0, 0.0, 0.0));

    let encoded = store.flush(&registry).unwrap();

    assert_eq!(encoded.instance_count, 3);
    assert_eq!(encoded.height(), 3);
    assert_eq!(encoded.data.len(), 3 * 16 * 4);
    assert_eq!(encoded.bytes_per_row(), 64);
    // Translation sits in the fourth column of each column-major matrix.
    let translation = |instance: usize| {
        let base = instance * 16 + 12;
        [encoded.value(base), encoded.value(base + 1), encoded.value(base + 2)]
    };
    assert_eq!(translation(0), [1.0, 2.0, 3.0]);
    assert_eq!(translation(1), [4.0, 0.0, 0.0]);
    assert_eq!(translation(2), [7.0, 0.0, 0.0]);
    assert_eq!(encoded.value(15), 1.0);
}

#[test]
fn should_detect_total_drift() {
    let mut registry = registry();
    let store = TransformStore::new(TransformEncoding::Float);
    registry.add_instances("quad", 1).unwrap();

    assert!(matches!(
        store.flush(&registry),
        Err(EngineError::InstanceCountMismatch {
            transforms: 0,
            instances: 1
        })
    ));
}

#[test]
fn should_detect_per_mesh_drift() {
    let mut registry = registry();
    let mut store = TransformStore::new(TransformEncoding::Float);
    registry.add_instances("quad", 1).unwrap();
    store.add_instance("tri", Instance::new());

    match store.flush(&registry) {
        Err(EngineError::MeshInstanceMismatch { name, .. }) => assert_eq!(name, "quad"),
        other => panic!("expected a per-mesh mismatch, got {other:?}"),
    }
}

#[test]
fn should_ignore_removing_unknown_instances() {
    let mut store = TransformStore::new(TransformEncoding::Float);
    let key = store.add_instance("quad", Instance::new());

    assert!(store.remove_instance("quad", key));
    assert!(!store.remove_instance("quad", key));
    assert!(!store.remove_instance("tri", key));
    assert_eq!(store.total(), 0);
}

#[test]
fn should_update_live_transforms_in_place() {
    let mut store = TransformStore::new(TransformEncoding::Float);
    let first = store.add_instance("quad", at(1.0, 0.0, 0.0));
    let second = store.add_instance("quad", at(2.0, 0.0, 0.0));

    assert!(store.set_transform("quad", second, at(5.0, 0.0, 0.0)));
    store.remove_instance("quad", first);

    assert_eq!(store.count("quad"), 1);
    assert_eq!(store.transform("quad", second), Some(&at(5.0, 0.0, 0.0)));
    assert!(!store.set_transform("quad", first, Instance::new()));
}

#[test]
fn should_quantize_into_bytes() {
    let scale = TransformEncoding::DEFAULT_BYTE_SCALE;
    assert_eq!(encode_byte(0.0, scale), 128);
    assert_eq!(encode_byte(-scale, scale), 0);
    assert_eq!(encode_byte(scale, scale), 255);
    assert_eq!(encode_byte(10.0 * scale, scale), 255);

    let step = 2.0 * scale / 255.0;
    for value in [-30.5, -1.0, 0.25, 12.0, 63.0] {
        let decoded = decode_byte(encode_byte(value, scale), scale);
        assert!((decoded - value).abs() <= step / 2.0 + 1e-4, "{value} -> {decoded}");
    }
}

#[test]
fn should_flush_byte_encoded_transforms() {
    let mut registry = registry();
    let mut store = TransformStore::new(TransformEncoding::byte_default());
    registry.add_instances("quad", 1).unwrap();
    store.add_instance("quad", at(8.0, -4.0, 0.0));

    let encoded = store.flush(&registry).unwrap();

    assert_eq!(encoded.data.len(), 16);
    assert_eq!(encoded.bytes_per_row(), 16);
    assert_eq!(encoded.scale(), 64.0);
    let tolerance = 64.0 / 255.0;
    assert!((encoded.value(12) - 8.0).abs() <= tolerance);
    assert!((encoded.value(13) + 4.0).abs() <= tolerance);
    assert!((encoded.value(0) - 1.0).abs() <= tolerance);
}
