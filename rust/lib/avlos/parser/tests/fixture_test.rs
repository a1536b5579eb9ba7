/// Builds the shared device fixture end to end.

use avlos_ir::{DataType, DeviceTree};
use avlos_parser::*;

fn load_fixture() -> serde_json::Value {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../testdata/good_device.yaml");
    let text = std::fs::read_to_string(path).unwrap();
    serde_yml::from_str(&text).unwrap()
}

fn build(options: BuildOptions) -> DeviceTree {
    build_tree(&load_fixture(), options).unwrap()
}

#[test]
fn test_fixture_builds() {
    let tree = build(BuildOptions::default());
    assert_eq!(tree.root().info.name, "tm");
    assert_eq!(tree.endpoints().len(), 19);

    let vbus = &tree[tree.resolve("Vbus").unwrap()];
    assert_eq!(vbus.wire_type(), Some(DataType::Float));
    assert_eq!(vbus.unit().unwrap().name(), "volt");
    assert_eq!(vbus.info().func_attr.as_deref(), Some("TM_RAMFUNC"));

    let setpoint = tree.resolve("controller.position.setpoint").unwrap();
    assert_eq!(tree.full_name(setpoint), "controller.position.setpoint");
    assert_eq!(
        tree.endpoint_function_name(setpoint),
        "avlos_controller_position_setpoint"
    );
}

#[test]
fn test_ids_are_dense_and_preorder() {
    let tree = build(BuildOptions::default());
    let ids: Vec<u16> = tree
        .endpoints()
        .into_iter()
        .filter_map(|id| tree[id].ep_id())
        .collect();
    let expected: Vec<u16> = (1..=19).collect();
    assert_eq!(ids, expected);
    assert_eq!(tree[tree.resolve("sn").unwrap()].ep_id(), Some(1));
    assert_eq!(tree[tree.resolve("motor.R").unwrap()].ep_id(), Some(6));
    assert_eq!(tree[tree.resolve("stats.move").unwrap()].ep_id(), Some(19));
}

#[test]
fn test_rebuild_is_deterministic() {
    let a = build(BuildOptions::default());
    let b = build(BuildOptions::default());
    assert_eq!(a, b);
    assert_eq!(a.hash_string(), b.hash_string());
    assert!(a.hash_string().starts_with("0x"));
}

#[test]
fn test_hash_matches_json_form() {
    // The same document loaded from JSON text hashes identically.
    let yaml_doc = load_fixture();
    let json_text = serde_json::to_string_pretty(&yaml_doc).unwrap();
    let json_doc: serde_json::Value = serde_json::from_str(&json_text).unwrap();
    assert_eq!(hash_document(&yaml_doc), hash_document(&json_doc));
}

#[test]
fn test_root_name_option() {
    let tree = build(BuildOptions {
        include_root_name: true,
    });
    let r = tree.resolve("motor.R").unwrap();
    assert_eq!(tree.full_name(r), "tm.motor.R");
    assert_eq!(tree.endpoint_function_name(r), "avlos_tm_motor_R");
}
