/// Integration test for the full generation pipeline

use avlos_codegen_lib::*;
use avlos_ir::DeviceTree;
use avlos_parser::{build_tree, BuildOptions};
use serde_json::json;

fn fixture_tree() -> DeviceTree {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../testdata/good_device.yaml");
    let doc: serde_json::Value =
        serde_yml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    build_tree(&doc, BuildOptions::default()).unwrap()
}

fn c_generator(dir: &std::path::Path) -> CGenerator {
    let mut config = CGeneratorConfig::new(
        dir.join("tm_enums.h").display().to_string(),
        dir.join("tm.h").display().to_string(),
        dir.join("tm.c").display().to_string(),
    );
    config.impl_includes = vec!["\"src/common.h\"".into()];
    CGenerator::new(config)
}

/// Text of one generated function definition.
fn definition<'a>(code: &'a str, fn_name: &str) -> &'a str {
    let start = code
        .find(&format!("uint8_t {}(", fn_name))
        .unwrap_or_else(|| panic!("{} not generated", fn_name));
    let end = start + code[start..].find("\n}\n").unwrap() + 3;
    &code[start..end]
}

fn no_format() -> GenerateOptions {
    GenerateOptions {
        format: false,
        ..Default::default()
    }
}

#[test]
fn test_pipeline_writes_all_files() {
    let tree = fixture_tree();
    let dir = tempfile::tempdir().unwrap();
    let c = c_generator(dir.path());
    let rst = RstGenerator {
        config: RstGeneratorConfig {
            output_file: dir.path().join("docs/api.rst").display().to_string(),
        },
    };

    let written = generate(&tree, &[&c, &rst], &no_format()).unwrap();
    assert_eq!(written.len(), 4);
    for path in &written {
        assert!(path.exists(), "{} missing", path.display());
    }

    let header = std::fs::read_to_string(dir.path().join("tm.h")).unwrap();
    assert!(header.contains("#include \"tm_enums.h\""));
    assert!(header.contains("AVLOS_CMD_READ = 1"));
    assert!(header.contains("AVLOS_RET_WRITE = 2"));
    assert!(header.contains(&format!("return {}u;", tree.hash_string())));
    assert!(header.contains("extern uint8_t (*const avlos_endpoints[20])"));
    assert!(header.contains("uint8_t avlos_motor_R(uint8_t * buffer, uint8_t * buffer_len, AvlosCommand cmd);"));

    let enums = std::fs::read_to_string(dir.path().join("tm_enums.h")).unwrap();
    assert!(enums.contains("MOTOR_TYPE_GIMBAL = 1"));
    assert!(enums.contains("} controller_state_options;"));
    assert!(enums.contains("ERRORS_CHARGE_PUMP_FAULT = (1 << 2)"));

    let docs = std::fs::read_to_string(dir.path().join("docs/api.rst")).unwrap();
    assert!(docs.contains(".. _api-reset:"));
}

#[test]
fn test_dispatchers() {
    let tree = fixture_tree();
    let dir = tempfile::tempdir().unwrap();
    let code = c_generator(dir.path()).generate(&tree).unwrap();
    let impl_c = &code.file(&dir.path().join("tm.c").display().to_string()).unwrap().content;

    assert!(impl_c.contains("#include \"tm.h\"\n#include \"src/common.h\"\n"));

    // Table order is ID order with the hash accessor first.
    assert!(impl_c.contains("&avlos_get_hash,\n    &avlos_sn,\n    &avlos_nickname,"));
    assert!(impl_c.contains("&avlos_stats_move\n};"));

    let vbus = definition(impl_c, "avlos_Vbus");
    assert!(impl_c.contains("TM_RAMFUNC uint8_t avlos_Vbus("));
    assert!(vbus.contains("float v;\n        v = system_get_Vbus();"));
    assert!(!vbus.contains("AVLOS_CMD_WRITE"));

    let r = definition(impl_c, "avlos_motor_R");
    assert!(r.contains("if (AVLOS_CMD_READ == cmd)"));
    assert!(r.contains("else if (AVLOS_CMD_WRITE == cmd)"));
    assert!(r.contains("motor_set_R(v);\n        return AVLOS_RET_WRITE;"));
    assert!(r.ends_with("    return AVLOS_RET_NOACTION;\n}\n"));

    let state = definition(impl_c, "avlos_controller_state");
    assert!(state.contains("uint8_t v;"));

    let nickname = definition(impl_c, "avlos_nickname");
    assert!(nickname.contains("return _avlos_getter_string(buffer, buffer_len, system_get_name);"));
    assert!(nickname.contains("return _avlos_setter_string(buffer, buffer_len, system_set_name);"));
    assert!(impl_c.contains("static uint8_t _avlos_getter_string(uint8_t * buffer, uint8_t * buffer_len, uint8_t (*getter)(char *))\n{"));
}

#[test]
fn test_function_dispatchers() {
    let tree = fixture_tree();
    let dir = tempfile::tempdir().unwrap();
    let code = c_generator(dir.path()).generate(&tree).unwrap();
    let impl_c = &code.files[2].content;

    // Two int32 arguments, void return: no payload, NOACTION.
    let mv = definition(impl_c, "avlos_stats_move");
    assert!(mv.contains("int32_t x;\n    int32_t y;\n    uint8_t _offset = 0;\n"));
    assert!(mv.contains("memcpy(&x, buffer + _offset, sizeof(x));\n    _offset += sizeof(x);\n"));
    assert!(mv.contains("memcpy(&y, buffer + _offset, sizeof(y));\n    _offset += sizeof(y);\n"));
    assert!(mv.contains("stats_move(x, y);\n    *buffer_len = 0;\n    return AVLOS_RET_NOACTION;"));
    assert!(!mv.contains("ret_val"));

    // Same arguments, uint32 return: 4-byte payload, READ.
    let add = definition(impl_c, "avlos_stats_add");
    assert!(add.contains("uint32_t ret_val = stats_add(a, b);"));
    assert!(add.contains("memcpy(buffer, &ret_val, sizeof(ret_val));"));
    assert!(add.contains("*buffer_len = sizeof(ret_val);\n    return AVLOS_RET_READ;"));

    // No arguments: no offset bookkeeping.
    let reset = definition(impl_c, "avlos_reset");
    assert!(!reset.contains("_offset"));
    assert!(reset.contains("system_reset();"));

    let pv = definition(impl_c, "avlos_controller_set_pos_vel_setpoints");
    assert!(pv.contains(
        "float ret_val = controller_set_pos_vel_setpoints(pos_setpoint, vel_setpoint);"
    ));
}

#[test]
fn test_generation_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let a = c_generator(dir.path()).generate(&fixture_tree()).unwrap();
    let b = c_generator(dir.path()).generate(&fixture_tree()).unwrap();
    for (x, y) in a.files.iter().zip(&b.files) {
        assert_eq!(x.content, y.content);
    }
}

#[test]
fn test_root_name_in_identifiers() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../testdata/good_device.yaml");
    let doc: serde_json::Value =
        serde_yml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    let tree = build_tree(
        &doc,
        BuildOptions {
            include_root_name: true,
        },
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let code = c_generator(dir.path()).generate(&tree).unwrap();
    assert!(code.files[2].content.contains("uint8_t avlos_tm_motor_R("));
}

#[test]
fn test_validation_failure_writes_nothing() {
    let doc = json!({
        "name": "tm",
        "remote_attributes": [
            {"name": "bad-name", "dtype": "float", "getter_name": "return"},
        ]
    });
    let tree = build_tree(&doc, BuildOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let c = c_generator(dir.path());

    let err = generate(&tree, &[&c], &no_format()).unwrap_err();
    match &err {
        GenerateError::Validation(errors) => assert!(errors.len() >= 2, "{:?}", errors),
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("'bad-name'"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_identifier_clashes_in_generated_c_are_rejected() {
    let doc = json!({
        "name": "tm",
        "remote_attributes": [
            {"name": "get_hash", "dtype": "uint32", "getter_name": "sys_get_hash"},
            {"name": "errors", "flags": ["NONE", "OVERCURRENT"], "getter_name": "get_errors"},
            {"name": "f", "caller_name": "do_f", "dtype": "uint32", "arguments": [
                {"name": "buffer", "dtype": "int32"},
                {"name": "ret_val", "dtype": "int32"},
            ]},
        ]
    });
    let tree = build_tree(&doc, BuildOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let c = c_generator(dir.path());

    let err = generate(&tree, &[&c], &no_format()).unwrap_err();
    let GenerateError::Validation(errors) = &err else {
        panic!("unexpected error: {}", err);
    };
    let layers: Vec<&str> = errors.iter().map(|e| e.layer.as_str()).collect();
    assert_eq!(layers, vec!["name", "name", "function", "enumerator"], "{:?}", errors);
    assert!(err.to_string().contains("avlos_get_hash"));
    assert!(err.to_string().contains("ERRORS_NONE"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_repeated_members_fail_to_build() {
    let doc = json!({
        "name": "tm",
        "remote_attributes": [
            {"name": "mode", "options": ["A", "A"], "getter_name": "get_mode"},
            {"name": "f", "caller_name": "do_f", "arguments": [
                {"name": "x", "dtype": "int32"},
                {"name": "x", "dtype": "int32"},
            ]},
        ]
    });
    let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
    let paths: Vec<&str> = err.issues.iter().map(|i| i.path.as_str()).collect();
    assert_eq!(paths, vec!["tm.mode.A", "tm.f.x"]);
}

#[test]
fn test_generator_error_writes_nothing() {
    let doc = json!({
        "name": "tm",
        "remote_attributes": [
            {"name": "x", "dtype": "float", "getter_name": "get_x"},
        ]
    });
    let tree = build_tree(&doc, BuildOptions::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut c = c_generator(dir.path());
    c.config.max_payload = 0;

    let err = generate(&tree, &[&c], &no_format()).unwrap_err();
    assert!(matches!(err, GenerateError::Generator { .. }));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_formatting_is_best_effort() {
    // Succeeds whether or not clang-format is installed.
    let tree = fixture_tree();
    let dir = tempfile::tempdir().unwrap();
    let c = c_generator(dir.path());
    let written = generate(&tree, &[&c], &GenerateOptions::default()).unwrap();
    assert_eq!(written.len(), 3);
}
