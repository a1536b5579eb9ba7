/// Embedded C generator
///
/// Emits three units from one pre-order walk of the tree:
/// - enums header: one `typedef enum` per enum/bitmask endpoint
/// - header: command/status enums, hash accessor, prototypes, pointer table
/// - implementation: one dispatcher per endpoint plus the string helpers

use std::path::Path;

use anyhow::{bail, Result};
use avlos_ir::*;
use serde::{Deserialize, Serialize};

use crate::{Codegen, GeneratedCode, GeneratedFile, AUTOGEN_NOTICE};

/// Parameter list shared by every dispatcher.
const DISPATCH_PARAMS: &str = "uint8_t * buffer, uint8_t * buffer_len, AvlosCommand cmd";

const ENDPOINT_TABLE: &str = "avlos_endpoints";
const GETTER_STRING_HELPER: &str = "_avlos_getter_string";
const SETTER_STRING_HELPER: &str = "_avlos_setter_string";

fn default_max_payload() -> u8 {
    8
}

/// Output paths of the three C units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CPaths {
    pub output_enums: String,
    pub output_header: String,
    pub output_impl: String,
}

/// Settings of the `generator_c` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CGeneratorConfig {
    pub paths: CPaths,

    /// Extra includes for the header (`stdint.h`, `"src/common.h"`, ...).
    #[serde(default)]
    pub header_includes: Vec<String>,

    #[serde(default)]
    pub impl_includes: Vec<String>,

    /// Largest payload the string helpers will read or write.
    #[serde(default = "default_max_payload")]
    pub max_payload: u8,

    /// Replace the computed protocol hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_override: Option<u32>,
}

impl CGeneratorConfig {
    pub fn new(
        output_enums: impl Into<String>,
        output_header: impl Into<String>,
        output_impl: impl Into<String>,
    ) -> Self {
        Self {
            paths: CPaths {
                output_enums: output_enums.into(),
                output_header: output_header.into(),
                output_impl: output_impl.into(),
            },
            header_includes: Vec::new(),
            impl_includes: Vec::new(),
            max_payload: default_max_payload(),
            hash_override: None,
        }
    }
}

pub struct CGenerator {
    pub config: CGeneratorConfig,
}

impl CGenerator {
    pub fn new(config: CGeneratorConfig) -> Self {
        Self { config }
    }
}

impl Codegen for CGenerator {
    fn generate(&self, tree: &DeviceTree) -> Result<GeneratedCode> {
        if self.config.max_payload == 0 {
            bail!("max_payload must be at least 1");
        }
        let paths = &self.config.paths;
        Ok(GeneratedCode {
            files: vec![
                GeneratedFile {
                    path: paths.output_enums.clone(),
                    content: generate_enums(tree),
                },
                GeneratedFile {
                    path: paths.output_header.clone(),
                    content: generate_header(tree, &self.config),
                },
                GeneratedFile {
                    path: paths.output_impl.clone(),
                    content: generate_impl(tree, &self.config)?,
                },
            ],
        })
    }

    fn language(&self) -> &str {
        "c"
    }
}

/// Render an include target with `<>` unless it is already quoted or bracketed.
pub fn as_include(input: &str) -> String {
    let quoted = input.starts_with('"') && input.ends_with('"') && input.len() > 1;
    let bracketed = input.starts_with('<') && input.ends_with('>');
    if quoted || bracketed {
        input.to_string()
    } else {
        format!("<{}>", input)
    }
}

/// `"file.h"` form of a sibling output file.
fn local_include(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    format!("\"{}\"", name)
}

fn banner() -> String {
    let mut out = String::from("/*\n");
    for line in AUTOGEN_NOTICE.lines() {
        out.push_str(&format!(" * {}\n", line));
    }
    out.push_str(" */\n");
    out
}

/// `motor.type` -> `motor_type`.
fn type_prefix(tree: &DeviceTree, id: EntityId) -> String {
    tree.full_name(id).replace('.', "_")
}

pub fn enum_type_name(tree: &DeviceTree, id: EntityId) -> String {
    format!("{}_options", type_prefix(tree, id))
}

pub fn bitmask_type_name(tree: &DeviceTree, id: EntityId) -> String {
    format!("{}_flags", type_prefix(tree, id))
}

fn generate_enums(tree: &DeviceTree) -> String {
    let mut out = banner();
    out.push_str("\n#pragma once\n");

    for id in tree.endpoints() {
        let type_name = match &tree[id] {
            Entity::Enum(_) => enum_type_name(tree, id),
            Entity::Bitmask(_) => bitmask_type_name(tree, id),
            _ => continue,
        };
        let lines: Vec<String> = tree
            .enumerators(id)
            .into_iter()
            .map(|(ident, value)| format!("    {} = {}", ident, value))
            .collect();
        out.push_str("\ntypedef enum\n{\n");
        out.push_str(&lines.join(",\n"));
        out.push_str(&format!("\n}} {};\n", type_name));
    }

    out
}

fn protocol_hash(tree: &DeviceTree, config: &CGeneratorConfig) -> u32 {
    config.hash_override.unwrap_or_else(|| tree.hash())
}

fn generate_header(tree: &DeviceTree, config: &CGeneratorConfig) -> String {
    let endpoints = tree.endpoints();
    let mut out = banner();
    out.push_str("\n#pragma once\n\n");

    for inc in ["stdint.h", "stdbool.h", "string.h"] {
        out.push_str(&format!("#include {}\n", as_include(inc)));
    }
    out.push_str(&format!(
        "#include {}\n",
        local_include(&config.paths.output_enums)
    ));
    for inc in &config.header_includes {
        out.push_str(&format!("#include {}\n", as_include(inc)));
    }

    out.push_str(&format!(
        "\n#define AVLOS_MAX_PAYLOAD ({})\n",
        config.max_payload
    ));

    out.push_str(
        "\ntypedef enum\n{\n    AVLOS_RET_NOACTION = 0,\n    AVLOS_RET_READ = 1,\n    AVLOS_RET_WRITE = 2\n} AvlosStatus;\n",
    );
    out.push_str(
        "\ntypedef enum\n{\n    AVLOS_CMD_WRITE = 0,\n    AVLOS_CMD_READ = 1\n} AvlosCommand;\n",
    );

    out.push_str(&format!(
        "\nstatic inline uint32_t _avlos_get_proto_hash(void)\n{{\n    return {:#x}u;\n}}\n",
        protocol_hash(tree, config)
    ));

    out.push_str(&format!(
        "\nextern uint8_t (*const {}[{}])({});\n",
        ENDPOINT_TABLE,
        endpoints.len() + 1,
        DISPATCH_PARAMS
    ));

    out.push_str(&prototype_comment(
        HASH_ACCESSOR,
        Some("Retrieve the protocol hash."),
        HASH_ENDPOINT_ID,
        &[],
    ));
    out.push_str(&format!("uint8_t {}({});\n", HASH_ACCESSOR, DISPATCH_PARAMS));

    for id in endpoints {
        let entity = &tree[id];
        let fn_name = tree.endpoint_function_name(id);
        let args: Vec<String> = entity
            .as_function()
            .map(|f| f.arguments.iter().map(Argument::as_function_argument).collect())
            .unwrap_or_default();
        out.push_str(&prototype_comment(
            &fn_name,
            entity.info().summary.as_deref(),
            entity.ep_id().unwrap_or_default(),
            &args,
        ));
        out.push_str(&format!("uint8_t {}({});\n", fn_name, DISPATCH_PARAMS));
    }

    out
}

fn prototype_comment(fn_name: &str, summary: Option<&str>, ep_id: EndpointId, args: &[String]) -> String {
    let mut out = format!("\n/*\n * {}\n *\n", fn_name);
    if let Some(summary) = summary {
        out.push_str(&format!(" * {}\n *\n", summary.trim()));
    }
    out.push_str(&format!(" * Endpoint ID: {}\n", ep_id));
    if !args.is_empty() {
        out.push_str(&format!(" * Arguments: {}\n", args.join(", ")));
    }
    out.push_str(" */\n");
    out
}

fn generate_impl(tree: &DeviceTree, config: &CGeneratorConfig) -> Result<String> {
    let endpoints = tree.endpoints();
    let mut out = banner();
    out.push('\n');
    out.push_str(&format!(
        "#include {}\n",
        local_include(&config.paths.output_header)
    ));
    for inc in &config.impl_includes {
        out.push_str(&format!("#include {}\n", as_include(inc)));
    }

    let has_strings = endpoints.iter().any(|id| {
        tree[*id]
            .as_attribute()
            .is_some_and(Attribute::is_string_type)
    });
    if has_strings {
        out.push_str(&format!(
            "\nstatic uint8_t {}(uint8_t * buffer, uint8_t * buffer_len, uint8_t (*getter)(char *));\n",
            GETTER_STRING_HELPER
        ));
        out.push_str(&format!(
            "static uint8_t {}(uint8_t * buffer, uint8_t * buffer_len, void (*setter)(const char *));\n",
            SETTER_STRING_HELPER
        ));
    }

    let mut table = vec![format!("&{}", HASH_ACCESSOR)];
    table.extend(
        endpoints
            .iter()
            .map(|id| format!("&{}", tree.endpoint_function_name(*id))),
    );
    out.push_str(&format!(
        "\nuint8_t (*const {}[{}])({}) = {{\n    {}\n}};\n",
        ENDPOINT_TABLE,
        table.len(),
        DISPATCH_PARAMS,
        table.join(",\n    ")
    ));

    out.push_str(&format!(
        "\nuint8_t {}({})\n{{\n    (void)cmd;\n    const uint32_t v = _avlos_get_proto_hash();\n    *buffer_len = sizeof(v);\n    memcpy(buffer, &v, sizeof(v));\n    return AVLOS_RET_READ;\n}}\n",
        HASH_ACCESSOR, DISPATCH_PARAMS
    ));

    for id in endpoints {
        out.push('\n');
        out.push_str(&dispatcher(tree, id)?);
    }

    if has_strings {
        out.push_str(&string_helpers());
    }
    Ok(out)
}

/// One dispatcher definition, prefixed with the endpoint's `func_attr`.
fn dispatcher(tree: &DeviceTree, id: EntityId) -> Result<String> {
    let entity = &tree[id];
    let fn_name = tree.endpoint_function_name(id);
    let body = match entity {
        Entity::Attribute(a) => match a.strategy() {
            AccessStrategy::ByValue => value_body(
                a.dtype.c_name(),
                a.getter_name.as_deref(),
                a.setter_name.as_deref(),
            ),
            AccessStrategy::String => {
                string_body(a.getter_name.as_deref(), a.setter_name.as_deref())
            }
        },
        Entity::Enum(e) => value_body(
            OPTION_WIRE_TYPE.c_name(),
            e.getter_name.as_deref(),
            e.setter_name.as_deref(),
        ),
        Entity::Bitmask(b) => value_body(
            OPTION_WIRE_TYPE.c_name(),
            b.getter_name.as_deref(),
            b.setter_name.as_deref(),
        ),
        Entity::Function(f) => function_body(f, &tree.full_name(id))?,
        Entity::Node(_) => bail!("'{}' is not an endpoint", tree.full_name(id)),
    };

    let mut out = String::new();
    if let Some(attr) = &entity.info().func_attr {
        out.push_str(attr.trim());
        out.push(' ');
    }
    out.push_str(&format!("uint8_t {}({})\n{{\n{}}}\n", fn_name, DISPATCH_PARAMS, body));
    Ok(out)
}

/// Emit the READ and/or WRITE branches that exist, then fall through to NOACTION.
fn command_branches(read: Option<String>, write: Option<String>) -> String {
    let mut out = String::new();
    let mut keyword = "if";
    if let Some(read) = read {
        out.push_str(&format!("    {} (AVLOS_CMD_READ == cmd)\n    {{\n{}    }}\n", keyword, read));
        keyword = "else if";
    }
    if let Some(write) = write {
        out.push_str(&format!("    {} (AVLOS_CMD_WRITE == cmd)\n    {{\n{}    }}\n", keyword, write));
    }
    out.push_str("    return AVLOS_RET_NOACTION;\n");
    out
}

fn value_body(c_type: &str, getter: Option<&str>, setter: Option<&str>) -> String {
    let read = getter.map(|g| {
        format!(
            "        {} v;\n        v = {}();\n        *buffer_len = sizeof(v);\n        memcpy(buffer, &v, sizeof(v));\n        return AVLOS_RET_READ;\n",
            c_type, g
        )
    });
    let write = setter.map(|s| {
        format!(
            "        {} v;\n        memcpy(&v, buffer, sizeof(v));\n        {}(v);\n        return AVLOS_RET_WRITE;\n",
            c_type, s
        )
    });
    command_branches(read, write)
}

fn string_body(getter: Option<&str>, setter: Option<&str>) -> String {
    let read = getter.map(|g| {
        format!(
            "        return {}(buffer, buffer_len, {});\n",
            GETTER_STRING_HELPER, g
        )
    });
    let write = setter.map(|s| {
        format!(
            "        return {}(buffer, buffer_len, {});\n",
            SETTER_STRING_HELPER, s
        )
    });
    command_branches(read, write)
}

/// Arguments are unpacked regardless of `cmd`.
fn function_body(f: &Function, full_name: &str) -> Result<String> {
    if f.dtype.is_string() {
        bail!("function '{}' cannot return a string", full_name);
    }
    let mut out = String::from("    (void)cmd;\n");
    for arg in &f.arguments {
        if !arg.dtype.is_fixed_width() {
            bail!(
                "argument '{}' of '{}' must have a fixed-width type",
                arg.name,
                full_name
            );
        }
        out.push_str(&format!("    {} {};\n", arg.dtype.c_name(), arg.name));
    }
    if !f.arguments.is_empty() {
        out.push_str("    uint8_t _offset = 0;\n");
        for arg in &f.arguments {
            out.push_str(&format!(
                "    memcpy(&{0}, buffer + _offset, sizeof({0}));\n    _offset += sizeof({0});\n",
                arg.name
            ));
        }
    }

    let call_args: Vec<&str> = f.arguments.iter().map(|a| a.name.as_str()).collect();
    let call = format!("{}({})", f.caller_name, call_args.join(", "));
    if f.dtype.is_void() {
        out.push_str(&format!("    {};\n", call));
        out.push_str("    *buffer_len = 0;\n    return AVLOS_RET_NOACTION;\n");
    } else {
        out.push_str(&format!("    {} ret_val = {};\n", f.dtype.c_name(), call));
        out.push_str("    memcpy(buffer, &ret_val, sizeof(ret_val));\n");
        out.push_str("    *buffer_len = sizeof(ret_val);\n");
        out.push_str("    return AVLOS_RET_READ;\n");
    }
    Ok(out)
}

fn string_helpers() -> String {
    format!(
        r#"
static uint8_t {getter}(uint8_t * buffer, uint8_t * buffer_len, uint8_t (*getter)(char *))
{{
    char _buf[AVLOS_MAX_PAYLOAD + 1] = {{0}};
    uint8_t len = getter(_buf);
    if (len > AVLOS_MAX_PAYLOAD)
    {{
        len = AVLOS_MAX_PAYLOAD;
    }}
    memcpy(buffer, _buf, len);
    *buffer_len = len;
    return AVLOS_RET_READ;
}}

static uint8_t {setter}(uint8_t * buffer, uint8_t * buffer_len, void (*setter)(const char *))
{{
    char _buf[AVLOS_MAX_PAYLOAD + 1] = {{0}};
    uint8_t len = *buffer_len;
    if (len > AVLOS_MAX_PAYLOAD)
    {{
        len = AVLOS_MAX_PAYLOAD;
    }}
    memcpy(_buf, buffer, len);
    _buf[len] = '\0';
    setter(_buf);
    return AVLOS_RET_WRITE;
}}
"#,
        getter = GETTER_STRING_HELPER,
        setter = SETTER_STRING_HELPER
    )
}
