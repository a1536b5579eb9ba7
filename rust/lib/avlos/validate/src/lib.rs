//! Avlos Validator
//!
//! Pre-generation checks over a built device tree:
//! - Every name (root, nodes, endpoints, arguments, options, flags) must be a
//!   legal C identifier
//! - Getter/setter/caller designators must be legal C identifiers
//! - Endpoint IDs must be unique
//! - Generated dispatcher names must not collide, with each other or with
//!   the hash accessor
//! - Function arguments must not shadow dispatcher parameters or locals
//! - Generated enumerators must be unique across the enums header
//! - Designators must match the endpoint kind
//!
//! All checks run; errors are accumulated, never short-circuited.

use std::collections::HashMap;

use avlos_ir::*;
use tracing::warn;

/// C11 keywords.
pub const C_RESERVED_WORDS: &[&str] = &[
    "auto",
    "break",
    "case",
    "char",
    "const",
    "continue",
    "default",
    "do",
    "double",
    "else",
    "enum",
    "extern",
    "float",
    "for",
    "goto",
    "if",
    "inline",
    "int",
    "long",
    "register",
    "restrict",
    "return",
    "short",
    "signed",
    "sizeof",
    "static",
    "struct",
    "switch",
    "typedef",
    "union",
    "unsigned",
    "void",
    "volatile",
    "while",
    "_Alignas",
    "_Alignof",
    "_Atomic",
    "_Bool",
    "_Complex",
    "_Generic",
    "_Imaginary",
    "_Noreturn",
    "_Static_assert",
    "_Thread_local",
];

/// Identifiers a function dispatcher declares itself. An argument with one of
/// these names would shadow it.
pub const DISPATCHER_LOCALS: &[&str] = &["buffer", "buffer_len", "cmd", "_offset", "ret_val", "memcpy"];

/// Identifiers longer than this may be truncated by some compilers.
pub const MAX_SIGNIFICANT_CHARS: usize = 63;

/// A validation error with a descriptive message.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub message: String,
    /// Which check produced the error (name, endpoint, function, designator).
    pub layer: String,
    /// Which entity the error is about (document path).
    pub context: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.layer, self.context, self.message)
    }
}

/// Errors plus non-fatal warnings.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check that `name` is a usable C identifier.
pub fn validate_c_identifier(name: &str, context: &str) -> Result<(), String> {
    let ctx = if context.is_empty() {
        String::new()
    } else {
        format!(" ({})", context)
    };
    if !is_c_identifier(name) {
        return Err(format!(
            "Invalid C identifier '{}'{}. Must start with letter or underscore, contain only alphanumeric and underscore.",
            name, ctx
        ));
    }
    if C_RESERVED_WORDS.contains(&name) {
        return Err(format!(
            "Invalid C identifier '{}'{}. '{}' is a C reserved word.",
            name, ctx, name
        ));
    }
    Ok(())
}

/// Warning text for identifiers beyond the significant-character limit.
pub fn long_identifier_warning(name: &str, context: &str) -> Option<String> {
    (name.len() > MAX_SIGNIFICANT_CHARS).then(|| {
        format!(
            "Identifier '{}' ({}) is very long ({} chars). Some compilers may truncate after {} characters.",
            name,
            context,
            name.len(),
            MAX_SIGNIFICANT_CHARS
        )
    })
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Document path of an entity, always starting at the root's name.
fn doc_path(tree: &DeviceTree, id: EntityId) -> String {
    let root = tree.root().info.name.as_str();
    let full = tree.full_name(id);
    if tree.options().include_root_name || id == EntityId::ROOT {
        if full.is_empty() {
            root.to_string()
        } else {
            full
        }
    } else {
        format!("{}.{}", root, full)
    }
}

/// Run every check, logging warnings as they are found.
pub fn validate(tree: &DeviceTree) -> ValidationReport {
    let mut report = ValidationReport::default();
    let (errors, warnings) = check_names(tree);
    report.errors.extend(errors);
    report.warnings.extend(warnings);
    report.errors.extend(validate_endpoint_ids(tree));
    report.errors.extend(validate_function_names(tree));
    report.errors.extend(validate_enumerators(tree));
    report.errors.extend(validate_designators(tree));
    report.warnings.extend(flag_width_warnings(tree));

    for id in tree.endpoints() {
        let fn_name = tree.endpoint_function_name(id);
        if let Some(w) = long_identifier_warning(&fn_name, &format!("dispatcher for {}", tree.full_name(id))) {
            report.warnings.push(w);
        }
    }
    for w in &report.warnings {
        warn!("{}", w);
    }
    report
}

/// Run every check and return all errors found (does not stop at first error).
pub fn validate_all(tree: &DeviceTree) -> Vec<ValidationError> {
    validate(tree).errors
}

/// Every entity, argument, option and flag name must be a legal identifier.
pub fn validate_names(tree: &DeviceTree) -> Vec<ValidationError> {
    check_names(tree).0
}

fn check_names(tree: &DeviceTree) -> (Vec<ValidationError>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut shadowed = Vec::new();

    let mut check = |name: &str, what: &str, path: &str| {
        let ctx = format!("{} at {}", what, path);
        if let Err(message) = validate_c_identifier(name, &ctx) {
            errors.push(ValidationError {
                message,
                layer: "name".into(),
                context: path.to_string(),
            });
        }
        warnings.extend(long_identifier_warning(name, &ctx));
    };

    for id in tree.walk() {
        let entity = &tree[id];
        let path = doc_path(tree, id);
        check(entity.name(), "node name", &path);
        match entity {
            Entity::Function(f) => {
                for (i, arg) in f.arguments.iter().enumerate() {
                    let arg_path = format!("{}.{}", path, arg.name);
                    check(&arg.name, "argument name", &arg_path);
                    if f.arguments[..i].iter().any(|a| a.name == arg.name) {
                        shadowed.push(ValidationError {
                            message: format!("Duplicate argument name '{}' at {}", arg.name, path),
                            layer: "name".into(),
                            context: arg_path.clone(),
                        });
                    }
                    if DISPATCHER_LOCALS.contains(&arg.name.as_str()) || arg.name == f.caller_name {
                        shadowed.push(ValidationError {
                            message: format!(
                                "Argument name '{}' (argument name at {}) shadows an identifier used by the generated dispatcher.",
                                arg.name, arg_path
                            ),
                            layer: "name".into(),
                            context: arg_path,
                        });
                    }
                }
            }
            Entity::Enum(e) => {
                for option in e.options.options() {
                    check(option, "option name", &format!("{}.{}", path, option));
                }
            }
            Entity::Bitmask(b) => {
                for flag in b.flags.flags() {
                    check(flag, "flag name", &format!("{}.{}", path, flag));
                }
            }
            _ => {}
        }
    }

    errors.extend(shadowed);
    (errors, warnings)
}

/// No two endpoints may share an endpoint ID.
pub fn validate_endpoint_ids(tree: &DeviceTree) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<EndpointId, String> = HashMap::new();

    for id in tree.endpoints() {
        let Some(ep_id) = tree[id].ep_id() else { continue };
        let name = tree.full_name(id);
        if ep_id == HASH_ENDPOINT_ID {
            errors.push(ValidationError {
                message: format!(
                    "Endpoint ID {} is reserved for the hash accessor: '{}'",
                    ep_id, name
                ),
                layer: "endpoint".into(),
                context: name,
            });
            continue;
        }
        match seen.get(&ep_id) {
            Some(first) => errors.push(ValidationError {
                message: format!("Duplicate endpoint ID {}: '{}' and '{}'", ep_id, name, first),
                layer: "endpoint".into(),
                context: name,
            }),
            None => {
                seen.insert(ep_id, name);
            }
        }
    }

    errors
}

/// Designators must be legal identifiers and generated dispatcher names must
/// be unique.
pub fn validate_function_names(tree: &DeviceTree) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for id in tree.endpoints() {
        let entity = &tree[id];
        let name = tree.full_name(id);
        let designators = [
            ("getter", entity.getter_name()),
            ("setter", entity.setter_name()),
            ("caller", entity.caller_name()),
        ];
        for (role, designator) in designators {
            let Some(designator) = designator else { continue };
            if let Err(message) = validate_c_identifier(designator, &format!("{} for {}", role, name)) {
                errors.push(ValidationError {
                    message,
                    layer: "function".into(),
                    context: name.clone(),
                });
            }
        }
    }

    let mut generated: HashMap<String, String> = HashMap::new();
    generated.insert(HASH_ACCESSOR.to_string(), "the hash accessor".to_string());
    for id in tree.endpoints() {
        let fn_name = tree.endpoint_function_name(id);
        let name = tree.full_name(id);
        match generated.get(&fn_name) {
            Some(first) => errors.push(ValidationError {
                message: format!(
                    "Endpoint function name collision: '{}' generated from both '{}' and '{}'",
                    fn_name, name, first
                ),
                layer: "function".into(),
                context: name,
            }),
            None => {
                generated.insert(fn_name, name);
            }
        }
    }

    errors
}

/// Enumerators of every enum and bitmask share one C namespace.
pub fn validate_enumerators(tree: &DeviceTree) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for id in tree.endpoints() {
        let name = tree.full_name(id);
        for (ident, _) in tree.enumerators(id) {
            match seen.get(&ident) {
                Some(first) => errors.push(ValidationError {
                    message: format!(
                        "Enumerator collision: '{}' generated from both '{}' and '{}'",
                        ident, name, first
                    ),
                    layer: "enumerator".into(),
                    context: name.clone(),
                }),
                None => {
                    seen.insert(ident, name.clone());
                }
            }
        }
    }

    errors
}

/// Flags past the width of the bitmask wire value can be declared but never
/// sent.
pub fn flag_width_warnings(tree: &DeviceTree) -> Vec<String> {
    let bits = OPTION_WIRE_TYPE.size().unwrap_or(1) * 8;
    tree.endpoints()
        .into_iter()
        .filter_map(|id| {
            let flags = tree[id].as_bitmask()?.flags.len();
            (flags > bits).then(|| {
                format!(
                    "Bitmask '{}' declares {} flags but the {} wire value holds {}; flags past bit {} cannot be transferred.",
                    tree.full_name(id),
                    flags,
                    OPTION_WIRE_TYPE,
                    bits,
                    bits - 1
                )
            })
        })
        .collect()
}

/// Designators and payload declarations must agree with the endpoint kind.
pub fn validate_designators(tree: &DeviceTree) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for id in tree.endpoints() {
        let name = tree.full_name(id);
        let mut push = |message: String| {
            errors.push(ValidationError {
                message,
                layer: "designator".into(),
                context: name.clone(),
            })
        };
        match &tree[id] {
            Entity::Attribute(a) => {
                if a.getter_name.is_none() && a.setter_name.is_none() {
                    push("attribute requires a getter or a setter".into());
                }
                if a.dtype.is_void() {
                    push("attribute cannot have type void".into());
                }
            }
            Entity::Function(f) => {
                if f.caller_name.is_empty() {
                    push("function requires a caller".into());
                }
                if f.dtype.is_string() {
                    push("function cannot return a string".into());
                }
                for arg in &f.arguments {
                    if !arg.dtype.is_fixed_width() {
                        push(format!(
                            "argument '{}' must have a fixed-width data type, got '{}'",
                            arg.name, arg.dtype
                        ));
                    }
                }
            }
            Entity::Enum(e) => {
                if e.getter_name.is_none() && e.setter_name.is_none() {
                    push("enum requires a getter or a setter".into());
                }
                if e.options.is_empty() {
                    push("enum requires at least one option".into());
                }
            }
            Entity::Bitmask(b) => {
                if b.getter_name.is_none() && b.setter_name.is_none() {
                    push("bitmask requires a getter or a setter".into());
                }
                if b.flags.is_empty() {
                    push("bitmask requires at least one flag".into());
                }
            }
            Entity::Node(_) => {}
        }
    }

    errors
}
