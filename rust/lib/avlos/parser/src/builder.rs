//! Schema document -> device tree.
//!
//! Recursive descent over the document. Structural problems are collected
//! rather than returned one at a time, so a single run reports every issue.

use avlos_ir::{
    registry, Argument, Attribute, Bitmask, BitmaskEndpoint, DataType, DeviceTree, Entity,
    EntityId, EntityInfo, EnumEndpoint, Function, Meta, Node, OptionSet, TreeError, TreeOptions,
    Unit, UnitRegistry,
};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::allocator::EndpointAllocator;
use crate::error::{SchemaError, SchemaIssue, SchemaIssueKind};
use crate::hash::hash_document;

/// Per-build options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Include the root's own name in full names and generated identifiers.
    pub include_root_name: bool,
}

/// Build a device tree from a schema document.
///
/// Endpoint IDs are assigned in pre-order starting at 1 (0 is the hash
/// accessor). The version hash is computed over the canonical document.
pub fn build_tree(doc: &Value, options: BuildOptions) -> Result<DeviceTree, SchemaError> {
    let mut builder = Builder {
        allocator: EndpointAllocator::new(),
        issues: Vec::new(),
        units: registry(),
    };
    let tree = builder.root(doc, options);
    match tree {
        Some(mut tree) if builder.issues.is_empty() => {
            tree.set_hash(hash_document(doc));
            info!(
                root = %tree.root().info.name,
                endpoints = tree.endpoints().len(),
                hash = %tree.hash_string(),
                "built device tree"
            );
            Ok(tree)
        }
        _ => Err(SchemaError {
            issues: builder.issues,
        }),
    }
}

struct Builder {
    allocator: EndpointAllocator,
    issues: Vec<SchemaIssue>,
    units: &'static UnitRegistry,
}

/// Designator keys with their legacy aliases.
const GETTER_KEYS: [&str; 2] = ["getter_name", "c_getter"];
const SETTER_KEYS: [&str; 2] = ["setter_name", "c_setter"];
const CALLER_KEYS: [&str; 2] = ["caller_name", "c_caller"];

/// Enum options travel as a `uint8` index.
const MAX_OPTIONS: usize = u8::MAX as usize + 1;

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

impl Builder {
    fn issue(&mut self, path: &str, kind: SchemaIssueKind) {
        self.issues.push(SchemaIssue {
            path: path.to_string(),
            kind,
        });
    }

    fn root(&mut self, doc: &Value, options: BuildOptions) -> Option<DeviceTree> {
        let Some(obj) = doc.as_object() else {
            self.issue(
                "",
                SchemaIssueKind::InvalidField {
                    field: "document",
                    expected: "a mapping",
                },
            );
            return None;
        };
        let name = self.name(obj, "");
        let path = name.clone().unwrap_or_default();
        let info = self.info(obj, name.unwrap_or_default(), &path);
        let mut tree = DeviceTree::new(
            info,
            TreeOptions {
                include_root_name: options.include_root_name,
            },
        );
        match obj.get("remote_attributes") {
            Some(children) => self.children(&mut tree, Some(EntityId::ROOT), children, &path),
            None => self.issue(&path, SchemaIssueKind::RootNotContainer),
        }
        Some(tree)
    }

    /// Build each child of `children`. With `parent == None` the children
    /// are only checked, not added.
    fn children(
        &mut self,
        tree: &mut DeviceTree,
        parent: Option<EntityId>,
        children: &Value,
        path: &str,
    ) {
        let Some(items) = children.as_array() else {
            self.issue(
                path,
                SchemaIssueKind::InvalidField {
                    field: "remote_attributes",
                    expected: "a list",
                },
            );
            return;
        };
        for (index, item) in items.iter().enumerate() {
            self.node(tree, parent, item, path, index);
        }
    }

    fn node(
        &mut self,
        tree: &mut DeviceTree,
        parent: Option<EntityId>,
        value: &Value,
        parent_path: &str,
        index: usize,
    ) {
        let Some(obj) = value.as_object() else {
            self.issue(
                &format!("{}[{}]", parent_path, index),
                SchemaIssueKind::InvalidField {
                    field: "remote_attributes",
                    expected: "a list of mappings",
                },
            );
            return;
        };
        let fallback = format!("{}[{}]", parent_path, index);
        let name = self.name(obj, &fallback);
        let path = match &name {
            Some(n) => join(parent_path, n),
            None => fallback,
        };
        let info = self.info(obj, name.clone().unwrap_or_default(), &path);

        if let Some(children) = obj.get("remote_attributes") {
            let id = match (parent, name.is_some()) {
                (Some(p), true) => self.add(tree, p, Entity::Node(Node::new(info)), &path),
                _ => None,
            };
            self.children(tree, id, children, &path);
            return;
        }

        let entity = self.endpoint(obj, info, &path);
        if let (Some(entity), Some(p), true) = (entity, parent, name.is_some()) {
            self.add(tree, p, entity, &path);
        }
    }

    fn add(
        &mut self,
        tree: &mut DeviceTree,
        parent: EntityId,
        entity: Entity,
        path: &str,
    ) -> Option<EntityId> {
        let name = entity.name().to_string();
        match tree.add(parent, entity) {
            Ok(id) => Some(id),
            Err(TreeError::DuplicateName { .. }) => {
                self.issue(path, SchemaIssueKind::DuplicateName(name));
                None
            }
            Err(e) => {
                self.issue(
                    path,
                    SchemaIssueKind::InvalidField {
                        field: "remote_attributes",
                        expected: match e {
                            TreeError::NotAContainer(_) => "declared on a container",
                            _ => "attached to a known parent",
                        },
                    },
                );
                None
            }
        }
    }

    /// Select the endpoint kind and build it.
    fn endpoint(&mut self, obj: &Map<String, Value>, info: EntityInfo, path: &str) -> Option<Entity> {
        let getter = self.designator(obj, GETTER_KEYS, path);
        let setter = self.designator(obj, SETTER_KEYS, path);
        let caller = self.designator(obj, CALLER_KEYS, path);
        let dtype_name = self.string(obj, "dtype", path);
        let flags = self.name_list(obj, "flags", path);
        let options = self.name_list(obj, "options", path);
        let unit = self.unit(obj, path);

        if getter.is_none() && setter.is_none() && caller.is_none() {
            self.issue(path, SchemaIssueKind::NoRole);
            return None;
        }
        if caller.is_some() && (getter.is_some() || setter.is_some()) {
            self.issue(path, SchemaIssueKind::ConflictingRoles);
            return None;
        }
        if caller.is_none() && obj.contains_key("arguments") {
            self.issue(path, SchemaIssueKind::ArgumentsOnNonFunction);
        }

        let dtype = match dtype_name {
            Some(s) => match DataType::from_name(&s) {
                Some(t) => Some(t),
                None => {
                    self.issue(path, SchemaIssueKind::UnknownType(s));
                    return None;
                }
            },
            None => None,
        };

        if let Some(caller_name) = caller {
            if flags.is_some() || options.is_some() {
                self.issue(path, SchemaIssueKind::FunctionWithOptions);
            }
            let arguments = self.arguments(obj, path)?;
            let ep_id = self.allocate(path)?;
            return Some(Entity::Function(Function {
                info,
                caller_name,
                arguments,
                dtype: dtype.unwrap_or(DataType::Void),
                unit,
                ep_id,
            }));
        }

        let declared = [dtype.is_some(), flags.is_some(), options.is_some()]
            .into_iter()
            .filter(|d| *d)
            .count();
        if declared == 0 {
            self.issue(path, SchemaIssueKind::MissingType);
            return None;
        }
        if declared > 1 {
            self.issue(path, SchemaIssueKind::AmbiguousType);
            return None;
        }

        if let Some(dtype) = dtype {
            if dtype.is_void() {
                self.issue(path, SchemaIssueKind::VoidAttribute);
                return None;
            }
            let ep_id = self.allocate(path)?;
            return Some(Entity::Attribute(Attribute {
                info,
                dtype,
                unit,
                getter_name: getter,
                setter_name: setter,
                ep_id,
            }));
        }

        if let Some(flags) = flags {
            if flags.is_empty() {
                self.issue(path, SchemaIssueKind::EmptyFlags);
                return None;
            }
            let ep_id = self.allocate(path)?;
            return Some(Entity::Bitmask(BitmaskEndpoint {
                info,
                flags: Bitmask::new(flags),
                getter_name: getter,
                setter_name: setter,
                ep_id,
            }));
        }

        let options = options.unwrap_or_default();
        if options.is_empty() {
            self.issue(path, SchemaIssueKind::EmptyOptions);
            return None;
        }
        if options.len() > MAX_OPTIONS {
            self.issue(
                path,
                SchemaIssueKind::TooManyOptions {
                    count: options.len(),
                    max: MAX_OPTIONS,
                },
            );
            return None;
        }
        let ep_id = self.allocate(path)?;
        Some(Entity::Enum(EnumEndpoint {
            info,
            options: OptionSet::new(options),
            getter_name: getter,
            setter_name: setter,
            ep_id,
        }))
    }

    fn allocate(&mut self, path: &str) -> Option<u16> {
        match self.allocator.next_id() {
            Some(id) => {
                debug!(ep_id = id, endpoint = %path, "assigned endpoint id");
                Some(id)
            }
            None => {
                self.issue(path, SchemaIssueKind::EndpointSpaceExhausted);
                None
            }
        }
    }

    fn arguments(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Vec<Argument>> {
        let Some(value) = obj.get("arguments") else {
            return Some(Vec::new());
        };
        let Some(items) = value.as_array() else {
            self.issue(
                path,
                SchemaIssueKind::InvalidField {
                    field: "arguments",
                    expected: "a list",
                },
            );
            return None;
        };

        let mut ok = true;
        let mut args: Vec<Argument> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let Some(arg) = item.as_object() else {
                self.issue(
                    path,
                    SchemaIssueKind::InvalidField {
                        field: "arguments",
                        expected: "a list of mappings",
                    },
                );
                ok = false;
                continue;
            };
            let Some(name) = arg.get("name").and_then(Value::as_str) else {
                self.issue(path, SchemaIssueKind::ArgumentMissingName { index });
                ok = false;
                continue;
            };
            let arg_path = join(path, name);
            if args.iter().any(|a| a.name == name) {
                self.issue(&arg_path, SchemaIssueKind::DuplicateName(name.to_string()));
                ok = false;
                continue;
            }
            let dtype_name = arg.get("dtype").and_then(Value::as_str).unwrap_or_default();
            let dtype = DataType::from_name(dtype_name).filter(DataType::is_fixed_width);
            let unit = self.unit(arg, &arg_path);
            let Some(dtype) = dtype else {
                self.issue(
                    &arg_path,
                    SchemaIssueKind::InvalidArgumentType {
                        name: name.to_string(),
                        dtype: dtype_name.to_string(),
                    },
                );
                ok = false;
                continue;
            };
            args.push(Argument {
                name: name.to_string(),
                summary: self.string(arg, "summary", &arg_path),
                dtype,
                unit,
            });
        }
        ok.then_some(args)
    }

    fn name(&mut self, obj: &Map<String, Value>, path: &str) -> Option<String> {
        match obj.get("name") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.issue(
                    path,
                    SchemaIssueKind::InvalidField {
                        field: "name",
                        expected: "a string",
                    },
                );
                None
            }
            None => {
                self.issue(path, SchemaIssueKind::MissingName);
                None
            }
        }
    }

    fn info(&mut self, obj: &Map<String, Value>, name: String, path: &str) -> EntityInfo {
        EntityInfo {
            name,
            summary: self.string(obj, "summary", path),
            parent: None,
            meta: self.meta(obj, path),
            func_attr: self.string(obj, "func_attr", path),
            rst_target: self.string(obj, "rst_target", path),
        }
    }

    /// `export` may be given at the top level or inside `meta`.
    fn meta(&mut self, obj: &Map<String, Value>, path: &str) -> Meta {
        let mut meta = Meta::default();
        match obj.get("meta") {
            None | Some(Value::Null) => {}
            Some(Value::Object(map)) => {
                for (k, v) in map {
                    if k == "export" {
                        meta.export = v.as_bool().unwrap_or(false);
                    } else {
                        meta.extra.insert(k.clone(), v.clone());
                    }
                }
            }
            Some(_) => self.issue(
                path,
                SchemaIssueKind::InvalidField {
                    field: "meta",
                    expected: "a mapping",
                },
            ),
        }
        match obj.get("export") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(b)) => meta.export = *b,
            Some(_) => self.issue(
                path,
                SchemaIssueKind::InvalidField {
                    field: "export",
                    expected: "a boolean",
                },
            ),
        }
        meta
    }

    fn string(&mut self, obj: &Map<String, Value>, field: &'static str, path: &str) -> Option<String> {
        match obj.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.issue(
                    path,
                    SchemaIssueKind::InvalidField {
                        field,
                        expected: "a string",
                    },
                );
                None
            }
        }
    }

    fn designator(
        &mut self,
        obj: &Map<String, Value>,
        keys: [&'static str; 2],
        path: &str,
    ) -> Option<String> {
        let [primary, alias] = keys;
        self.string(obj, primary, path)
            .or_else(|| self.string(obj, alias, path))
    }

    fn name_list(
        &mut self,
        obj: &Map<String, Value>,
        field: &'static str,
        path: &str,
    ) -> Option<Vec<String>> {
        let value = obj.get(field)?;
        let names: Option<Vec<String>> = value.as_array().and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect()
        });
        if names.is_none() {
            self.issue(
                path,
                SchemaIssueKind::InvalidField {
                    field,
                    expected: "a list of names",
                },
            );
        }
        let names = names.unwrap_or_default();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                self.issue(&join(path, name), SchemaIssueKind::DuplicateName(name.clone()));
            }
        }
        // Keep the field "present" so kind selection still sees it.
        Some(names)
    }

    fn unit(&mut self, obj: &Map<String, Value>, path: &str) -> Option<Unit> {
        let expr = self.string(obj, "unit", path)?;
        match self.units.parse(&expr) {
            Ok(unit) => Some(unit),
            Err(e) => {
                self.issue(path, SchemaIssueKind::Unit(e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> Value {
        json!({
            "name": "tm",
            "remote_attributes": [
                {"name": "Vbus", "dtype": "float", "unit": "volt", "getter_name": "system_get_Vbus"},
                {"name": "motor", "remote_attributes": [
                    {"name": "R", "dtype": "float", "unit": "ohm",
                     "getter_name": "motor_get_R", "setter_name": "motor_set_R"},
                    {"name": "type", "options": ["HIGH_CURRENT", "GIMBAL"],
                     "getter_name": "motor_get_type", "setter_name": "motor_set_type"},
                ]},
                {"name": "errors", "flags": ["UNDERVOLTAGE", "OVERCURRENT"],
                 "getter_name": "system_get_errors"},
                {"name": "reset", "caller_name": "system_reset"},
            ]
        })
    }

    #[test]
    fn kind_selection() {
        let tree = build_tree(&device(), BuildOptions::default()).unwrap();
        let kind = |p: &str| tree[tree.resolve(p).unwrap()].kind().to_string();
        assert_eq!(kind("Vbus"), "attribute");
        assert_eq!(kind("motor"), "node");
        assert_eq!(kind("motor.type"), "enum");
        assert_eq!(kind("errors"), "bitmask");
        assert_eq!(kind("reset"), "function");
    }

    #[test]
    fn ids_in_preorder_from_one() {
        let tree = build_tree(&device(), BuildOptions::default()).unwrap();
        let ids: Vec<(String, u16)> = tree
            .endpoints()
            .into_iter()
            .map(|id| (tree.full_name(id), tree[id].ep_id().unwrap()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("Vbus".to_string(), 1),
                ("motor.R".to_string(), 2),
                ("motor.type".to_string(), 3),
                ("errors".to_string(), 4),
                ("reset".to_string(), 5),
            ]
        );
    }

    #[test]
    fn deterministic_rebuild() {
        let a = build_tree(&device(), BuildOptions::default()).unwrap();
        let b = build_tree(&device(), BuildOptions::default()).unwrap();
        assert_eq!(a.hash(), b.hash());
        let ids = |t: &DeviceTree| -> Vec<_> {
            t.endpoints().into_iter().map(|id| t[id].ep_id()).collect()
        };
        assert_eq!(ids(&a), ids(&b));
    }

    #[test]
    fn root_name_excluded_by_default() {
        let tree = build_tree(&device(), BuildOptions::default()).unwrap();
        let r = tree.resolve("motor.R").unwrap();
        assert_eq!(tree.endpoint_function_name(r), "avlos_motor_R");

        let tree = build_tree(
            &device(),
            BuildOptions {
                include_root_name: true,
            },
        )
        .unwrap();
        let r = tree.resolve("motor.R").unwrap();
        assert_eq!(tree.endpoint_function_name(r), "avlos_tm_motor_R");
    }

    #[test]
    fn function_defaults_to_void() {
        let tree = build_tree(&device(), BuildOptions::default()).unwrap();
        let f = tree[tree.resolve("reset").unwrap()].as_function().unwrap().clone();
        assert_eq!(f.dtype, DataType::Void);
        assert!(f.arguments.is_empty());
    }

    #[test]
    fn legacy_designator_aliases() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "sn", "dtype": "uint32", "c_getter": "system_get_sn"},
            {"name": "go", "c_caller": "system_go"},
        ]});
        let tree = build_tree(&doc, BuildOptions::default()).unwrap();
        assert_eq!(
            tree[tree.resolve("sn").unwrap()].getter_name(),
            Some("system_get_sn")
        );
        assert_eq!(tree[tree.resolve("go").unwrap()].caller_name(), Some("system_go"));
    }

    #[test]
    fn meta_and_export() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "a", "dtype": "float", "getter_name": "g", "export": true},
            {"name": "b", "dtype": "float", "getter_name": "g2",
             "meta": {"export": true, "dynamic": true}},
        ]});
        let tree = build_tree(&doc, BuildOptions::default()).unwrap();
        let a = tree[tree.resolve("a").unwrap()].info().meta.clone();
        assert!(a.export);
        let b = tree[tree.resolve("b").unwrap()].info().meta.clone();
        assert!(b.export);
        assert_eq!(b.extra.get("dynamic"), Some(&json!(true)));
        assert!(!b.extra.contains_key("export"));
    }

    #[test]
    fn every_issue_is_reported() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"dtype": "float", "getter_name": "g"},
            {"name": "lonely"},
            {"name": "all", "dtype": "float", "getter_name": "g", "setter_name": "s", "caller_name": "c"},
            {"name": "untyped", "getter_name": "g"},
            {"name": "bits", "flags": [], "getter_name": "g"},
            {"name": "choice", "options": [], "getter_name": "g"},
            {"name": "speed", "dtype": "float", "unit": "furlongs_per_fortnight", "getter_name": "g"},
        ]});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        let kinds: Vec<_> = err.issues.iter().map(|i| i.kind.clone()).collect();
        assert!(kinds.contains(&SchemaIssueKind::MissingName));
        assert!(kinds.contains(&SchemaIssueKind::NoRole));
        assert!(kinds.contains(&SchemaIssueKind::ConflictingRoles));
        assert!(kinds.contains(&SchemaIssueKind::MissingType));
        assert!(kinds.contains(&SchemaIssueKind::EmptyFlags));
        assert!(kinds.contains(&SchemaIssueKind::EmptyOptions));
        assert!(err.has_unit_errors());
        assert_eq!(err.issues.len(), 7);
    }

    #[test]
    fn issue_messages() {
        let doc = json!({"name": "tm", "remote_attributes": [{"name": "x"}]});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        assert_eq!(
            err.issues[0].to_string(),
            "tm.x: Either a getter, setter, caller or remote attributes list is required"
        );
    }

    #[test]
    fn argument_checks() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "f", "caller_name": "c", "arguments": [
                {"dtype": "float"},
                {"name": "label", "dtype": "string"},
                {"name": "nothing", "dtype": "void"},
            ]},
            {"name": "a", "dtype": "float", "getter_name": "g", "arguments": []},
        ]});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        let kinds: Vec<_> = err.issues.iter().map(|i| &i.kind).collect();
        assert!(kinds.contains(&&SchemaIssueKind::ArgumentMissingName { index: 0 }));
        assert_eq!(
            kinds
                .iter()
                .filter(|k| matches!(k, SchemaIssueKind::InvalidArgumentType { .. }))
                .count(),
            2
        );
        assert!(kinds.contains(&&SchemaIssueKind::ArgumentsOnNonFunction));
    }

    #[test]
    fn sibling_duplicates_rejected() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "x", "dtype": "float", "getter_name": "g"},
            {"name": "x", "dtype": "float", "getter_name": "g2"},
        ]});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        assert_eq!(
            err.issues[0].kind,
            SchemaIssueKind::DuplicateName("x".to_string())
        );
    }

    #[test]
    fn duplicate_members_rejected() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "mode", "options": ["A", "B", "A"],
             "getter_name": "get_mode", "setter_name": "set_mode"},
            {"name": "errors", "flags": ["X", "X"], "getter_name": "get_errors"},
            {"name": "f", "caller_name": "do_f", "arguments": [
                {"name": "x", "dtype": "int32"},
                {"name": "x", "dtype": "int32"},
            ]},
        ]});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        let found: Vec<(&str, &SchemaIssueKind)> = err
            .issues
            .iter()
            .map(|i| (i.path.as_str(), &i.kind))
            .collect();
        assert_eq!(
            found,
            vec![
                ("tm.mode.A", &SchemaIssueKind::DuplicateName("A".into())),
                ("tm.errors.X", &SchemaIssueKind::DuplicateName("X".into())),
                ("tm.f.x", &SchemaIssueKind::DuplicateName("x".into())),
            ]
        );
    }

    #[test]
    fn option_count_fits_wire_type() {
        let options = |n: usize| -> Vec<String> { (0..n).map(|i| format!("O{}", i)).collect() };
        let doc = |n: usize| {
            json!({"name": "tm", "remote_attributes": [
                {"name": "e", "options": options(n), "getter_name": "get_e"},
            ]})
        };
        assert!(build_tree(&doc(256), BuildOptions::default()).is_ok());
        let err = build_tree(&doc(258), BuildOptions::default()).unwrap_err();
        assert_eq!(
            err.issues[0].kind,
            SchemaIssueKind::TooManyOptions { count: 258, max: 256 }
        );
        assert_eq!(
            err.issues[0].to_string(),
            "tm.e: 258 options declared, at most 256 fit the uint8 wire value"
        );
    }

    #[test]
    fn root_must_be_container() {
        let doc = json!({"name": "tm"});
        let err = build_tree(&doc, BuildOptions::default()).unwrap_err();
        assert_eq!(err.issues[0].kind, SchemaIssueKind::RootNotContainer);
    }

    #[test]
    fn function_arguments_and_return() {
        let doc = json!({"name": "tm", "remote_attributes": [
            {"name": "set_pos_vel", "caller_name": "set_pos_vel", "dtype": "uint32",
             "arguments": [
                {"name": "pos", "dtype": "float", "unit": "tick"},
                {"name": "vel", "dtype": "float", "unit": "tick/second"},
             ]},
        ]});
        let tree = build_tree(&doc, BuildOptions::default()).unwrap();
        let f = tree[tree.resolve("set_pos_vel").unwrap()].as_function().unwrap().clone();
        assert_eq!(f.dtype, DataType::Uint32);
        let names: Vec<_> = f.arguments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["pos", "vel"]);
        assert_eq!(f.arguments[1].unit.as_ref().unwrap().name(), "tick/second");
    }
}
