//! Device tree IR: nodes and endpoints.
//!
//! The tree is an arena: every entity lives in [`DeviceTree`] and refers to
//! its parent and children by [`EntityId`]. Parent links are therefore
//! non-owning, and the whole tree is `Send + Sync` once built.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use thiserror::Error;

use crate::codec::{Bitmask, OptionSet};
use crate::types::DataType;
use crate::unit::Unit;

/// Wire identifier of an endpoint.
pub type EndpointId = u16;

/// Endpoint ID reserved for the protocol-version hash accessor.
pub const HASH_ENDPOINT_ID: EndpointId = 0;

/// Prefix of every generated dispatcher function.
pub const FUNCTION_PREFIX: &str = "avlos_";

/// Generated accessor behind [`HASH_ENDPOINT_ID`].
pub const HASH_ACCESSOR: &str = "avlos_get_hash";

/// Bitmask enumerator for "no flag set".
pub const NO_FLAGS_ENUMERATOR: &str = "NONE";

/// Index of an entity inside its [`DeviceTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(usize);

impl EntityId {
    pub const ROOT: EntityId = EntityId(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Known metadata plus a pass-through map the core never reads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    /// Participates in import/export.
    pub export: bool,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Fields shared by every entity kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityInfo {
    pub name: String,
    pub summary: Option<String>,
    pub parent: Option<EntityId>,
    pub meta: Meta,
    /// Verbatim compiler attribute placed before the generated dispatcher.
    pub func_attr: Option<String>,
    /// Documentation anchor.
    pub rst_target: Option<String>,
}

impl EntityInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A container of child entities.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub info: EntityInfo,
    /// Children in declaration order.
    pub children: Vec<EntityId>,
}

impl Node {
    pub fn new(info: EntityInfo) -> Self {
        Self {
            info,
            children: Vec::new(),
        }
    }
}

/// How the generated code moves an endpoint's value in and out of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStrategy {
    /// Fixed-width `memcpy` of a local.
    ByValue,
    /// Shared string helper with a function pointer.
    String,
}

/// A readable and/or writable scalar or string value.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub info: EntityInfo,
    pub dtype: DataType,
    pub unit: Option<Unit>,
    pub getter_name: Option<String>,
    pub setter_name: Option<String>,
    pub ep_id: EndpointId,
}

impl Attribute {
    pub fn is_string_type(&self) -> bool {
        self.dtype.is_string()
    }

    pub fn strategy(&self) -> AccessStrategy {
        if self.is_string_type() {
            AccessStrategy::String
        } else {
            AccessStrategy::ByValue
        }
    }
}

/// A positional argument of a [`Function`].
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub summary: Option<String>,
    pub dtype: DataType,
    pub unit: Option<Unit>,
}

impl Argument {
    /// `float pos_setpoint` style rendering.
    pub fn as_function_argument(&self) -> String {
        format!("{} {}", self.dtype.nickname(), self.name)
    }
}

/// A remotely callable function.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub info: EntityInfo,
    pub caller_name: String,
    pub arguments: Vec<Argument>,
    /// Return type; `Void` when nothing is returned.
    pub dtype: DataType,
    pub unit: Option<Unit>,
    pub ep_id: EndpointId,
}

/// An endpoint whose value is one of a fixed set of options.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumEndpoint {
    pub info: EntityInfo,
    pub options: OptionSet,
    pub getter_name: Option<String>,
    pub setter_name: Option<String>,
    pub ep_id: EndpointId,
}

/// An endpoint whose value is a set of flags.
#[derive(Debug, Clone, PartialEq)]
pub struct BitmaskEndpoint {
    pub info: EntityInfo,
    pub flags: Bitmask,
    pub getter_name: Option<String>,
    pub setter_name: Option<String>,
    pub ep_id: EndpointId,
}

/// Wire type of enum and bitmask endpoints, independent of option count.
pub const OPTION_WIRE_TYPE: DataType = DataType::Uint8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Node,
    Attribute,
    Function,
    Enum,
    Bitmask,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::Node => "node",
            EntityKind::Attribute => "attribute",
            EntityKind::Function => "function",
            EntityKind::Enum => "enum",
            EntityKind::Bitmask => "bitmask",
        };
        f.write_str(s)
    }
}

/// Closed set of tree entities.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Node(Node),
    Attribute(Attribute),
    Function(Function),
    Enum(EnumEndpoint),
    Bitmask(BitmaskEndpoint),
}

impl Entity {
    pub fn info(&self) -> &EntityInfo {
        match self {
            Entity::Node(n) => &n.info,
            Entity::Attribute(a) => &a.info,
            Entity::Function(f) => &f.info,
            Entity::Enum(e) => &e.info,
            Entity::Bitmask(b) => &b.info,
        }
    }

    fn info_mut(&mut self) -> &mut EntityInfo {
        match self {
            Entity::Node(n) => &mut n.info,
            Entity::Attribute(a) => &mut a.info,
            Entity::Function(f) => &mut f.info,
            Entity::Enum(e) => &mut e.info,
            Entity::Bitmask(b) => &mut b.info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Node(_) => EntityKind::Node,
            Entity::Attribute(_) => EntityKind::Attribute,
            Entity::Function(_) => EntityKind::Function,
            Entity::Enum(_) => EntityKind::Enum,
            Entity::Bitmask(_) => EntityKind::Bitmask,
        }
    }

    pub fn is_endpoint(&self) -> bool {
        !matches!(self, Entity::Node(_))
    }

    /// Endpoint ID; `None` for containers.
    pub fn ep_id(&self) -> Option<EndpointId> {
        match self {
            Entity::Node(_) => None,
            Entity::Attribute(a) => Some(a.ep_id),
            Entity::Function(f) => Some(f.ep_id),
            Entity::Enum(e) => Some(e.ep_id),
            Entity::Bitmask(b) => Some(b.ep_id),
        }
    }

    /// Type carried on the wire. For functions this is the return type.
    pub fn wire_type(&self) -> Option<DataType> {
        match self {
            Entity::Node(_) => None,
            Entity::Attribute(a) => Some(a.dtype),
            Entity::Function(f) => Some(f.dtype),
            Entity::Enum(_) | Entity::Bitmask(_) => Some(OPTION_WIRE_TYPE),
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        match self {
            Entity::Attribute(a) => a.unit.as_ref(),
            Entity::Function(f) => f.unit.as_ref(),
            _ => None,
        }
    }

    pub fn getter_name(&self) -> Option<&str> {
        match self {
            Entity::Attribute(a) => a.getter_name.as_deref(),
            Entity::Enum(e) => e.getter_name.as_deref(),
            Entity::Bitmask(b) => b.getter_name.as_deref(),
            _ => None,
        }
    }

    pub fn setter_name(&self) -> Option<&str> {
        match self {
            Entity::Attribute(a) => a.setter_name.as_deref(),
            Entity::Enum(e) => e.setter_name.as_deref(),
            Entity::Bitmask(b) => b.setter_name.as_deref(),
            _ => None,
        }
    }

    pub fn caller_name(&self) -> Option<&str> {
        match self {
            Entity::Function(f) => Some(f.caller_name.as_str()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Entity::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match self {
            Entity::Attribute(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Entity::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumEndpoint> {
        match self {
            Entity::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_bitmask(&self) -> Option<&BitmaskEndpoint> {
        match self {
            Entity::Bitmask(b) => Some(b),
            _ => None,
        }
    }
}

/// Per-build tree options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Prefix full names (and so generated function names) with the root's name.
    pub include_root_name: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("duplicate name '{name}' under '{parent}'")]
    DuplicateName { parent: String, name: String },

    #[error("'{0}' is not a container")]
    NotAContainer(String),

    #[error("unknown entity id {0}")]
    UnknownEntity(usize),
}

/// A built device tree. Structure is fixed after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTree {
    entities: Vec<Entity>,
    hash: u32,
    options: TreeOptions,
}

impl DeviceTree {
    /// Create a tree holding only its root container.
    pub fn new(root: EntityInfo, options: TreeOptions) -> Self {
        let mut info = root;
        info.parent = None;
        Self {
            entities: vec![Entity::Node(Node::new(info))],
            hash: 0,
            options,
        }
    }

    /// Append `entity` as the last child of `parent`.
    pub fn add(&mut self, parent: EntityId, mut entity: Entity) -> Result<EntityId, TreeError> {
        let parent_node = self
            .entities
            .get(parent.0)
            .ok_or(TreeError::UnknownEntity(parent.0))?
            .as_node()
            .ok_or_else(|| TreeError::NotAContainer(self.display_path(parent)))?;
        if self.child_of(parent_node, entity.name()).is_some() {
            return Err(TreeError::DuplicateName {
                parent: self.display_path(parent),
                name: entity.name().to_string(),
            });
        }
        if let Entity::Node(n) = &mut entity {
            n.children.clear();
        }
        entity.info_mut().parent = Some(parent);
        let id = EntityId(self.entities.len());
        self.entities.push(entity);
        if let Entity::Node(n) = &mut self.entities[parent.0] {
            n.children.push(id);
        }
        Ok(id)
    }

    pub fn set_hash(&mut self, hash: u32) {
        self.hash = hash;
    }

    /// Protocol version hash of the schema this tree was built from.
    pub fn hash(&self) -> u32 {
        self.hash
    }

    /// Hash formatted as a hex literal (`0x9e8dc7ac`).
    pub fn hash_string(&self) -> String {
        format!("{:#x}", self.hash)
    }

    pub fn options(&self) -> TreeOptions {
        self.options
    }

    pub fn root_id(&self) -> EntityId {
        EntityId::ROOT
    }

    pub fn root(&self) -> &Node {
        match &self.entities[0] {
            Entity::Node(n) => n,
            _ => unreachable!("root is always a node"),
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.len() <= 1
    }

    pub fn parent(&self, id: EntityId) -> Option<EntityId> {
        self.get(id).and_then(|e| e.info().parent)
    }

    /// Children of a container in declaration order; empty for endpoints.
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        match self.get(id) {
            Some(Entity::Node(n)) => &n.children,
            _ => &[],
        }
    }

    pub fn child(&self, id: EntityId, name: &str) -> Option<EntityId> {
        self.get(id)
            .and_then(Entity::as_node)
            .and_then(|n| self.child_of(n, name))
    }

    fn child_of(&self, node: &Node, name: &str) -> Option<EntityId> {
        node.children
            .iter()
            .copied()
            .find(|c| self.entities[c.0].name() == name)
    }

    /// Resolve a dotted path relative to the root (`motor.R`).
    pub fn resolve(&self, path: &str) -> Option<EntityId> {
        path.split('.')
            .filter(|s| !s.is_empty())
            .try_fold(EntityId::ROOT, |id, name| self.child(id, name))
    }

    /// Names from the root down to `id`, honouring `include_root_name`.
    pub fn path_names(&self, id: EntityId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(entity) = self.get(c) else { break };
            let parent = entity.info().parent;
            if parent.is_some() || self.options.include_root_name {
                names.push(entity.name());
            }
            cur = parent;
        }
        names.reverse();
        names
    }

    /// Dotted name from the root (`motor.R`).
    pub fn full_name(&self, id: EntityId) -> String {
        self.path_names(id).join(".")
    }

    /// Generated C function name (`avlos_motor_R`).
    pub fn endpoint_function_name(&self, id: EntityId) -> String {
        format!("{}{}", FUNCTION_PREFIX, self.full_name(id).replace('.', "_"))
    }

    /// C enumerators of an enum or bitmask endpoint as `(identifier, value)`,
    /// in declaration order. Empty for every other entity.
    pub fn enumerators(&self, id: EntityId) -> Vec<(String, String)> {
        let prefix = self.full_name(id).replace('.', "_").to_uppercase();
        let ident = |member: &str| format!("{}_{}", prefix, member);
        match &self[id] {
            Entity::Enum(e) => e
                .options
                .values()
                .into_iter()
                .map(|v| (ident(&v.name), v.index.to_string()))
                .collect(),
            Entity::Bitmask(b) => std::iter::once((ident(NO_FLAGS_ENUMERATOR), "0".to_string()))
                .chain(
                    b.flags
                        .flags()
                        .iter()
                        .enumerate()
                        .map(|(i, flag)| (ident(flag), format!("(1 << {})", i))),
                )
                .collect(),
            _ => Vec::new(),
        }
    }

    fn display_path(&self, id: EntityId) -> String {
        let name = self.full_name(id);
        if name.is_empty() {
            self.root().info.name.clone()
        } else {
            name
        }
    }

    /// Every entity in pre-order (a node, then each child in declaration order).
    pub fn walk(&self) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(self.entities.len());
        let mut stack = vec![EntityId::ROOT];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Leaf endpoints in pre-order. This is ID-assignment and generation order.
    pub fn endpoints(&self) -> Vec<EntityId> {
        self.walk()
            .into_iter()
            .filter(|id| self.entities[id.0].is_endpoint())
            .collect()
    }
}

impl Index<EntityId> for DeviceTree {
    type Output = Entity;

    fn index(&self, id: EntityId) -> &Entity {
        &self.entities[id.0]
    }
}
