//! Live handles over a [`DeviceTree`] bound to a [`Transport`].
//!
//! Reading a child through [`RemoteNode::get`] performs the remote read for
//! value endpoints; nodes and functions come back as handles.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use avlos_ir::{
    registry, Argument, DataType, DeviceTree, EndpointId, Entity, EntityId, EnumValue,
    ScalarValue, Unit, HASH_ENDPOINT_ID, OPTION_WIRE_TYPE,
};
use tracing::trace;

use crate::error::ProxyError;
use crate::transport::Transport;
use crate::value::Value;
use crate::wire;

/// Depth used by the `Display` impl of [`RemoteNode`].
pub const DEFAULT_DUMP_DEPTH: usize = 2;

/// A built tree plus the transport that reaches the device.
pub struct Device<T> {
    tree: Arc<DeviceTree>,
    transport: T,
}

impl<T: Transport> Device<T> {
    pub fn new(tree: Arc<DeviceTree>, transport: T) -> Self {
        Self { tree, transport }
    }

    pub fn tree(&self) -> &DeviceTree {
        &self.tree
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn root(&self) -> RemoteNode<'_, T> {
        RemoteNode {
            device: self,
            id: EntityId::ROOT,
        }
    }

    /// Resolve a dotted path (`"motor"`, `"controller.position"`) to a node.
    /// The empty path is the root.
    pub fn node(&self, path: &str) -> Result<RemoteNode<'_, T>, ProxyError> {
        let id = self.resolve(path)?;
        self.root().with_id(id).as_node()
    }

    pub fn function(&self, path: &str) -> Result<RemoteFunction<'_, T>, ProxyError> {
        let id = self.resolve(path)?;
        match &self.tree[id] {
            Entity::Function(_) => Ok(RemoteFunction { device: self, id }),
            other => Err(self.wrong_kind(id, other, "function")),
        }
    }

    /// Path form of [`RemoteNode::get`].
    pub fn get(&self, path: &str) -> Result<Member<'_, T>, ProxyError> {
        let (parent, name) = split_path(path);
        self.node(parent)?.get(name)
    }

    /// Path form of [`RemoteNode::set`].
    pub fn set(&self, path: &str, value: impl Into<Value>) -> Result<(), ProxyError> {
        let (parent, name) = split_path(path);
        self.node(parent)?.set(name, value)
    }

    /// Read the protocol hash from endpoint 0.
    pub fn remote_hash(&self) -> Result<u32, ProxyError> {
        let data = self.exchange(HASH_ENDPOINT_ID, &[])?;
        match wire::decode(DataType::Uint32, &data)? {
            ScalarValue::UInt(v) => Ok(v as u32),
            other => Err(ProxyError::InvalidValue {
                path: "hash".to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Compare the device's protocol hash against the local tree.
    pub fn check_hash(&self) -> Result<(), ProxyError> {
        let remote = self.remote_hash()?;
        let local = self.tree.hash();
        if remote != local {
            return Err(ProxyError::HashMismatch { local, remote });
        }
        Ok(())
    }

    /// Options of every enum endpoint marked for export, keyed by option name.
    pub fn export_options(&self) -> BTreeMap<String, EnumValue> {
        self.tree
            .endpoints()
            .into_iter()
            .filter_map(|id| self.tree[id].as_enum())
            .filter(|e| e.info.meta.export)
            .flat_map(|e| e.options.values())
            .map(|v| (v.name.clone(), v))
            .collect()
    }

    fn resolve(&self, path: &str) -> Result<EntityId, ProxyError> {
        let mut id = EntityId::ROOT;
        for name in path.split('.').filter(|s| !s.is_empty()) {
            id = self
                .tree
                .child(id, name)
                .ok_or_else(|| self.missing(id, name))?;
        }
        Ok(id)
    }

    pub(crate) fn path_of(&self, id: EntityId) -> String {
        let name = self.tree.full_name(id);
        if name.is_empty() {
            self.tree.root().info.name.clone()
        } else {
            name
        }
    }

    fn missing(&self, node: EntityId, name: &str) -> ProxyError {
        ProxyError::MissingAttribute {
            node: self.path_of(node),
            name: name.to_string(),
        }
    }

    pub(crate) fn wrong_kind(&self, id: EntityId, entity: &Entity, expected: &'static str) -> ProxyError {
        ProxyError::WrongKind {
            path: self.path_of(id),
            kind: entity.kind(),
            expected,
        }
    }

    /// One send followed by one receive.
    fn exchange(&self, ep_id: EndpointId, payload: &[u8]) -> Result<Vec<u8>, ProxyError> {
        self.send(ep_id, payload)?;
        let data = self.transport.recv(ep_id, self.transport.timeout())?;
        trace!(ep_id, len = data.len(), "recv");
        Ok(data)
    }

    fn send(&self, ep_id: EndpointId, payload: &[u8]) -> Result<(), ProxyError> {
        trace!(ep_id, len = payload.len(), "send");
        self.transport.send(payload, ep_id)?;
        Ok(())
    }

    pub(crate) fn read(&self, id: EntityId) -> Result<Value, ProxyError> {
        let entity = &self.tree[id];
        if entity.getter_name().is_none() {
            return Err(match entity {
                Entity::Node(_) | Entity::Function(_) => self.wrong_kind(id, entity, "value"),
                _ => ProxyError::NotReadable(self.path_of(id)),
            });
        }
        match entity {
            Entity::Attribute(a) => {
                let data = self.exchange(a.ep_id, &[])?;
                Ok(with_unit(wire::decode(a.dtype, &data)?, a.unit.as_ref()))
            }
            Entity::Enum(e) => {
                let raw = self.read_option_byte(e.ep_id)?;
                Ok(Value::Option(e.options.decode(raw)?))
            }
            Entity::Bitmask(b) => {
                let raw = self.read_option_byte(b.ep_id)?;
                Ok(Value::Flags(b.flags.decode(raw)))
            }
            Entity::Node(_) | Entity::Function(_) => Err(self.wrong_kind(id, entity, "value")),
        }
    }

    fn read_option_byte(&self, ep_id: EndpointId) -> Result<u64, ProxyError> {
        let data = self.exchange(ep_id, &[])?;
        match wire::decode(OPTION_WIRE_TYPE, &data)? {
            ScalarValue::UInt(v) => Ok(v),
            _ => Ok(0),
        }
    }

    pub(crate) fn write(&self, id: EntityId, value: Value) -> Result<(), ProxyError> {
        let entity = &self.tree[id];
        if entity.setter_name().is_none() {
            return Err(match entity {
                Entity::Node(_) | Entity::Function(_) => self.wrong_kind(id, entity, "value"),
                _ => ProxyError::NotWritable(self.path_of(id)),
            });
        }
        let invalid = |value: &Value| ProxyError::InvalidValue {
            path: self.path_of(id),
            value: value.to_string(),
        };
        let (ep_id, dtype, scalar) = match entity {
            Entity::Attribute(a) => {
                let scalar = normalize(&value, a.unit.as_ref())?.ok_or_else(|| invalid(&value))?;
                (a.ep_id, a.dtype, scalar)
            }
            Entity::Enum(e) => {
                let index = match &value {
                    Value::Option(o) => e.options.encode(o.clone())?,
                    Value::Scalar(ScalarValue::Str(name)) => e.options.encode(name.as_str())?,
                    Value::Scalar(ScalarValue::Int(i)) => e.options.encode(*i)?,
                    Value::Scalar(ScalarValue::UInt(i)) => {
                        e.options.encode(i64::try_from(*i).unwrap_or(i64::MAX))?
                    }
                    other => return Err(invalid(other)),
                };
                (e.ep_id, OPTION_WIRE_TYPE, ScalarValue::UInt(u64::from(index)))
            }
            Entity::Bitmask(b) => {
                let bits = match &value {
                    Value::Flags(names) => b.flags.encode(names),
                    Value::Scalar(ScalarValue::Str(s)) => {
                        b.flags.encode(&s.split_whitespace().collect::<Vec<_>>())
                    }
                    Value::Scalar(ScalarValue::UInt(v)) => *v,
                    other => return Err(invalid(other)),
                };
                (b.ep_id, OPTION_WIRE_TYPE, ScalarValue::UInt(bits))
            }
            Entity::Node(_) | Entity::Function(_) => {
                return Err(self.wrong_kind(id, entity, "value"))
            }
        };
        let payload = wire::encode(dtype, &scalar)?;
        self.send(ep_id, &payload)
    }

    pub(crate) fn call(&self, id: EntityId, args: &[Value]) -> Result<Value, ProxyError> {
        let f = match &self.tree[id] {
            Entity::Function(f) => f,
            other => return Err(self.wrong_kind(id, other, "function")),
        };
        if args.len() != f.arguments.len() {
            return Err(ProxyError::ArgumentCount {
                path: self.path_of(id),
                expected: f.arguments.len(),
                got: args.len(),
            });
        }

        let mut scalars = Vec::with_capacity(args.len());
        for (arg, value) in f.arguments.iter().zip(args) {
            let scalar = normalize(value, arg.unit.as_ref())?.ok_or_else(|| {
                ProxyError::InvalidValue {
                    path: format!("{}({})", self.path_of(id), arg.name),
                    value: value.to_string(),
                }
            })?;
            scalars.push(scalar);
        }
        let payload = wire::encode_all(
            f.arguments
                .iter()
                .map(|a| a.dtype)
                .zip(scalars.iter()),
        )?;

        if f.dtype.is_void() {
            self.send(f.ep_id, &payload)?;
            return Ok(Value::Void);
        }
        let data = self.exchange(f.ep_id, &payload)?;
        Ok(with_unit(wire::decode(f.dtype, &data)?, f.unit.as_ref()))
    }

    /// Interpret a string for endpoint `id`: `"12 volt"`, `"3"`, `"GIMBAL"`,
    /// `"A C"` (bitmask flags).
    pub(crate) fn value_from_str(&self, id: EntityId, s: &str) -> Result<Value, ProxyError> {
        let s = s.trim();
        match &self.tree[id] {
            Entity::Attribute(a) if a.dtype.is_string() => Ok(s.into()),
            Entity::Attribute(a) if a.unit.is_some() => {
                let q = registry().parse_quantity(s)?;
                if q.unit().dimension().is_dimensionless() && q.unit().factor() == 1.0 {
                    Ok(Value::from(q.magnitude()))
                } else {
                    Ok(Value::Quantity(q))
                }
            }
            Entity::Attribute(a) => match a.dtype.from_string(s)? {
                Some(v) => Ok(Value::Scalar(v)),
                None => Err(ProxyError::InvalidValue {
                    path: self.path_of(id),
                    value: s.to_string(),
                }),
            },
            Entity::Enum(_) => Ok(s.into()),
            Entity::Bitmask(_) => Ok(Value::Flags(
                s.split_whitespace().map(str::to_string).collect(),
            )),
            other => Err(self.wrong_kind(id, other, "value")),
        }
    }
}

fn split_path(path: &str) -> (&str, &str) {
    path.rsplit_once('.').unwrap_or(("", path))
}

/// Tag a decoded number with its unit.
fn with_unit(raw: ScalarValue, unit: Option<&Unit>) -> Value {
    match (unit, raw.as_f64()) {
        (Some(unit), Some(magnitude)) if !matches!(raw, ScalarValue::Bool(_)) => {
            Value::Quantity(magnitude * unit)
        }
        _ => Value::Scalar(raw),
    }
}

/// Reduce a value to the scalar sent on the wire. Quantities are converted
/// into `unit`; plain scalars pass through unchanged.
fn normalize(value: &Value, unit: Option<&Unit>) -> Result<Option<ScalarValue>, ProxyError> {
    let scalar = match value {
        Value::Scalar(s) => Some(s.clone()),
        Value::Quantity(q) => {
            let target = unit.cloned().unwrap_or_else(Unit::dimensionless);
            Some(ScalarValue::Float(q.magnitude_in(&target)?))
        }
        Value::Option(o) => Some(ScalarValue::UInt(u64::from(o.index))),
        Value::Void | Value::Flags(_) => None,
    };
    Ok(scalar)
}

/// Result of looking a name up on a node.
pub enum Member<'a, T> {
    Node(RemoteNode<'a, T>),
    Function(RemoteFunction<'a, T>),
    Value(Value),
}

impl<'a, T> Member<'a, T> {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Member::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_node(self) -> Option<RemoteNode<'a, T>> {
        match self {
            Member::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn into_function(self) -> Option<RemoteFunction<'a, T>> {
        match self {
            Member::Function(f) => Some(f),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for Member<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Member::Node(n) => write!(f, "Node({:?})", n.id),
            Member::Function(func) => write!(f, "Function({:?})", func.id),
            Member::Value(v) => write!(f, "Value({:?})", v),
        }
    }
}

/// Handle to a container node.
pub struct RemoteNode<'a, T> {
    pub(crate) device: &'a Device<T>,
    pub(crate) id: EntityId,
}

impl<T> Clone for RemoteNode<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RemoteNode<'_, T> {}

impl<'a, T: Transport> RemoteNode<'a, T> {
    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn as_node(self) -> Result<Self, ProxyError> {
        match &self.device.tree[self.id] {
            Entity::Node(_) => Ok(self),
            other => Err(self.device.wrong_kind(self.id, other, "node")),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.device.tree[self.id].name()
    }

    pub fn path(&self) -> String {
        self.device.path_of(self.id)
    }

    /// Child names in declaration order.
    pub fn names(&self) -> Vec<&'a str> {
        let tree = &self.device.tree;
        tree.children(self.id).iter().map(|c| tree[*c].name()).collect()
    }

    fn child(&self, name: &str) -> Result<EntityId, ProxyError> {
        self.device
            .tree
            .child(self.id, name)
            .ok_or_else(|| self.device.missing(self.id, name))
    }

    /// Look up a child. Value endpoints are read from the device.
    pub fn get(&self, name: &str) -> Result<Member<'a, T>, ProxyError> {
        let id = self.child(name)?;
        match &self.device.tree[id] {
            Entity::Node(_) => Ok(Member::Node(self.with_id(id))),
            Entity::Function(_) => Ok(Member::Function(RemoteFunction {
                device: self.device,
                id,
            })),
            _ => self.device.read(id).map(Member::Value),
        }
    }

    /// Read a value endpoint child.
    pub fn value(&self, name: &str) -> Result<Value, ProxyError> {
        self.device.read(self.child(name)?)
    }

    pub fn node(&self, name: &str) -> Result<RemoteNode<'a, T>, ProxyError> {
        self.with_id(self.child(name)?).as_node()
    }

    pub fn function(&self, name: &str) -> Result<RemoteFunction<'a, T>, ProxyError> {
        let id = self.child(name)?;
        match &self.device.tree[id] {
            Entity::Function(_) => Ok(RemoteFunction {
                device: self.device,
                id,
            }),
            other => Err(self.device.wrong_kind(id, other, "function")),
        }
    }

    /// Write a value endpoint child.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ProxyError> {
        self.device.write(self.child(name)?, value.into())
    }

    /// Write a child from text such as `"12 volt"`.
    pub fn set_value_with_string(&self, name: &str, value: &str) -> Result<(), ProxyError> {
        let id = self.child(name)?;
        let value = self.device.value_from_str(id, value)?;
        self.device.write(id, value)
    }

    /// Options of an enum child, in declaration order.
    pub fn options(&self, name: &str) -> Result<Vec<EnumValue>, ProxyError> {
        let id = self.child(name)?;
        match &self.device.tree[id] {
            Entity::Enum(e) => Ok(e.options.values()),
            other => Err(self.device.wrong_kind(id, other, "enum")),
        }
    }

    /// Indented listing of children, `depth` levels deep. Values are read
    /// from the device; read failures are shown inline.
    pub fn dump(&self, depth: usize) -> String {
        self.dump_indented("", depth)
    }

    fn dump_indented(&self, indent: &str, depth: usize) -> String {
        if depth == 0 {
            return "...".to_string();
        }
        let tree = &self.device.tree;
        let mut lines = Vec::new();
        for &child in tree.children(self.id) {
            let entity = &tree[child];
            let line = match entity {
                Entity::Node(_) => format!(
                    "{}{}{}{}",
                    indent,
                    entity.name(),
                    if depth == 1 { ": " } else { ":\n" },
                    self.with_id(child)
                        .dump_indented(&format!("{}  ", indent), depth - 1)
                ),
                Entity::Function(_) => format!(
                    "{}{}",
                    indent,
                    RemoteFunction {
                        device: self.device,
                        id: child
                    }
                ),
                Entity::Attribute(a) => match self.device.read(child) {
                    Ok(v) => format!("{}{} [{}]: {}", indent, a.info.name, a.dtype, v),
                    Err(e) => format!("{}{} [{}]: <{}>", indent, a.info.name, a.dtype, e),
                },
                _ => match self.device.read(child) {
                    Ok(v) => format!("{}{}: {}", indent, entity.name(), v),
                    Err(e) => format!("{}{}: <{}>", indent, entity.name(), e),
                },
            };
            lines.push(line);
        }
        lines.join("\n")
    }
}

impl<T: Transport> fmt::Display for RemoteNode<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dump(DEFAULT_DUMP_DEPTH))
    }
}

/// Handle to a callable endpoint.
pub struct RemoteFunction<'a, T> {
    device: &'a Device<T>,
    id: EntityId,
}

impl<T> Clone for RemoteFunction<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RemoteFunction<'_, T> {}

impl<'a, T: Transport> RemoteFunction<'a, T> {
    fn function(&self) -> Option<&'a avlos_ir::Function> {
        self.device.tree[self.id].as_function()
    }

    pub fn name(&self) -> &'a str {
        self.device.tree[self.id].name()
    }

    pub fn arguments(&self) -> &'a [Argument] {
        self.function().map(|f| f.arguments.as_slice()).unwrap_or(&[])
    }

    pub fn return_type(&self) -> DataType {
        self.function().map(|f| f.dtype).unwrap_or(DataType::Void)
    }

    /// Send the arguments and, for non-void functions, wait for the result.
    pub fn call(&self, args: &[Value]) -> Result<Value, ProxyError> {
        self.device.call(self.id, args)
    }
}

impl<T: Transport> fmt::Display for RemoteFunction<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .arguments()
            .iter()
            .map(Argument::as_function_argument)
            .collect();
        write!(f, "{}({}) -> {}", self.name(), args.join(", "), self.return_type())
    }
}
