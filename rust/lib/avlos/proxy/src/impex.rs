//! Export and import of values marked `export` in the schema.
//!
//! An exported endpoint serializes as its value; a node serializes as a
//! name -> value map of its children, leaving out children with nothing to
//! export.

use avlos_ir::{Entity, EntityId, ScalarValue};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::device::{Device, RemoteNode};
use crate::error::ProxyError;
use crate::transport::Transport;
use crate::value::Value;

impl<T: Transport> RemoteNode<'_, T> {
    /// Read every exported value below this node.
    pub fn export_values(&self) -> Result<Json, ProxyError> {
        Ok(export_entity(self.device, self.id)?.unwrap_or_else(|| Json::Object(Map::new())))
    }

    /// Write back a tree produced by [`RemoteNode::export_values`].
    /// Keys that are not exported endpoints below this node are ignored.
    pub fn import_values(&self, data: &Json) -> Result<(), ProxyError> {
        import_entity(self.device, self.id, data)
    }
}

fn export_entity<T: Transport>(device: &Device<T>, id: EntityId) -> Result<Option<Json>, ProxyError> {
    let tree = device.tree();
    match &tree[id] {
        Entity::Node(node) => {
            let mut values = Map::new();
            for &child in &node.children {
                if let Some(v) = export_entity(device, child)? {
                    values.insert(tree[child].name().to_string(), v);
                }
            }
            Ok((!values.is_empty()).then_some(Json::Object(values)))
        }
        Entity::Function(_) => Ok(None),
        entity if entity.info().meta.export => Ok(Some(device.read(id)?.to_json())),
        _ => Ok(None),
    }
}

fn import_entity<T: Transport>(device: &Device<T>, id: EntityId, data: &Json) -> Result<(), ProxyError> {
    let tree = device.tree();
    match &tree[id] {
        Entity::Node(node) => {
            let Json::Object(map) = data else {
                return Err(ProxyError::InvalidValue {
                    path: device.path_of(id),
                    value: data.to_string(),
                });
            };
            for &child in &node.children {
                if let Some(v) = map.get(tree[child].name()) {
                    import_entity(device, child, v)?;
                }
            }
            Ok(())
        }
        Entity::Function(_) => Ok(()),
        entity if entity.info().meta.export => {
            let value = json_to_value(device, id, data)?;
            device.write(id, value)
        }
        _ => {
            debug!(path = %device.path_of(id), "not exported, skipping import");
            Ok(())
        }
    }
}

fn json_to_value<T: Transport>(device: &Device<T>, id: EntityId, data: &Json) -> Result<Value, ProxyError> {
    let invalid = || ProxyError::InvalidValue {
        path: device.path_of(id),
        value: data.to_string(),
    };
    match data {
        Json::String(s) => device.value_from_str(id, s),
        Json::Bool(b) => Ok(Value::from(*b)),
        Json::Number(n) => {
            let scalar = if let Some(v) = n.as_u64() {
                ScalarValue::UInt(v)
            } else if let Some(v) = n.as_i64() {
                ScalarValue::Int(v)
            } else {
                ScalarValue::Float(n.as_f64().ok_or_else(invalid)?)
            };
            Ok(Value::Scalar(scalar))
        }
        Json::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(Value::Flags)
            .ok_or_else(invalid),
        Json::Null | Json::Object(_) => Err(invalid()),
    }
}
