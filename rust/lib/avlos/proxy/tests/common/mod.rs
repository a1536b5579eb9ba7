#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use avlos_ir::{DeviceTree, EndpointId};
use avlos_parser::{build_tree, BuildOptions};
use avlos_proxy::{Transport, TransportError};

/// In-memory device: a write stores the payload, a read returns it.
/// Canned responses take priority, silenced endpoints time out.
#[derive(Default)]
pub struct Loopback {
    values: Mutex<HashMap<EndpointId, Vec<u8>>>,
    responses: Mutex<HashMap<EndpointId, Vec<u8>>>,
    silent: Mutex<HashSet<EndpointId>>,
    sent: Mutex<Vec<(EndpointId, Vec<u8>)>>,
}

impl Loopback {
    pub fn preload(&self, ep_id: EndpointId, data: impl Into<Vec<u8>>) {
        self.values.lock().unwrap().insert(ep_id, data.into());
    }

    pub fn respond(&self, ep_id: EndpointId, data: impl Into<Vec<u8>>) {
        self.responses.lock().unwrap().insert(ep_id, data.into());
    }

    pub fn silence(&self, ep_id: EndpointId) {
        self.silent.lock().unwrap().insert(ep_id);
    }

    /// Every non-empty payload sent, in order.
    pub fn writes(&self) -> Vec<(EndpointId, Vec<u8>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, data)| !data.is_empty())
            .cloned()
            .collect()
    }

    /// Every send, including empty read requests.
    pub fn sends(&self) -> Vec<(EndpointId, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for Loopback {
    fn send(&self, data: &[u8], ep_id: EndpointId) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push((ep_id, data.to_vec()));
        if !data.is_empty() {
            self.values.lock().unwrap().insert(ep_id, data.to_vec());
        }
        Ok(())
    }

    fn recv(&self, ep_id: EndpointId, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let timed_out = TransportError::Timeout { ep_id, timeout };
        if self.silent.lock().unwrap().contains(&ep_id) {
            return Err(timed_out);
        }
        if let Some(data) = self.responses.lock().unwrap().get(&ep_id) {
            return Ok(data.clone());
        }
        self.values
            .lock()
            .unwrap()
            .get(&ep_id)
            .cloned()
            .ok_or(timed_out)
    }
}

pub fn fixture_tree() -> Arc<DeviceTree> {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../testdata/good_device.yaml");
    let doc: serde_json::Value =
        serde_yml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    Arc::new(build_tree(&doc, BuildOptions::default()).unwrap())
}

pub fn tree_from(doc: serde_json::Value) -> Arc<DeviceTree> {
    Arc::new(build_tree(&doc, BuildOptions::default()).unwrap())
}

pub fn ep(tree: &DeviceTree, path: &str) -> EndpointId {
    tree[tree.resolve(path).unwrap()].ep_id().unwrap()
}

pub fn f32_bytes(v: f32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}
