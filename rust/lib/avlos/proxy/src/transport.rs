use std::time::Duration;

use avlos_ir::EndpointId;
use thiserror::Error;

/// Receive timeout used when a transport does not override [`Transport::timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("timed out after {timeout:?} waiting for endpoint {ep_id}")]
    Timeout { ep_id: EndpointId, timeout: Duration },

    #[error("endpoint {ep_id} is out of range for this transport (max {max})")]
    EndpointOutOfRange { ep_id: EndpointId, max: EndpointId },

    #[error("transport error: {0}")]
    Io(String),
}

/// Byte-oriented link to a device.
///
/// One request may be in flight at a time. Sharing a transport between
/// threads requires the caller to serialize access.
pub trait Transport {
    /// Send `data` to endpoint `ep_id`. An empty payload is a read request.
    fn send(&self, data: &[u8], ep_id: EndpointId) -> Result<(), TransportError>;

    /// Block until endpoint `ep_id` answers or `timeout` expires.
    fn recv(&self, ep_id: EndpointId, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    fn timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, data: &[u8], ep_id: EndpointId) -> Result<(), TransportError> {
        (**self).send(data, ep_id)
    }

    fn recv(&self, ep_id: EndpointId, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).recv(ep_id, timeout)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, data: &[u8], ep_id: EndpointId) -> Result<(), TransportError> {
        (**self).send(data, ep_id)
    }

    fn recv(&self, ep_id: EndpointId, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).recv(ep_id, timeout)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }
}
