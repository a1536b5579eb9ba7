//! Host-side access to a device described by an Avlos tree.
//!
//! ```ignore
//! let device = Device::new(Arc::new(tree), transport);
//! device.set("motor.R", 0.2 * &ohm)?;
//! let r = device.get("motor.R")?.into_value();
//! let ret = device.function("stats.add")?.call(&[1.into(), 2.into()])?;
//! ```

pub mod device;
pub mod error;
mod impex;
pub mod transport;
pub mod value;
pub mod wire;

pub use device::{Device, Member, RemoteFunction, RemoteNode, DEFAULT_DUMP_DEPTH};
pub use error::ProxyError;
pub use transport::{Transport, TransportError, DEFAULT_TIMEOUT};
pub use value::Value;
pub use wire::CodecError;
