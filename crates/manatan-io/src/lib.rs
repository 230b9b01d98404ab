pub mod ws;

pub use ws::{BridgeError, HostBridge};
