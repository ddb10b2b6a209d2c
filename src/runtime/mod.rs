//! External transports over the engine: byte endpoints and async watches.

pub mod endpoint;
#[cfg(feature = "tokio-runtime")]
pub mod watch;

pub use endpoint::{parse_payload, QosEndpoint, ReadFormat};
#[cfg(feature = "tokio-runtime")]
pub use watch::{subscribe, TargetSubscription};
