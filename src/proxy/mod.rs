//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! Inbound request (routed to a Proxy)
//!     → forwarder.rs (URL via upstream.rs + encoding.rs, headers via headers.rs)
//!     → transport.rs (pooled client, per-host slots)
//!     → relay.rs (status + headers back; HTML through theming when enabled)
//!     → Client response
//!
//! Failures:
//!     → error.rs (ForwardError → 502 / 504 / 400)
//! ```

pub mod encoding;
pub mod error;
pub mod forwarder;
pub mod handler;
pub mod headers;
pub mod relay;
pub mod transport;
pub mod upstream;

pub use error::ForwardError;
pub use forwarder::RequestForwarder;
pub use handler::Proxy;
pub use headers::RemoteUser;
pub use relay::{ResponseRelay, Theming};
pub use transport::{OutboundBody, OutboundRequest, PooledTransport, Transport, UpstreamResponse};
pub use upstream::Upstream;
