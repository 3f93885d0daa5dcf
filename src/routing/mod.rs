//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → router.rs (ordered lookup)
//!     → matcher.rs (evaluate host / prefix conditions)
//!     → Return: matched proxy or None (404)
//!
//! Route Compilation (at startup):
//!     [[proxies]]
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable Router
//! ```

pub mod matcher;
pub mod router;

pub use router::{RouteRule, Router};
