//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming path
//!     → router.rs (ordered route lookup)
//!     → matcher.rs (segment-aware prefix match)
//!     → Return: matched RouteEntry or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse targets, normalize prefixes
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;

pub use router::{RouteEntry, RouteError, RouteTable};
