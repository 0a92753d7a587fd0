//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → identity.rs (who is the client?)
//!     → rate_limit.rs (fixed-window admission per client)
//!     → headers.rs (strip hop-by-hop, add X-Forwarded-*)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Rejections happen before any backend work
//! - Forwarded-for headers are only trusted when configured

pub mod headers;
pub mod identity;
pub mod rate_limit;
