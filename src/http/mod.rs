//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID)
//!     → dispatcher.rs (rate limit → route → deadline → forward)
//!     → forward.rs (outbound call to the backend)
//!     → response.rs (relay backend response, or local envelope)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Dispatcher, InFlightRequest, Outcome};
pub use request::X_REQUEST_ID;
pub use response::Envelope;
pub use server::GatewayServer;
