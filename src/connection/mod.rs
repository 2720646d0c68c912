//! Connection Module
//!
//! Sessions, the registry that lets reconnects reuse them, and the shared
//! link state.

mod link;
mod registry;
mod session;

pub use link::Link;
pub use registry::{ReconnectPolicy, SessionRegistry};
pub use session::Session;
