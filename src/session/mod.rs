//! Session handshake: identity provider → session source → token bridge.

pub mod bridge;
pub mod provider;
pub mod source;

pub use bridge::{Readiness, TokenBridge, TokenIssuer};
pub use provider::{FakeIdentityProvider, IdentityError, IdentityProvider};
pub use source::SessionSource;
