//! Public façade for rate-limited provider calls
//!
//! [`RateLimitedClient`] is the single entry point applications use for
//! outbound provider traffic. Named operations (list/find/create/update/
//! delete/send) are thin wrappers over [`RateLimitedClient::call`].

mod builder;
mod calls;
mod operation;
#[cfg(test)]
mod tests;
mod types;

pub use builder::RateLimitedClientBuilder;
pub use operation::{Operation, ResourceKind};
pub use types::RateLimitedClient;
