//! Cluster Clients
//!
//! Traits at the boundary between the controllers and the API server, with
//! `kube` implementations. Tests swap in the in-memory fakes.

pub mod applier;
pub mod operator_client;

#[cfg(test)]
pub mod fake;

pub use applier::*;
pub use operator_client::*;
