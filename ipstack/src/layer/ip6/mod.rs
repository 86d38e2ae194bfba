//! The IPv6 layer with neighbor discovery.
//!
//! An [`Interface`] sits on top of an ethernet endpoint and owns the addresses of one link. Its
//! configuration runs through the phases of stateless autoconfiguration:
//!
//! ```text
//! Unconfigured -> DadPending -> RouterSolicitPending -> Configured
//!                     |                                    ^
//!                     +---- (router mode) -----------------+
//!                     |
//!                     +--> DuplicateDetected
//! ```
//!
//! Independently of its own configuration the interface answers neighbor solicitations for its
//! addresses, learns neighbors from the discovery messages it sees and, in router mode, answers
//! router solicitations with an advertisement of its prefix.
//!
//! Upper layers register by next header, see [`Layer`]. Sends never wait for the neighbor of the
//! destination to be resolved.
//!
//! [`Interface`]: struct.Interface.html
//! [`Layer`]: ../trait.Layer.html
mod config;
mod interface;

#[cfg(test)]
mod tests;

pub use config::{Config, RouterConfig};
pub use interface::{
    link_local_address,
    Interface,
    Out,
    Phase,
    DEFAULT_HOP_LIMIT,
};
