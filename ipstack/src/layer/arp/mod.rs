//! Receiving and sending ARP messages.
//!
//! Restricted to Ethernet and IPv4. The [`Endpoint`] parses ARP payloads of the ethernet layer
//! and dispatches them by their operation code. On top of it, a [`Server`] answers requests for
//! one configured address while a [`Client`] learns from replies and resolves addresses on demand.
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`Server`]: struct.Server.html
//! [`Client`]: struct.Client.html
mod client;
mod endpoint;
mod server;

pub use client::{Client, ClientConfig};
pub use endpoint::{Endpoint, Out};
pub use server::Server;
