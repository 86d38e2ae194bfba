//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. An endpoint represents the local state of a protocol on one
//! interface. The state is open to modifications while packets are processed, similar to
//! reconfiguration on the OS level with utilities such as `arp`, `ip addr`, etc.
//!
//! ## Dispatch
//!
//! Layers pass received packets upwards through a [`Demux`], a map from a protocol key (the
//! EtherType, the ARP operation, the IPv6 next header) to exactly one handler. Registering a key
//! a second time replaces the previous handler. Registration returns a [`Handle`] which can later
//! remove the handler again, so handlers need no reference back to the layer they are attached
//! to. Packets for a key without handler are dropped silently.
//!
//! Handlers are called from the receive thread of the device. An error returned by a handler, or
//! even a panic, is caught and logged at the dispatch boundary and does not affect other packets.
//!
//! ## Sending
//!
//! Every layer has an owned outgoing packet type, its [`Layer::Out`]. Fields that are left unset
//! are filled in from the layer's own state, e.g. the source address.
//!
//! [`Demux`]: struct.Demux.html
//! [`Handle`]: struct.Handle.html
//! [`Layer::Out`]: trait.Layer.html#associatedtype.Out
use std::sync::Arc;

use crate::wire::{self, Ipv6Address};

mod demux;
pub mod arp;
pub mod eth;
pub mod ip;
pub mod ip6;

pub use self::demux::{Demux, Handle};

/// The result type of layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// The error type of layer operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the endpoint or handler does not allow or implement an operation. A handler
    /// receiving a packet it was not registered for returns this.
    #[error("operation not permitted")]
    Illegal,

    /// Not enough space for the requested packet.
    #[error("packet size out of bounds")]
    BadSize,

    /// Unable to find a route towards the destination address.
    #[error("destination unreachable")]
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources.
    #[error("resources exhausted")]
    Exhausted,

    /// A packet could not be parsed.
    #[error("malformed packet: {0}")]
    Malformed(#[from] wire::Error),

    /// The device does not provide a feature the operation depends on.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),

    /// Duplicate address detection found another node using the tentative address.
    ///
    /// The interface is unusable afterwards and needs manual configuration.
    #[error("duplicate address {0} detected on the link")]
    DuplicateAddress(Ipv6Address),

    /// The layer was closed while the operation was pending.
    #[error("layer closed")]
    Closed,
}

/// A standard wrapper for a function implementing receive traits.
///
/// Keeps the type alias overhead low by providing a single wrapper type that implements the
/// receive traits for all layers, and the raw frame listener of `nic`.
pub struct FnHandler<F>(pub F);

/// A receiver of the packets of one layer.
pub trait Recv<P: ?Sized>: Send + Sync {
    /// Process one packet.
    ///
    /// An error signals a packet that could not be processed. It is logged by the caller but has
    /// no further effect.
    fn receive(&self, packet: &P) -> Result<()>;
}

impl<F, P: ?Sized> Recv<P> for FnHandler<F>
    where F: Fn(&P) -> Result<()> + Send + Sync
{
    fn receive(&self, packet: &P) -> Result<()> {
        (self.0)(packet)
    }
}

/// The registration contract shared by all layers.
pub trait Layer {
    /// The protocol key by which upper layers register.
    type Key: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// The packet view handed to upper layers.
    type Packet: ?Sized;

    /// The address of this layer's endpoint.
    type Address;

    /// An outgoing packet.
    type Out;

    /// The handler map of this layer.
    fn demux(&self) -> &Demux<Self::Key, Self::Packet>;

    /// The current address of the endpoint.
    fn address(&self) -> Self::Address;

    /// Send a packet through this layer.
    fn send(&self, packet: Self::Out) -> Result<()>;

    /// Register the handler for a key, replacing any previous one.
    fn register(&self, key: Self::Key, handler: Arc<dyn Recv<Self::Packet>>) -> Handle {
        self.demux().register(key, handler)
    }

    /// Remove the handler of a key.
    fn unregister(&self, key: Self::Key) -> bool {
        self.demux().unregister(key)
    }

    /// Remove a handler by its registration handle.
    ///
    /// Does nothing if the registration was replaced in the meantime.
    fn unregister_handle(&self, handle: Handle) -> bool {
        self.demux().unregister_handle(handle)
    }

    /// Detach all handlers.
    ///
    /// Does not close the layer below.
    fn close(&self) {
        self.demux().clear()
    }
}
