//! Encapsulates a network interface card.
//!
//! The layers in this crate never touch raw sockets or TUN devices themselves. Instead they are
//! attached to something implementing [`Device`]: a byte oriented send function, a list of link
//! layer addresses the card accepts, and listener registration for received frames. Each device
//! runs its own receive loop and calls its listeners from it.
//!
//! [`Hub`] provides such devices in software, connected to one shared segment.
//!
//! [`Device`]: trait.Device.html
//! [`Hub`]: struct.Hub.html
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::layer::{FnHandler, Result};
use crate::wire::EthernetAddress;

mod hub;

pub use self::hub::{Hub, Port};

/// Identifies a registered listener for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Allocate a process-wide unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ListenerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A receiver of raw frames.
///
/// Called from the receive loop of the device. Implementations should return quickly, a slow
/// listener delays every other listener of the same device.
pub trait Listener: Send + Sync {
    /// Called with every received frame.
    fn on_frame(&self, frame: &[u8]);
}

impl<F> Listener for FnHandler<F>
    where F: Fn(&[u8]) + Send + Sync
{
    fn on_frame(&self, frame: &[u8]) {
        (self.0)(frame)
    }
}

/// A layer 2 device.
pub trait Device: Send + Sync {
    /// The primary hardware address.
    fn address(&self) -> EthernetAddress;

    /// Accept frames directed to an additional address, e.g. a multicast group.
    fn add_address(&self, addr: EthernetAddress);

    /// Check if frames for this destination are directed at the device.
    fn has_address(&self, addr: EthernetAddress) -> bool;

    /// All accepted addresses, the primary address first.
    fn addresses(&self) -> Vec<EthernetAddress>;

    /// Transmit a complete frame.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Register a listener for received frames.
    fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerId;

    /// Remove a listener, returns if one was registered with the id.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Register a listener seeing all traffic on the link, including frames sent by this device.
    ///
    /// Returns `Error::Unsupported` if the device can not capture foreign traffic. Remove it with
    /// `remove_listener`.
    fn add_promiscuous_listener(&self, listener: Arc<dyn Listener>) -> Result<ListenerId>;
}
