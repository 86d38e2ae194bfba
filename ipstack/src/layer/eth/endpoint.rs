use std::sync::{Arc, Mutex, Weak};

use crate::layer::{Demux, Error, FnHandler, Layer, Recv, Result};
use crate::layer::demux::deliver;
use crate::nic::{Device, ListenerId};
use crate::wire::{ethernet_frame, EthernetAddress, EthernetProtocol, EthernetRepr};

/// The ethernet endpoint of one device.
///
/// Created behind an `Arc` since the receive thread of the device refers back to it. The device
/// listener only holds a weak reference, dropping the last handle detaches the endpoint.
pub struct Endpoint {
    nic: Arc<dyn Device>,
    demux: Demux<EthernetProtocol, ethernet_frame>,
    /// The listener registered at the device.
    listener: Mutex<Option<ListenerId>>,
}

/// An outgoing frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Out {
    /// The source, the address of the device when `None`.
    pub src_addr: Option<EthernetAddress>,
    /// The destination address.
    pub dst_addr: EthernetAddress,
    /// The type of the payload.
    pub ethertype: EthernetProtocol,
    /// The encapsulated upper layer packet.
    pub payload: Vec<u8>,
}

impl Endpoint {
    /// Attach a new endpoint to a device.
    ///
    /// Makes the device accept broadcast frames.
    pub fn new(nic: Arc<dyn Device>) -> Arc<Self> {
        nic.add_address(EthernetAddress::BROADCAST);

        let endpoint = Arc::new(Endpoint {
            nic,
            demux: Demux::new("eth"),
            listener: Mutex::new(None),
        });

        let weak: Weak<Endpoint> = Arc::downgrade(&endpoint);
        let id = endpoint.nic.add_listener(Arc::new(FnHandler(move |frame: &[u8]| {
            if let Some(endpoint) = weak.upgrade() {
                endpoint.receive(frame);
            }
        })));
        *endpoint.lock_listener() = Some(id);

        endpoint
    }

    /// The device this endpoint is attached to.
    pub fn nic(&self) -> &Arc<dyn Device> {
        &self.nic
    }

    /// Accept frames sent to another address, typically a multicast group.
    pub fn join(&self, addr: EthernetAddress) {
        if !self.nic.has_address(addr) {
            net_debug!("eth: joined {}", addr);
        }
        self.nic.add_address(addr);
    }

    /// Observe every frame on the link, regardless of its destination.
    ///
    /// The handler is called for all parseable frames, including the ones this device sends, and
    /// independently of the EtherType handlers. Fails with `Error::Unsupported` if the device can
    /// not capture foreign traffic. Remove the listener with [`remove_promiscuous_listener`].
    ///
    /// [`remove_promiscuous_listener`]: #method.remove_promiscuous_listener
    pub fn add_promiscuous_listener(&self, handler: Arc<dyn Recv<ethernet_frame>>)
        -> Result<ListenerId>
    {
        self.nic.add_promiscuous_listener(Arc::new(FnHandler(move |frame: &[u8]| {
            match ethernet_frame::new_checked(frame) {
                Ok(frame) => deliver("eth promiscuous", frame.ethertype(), &*handler, frame),
                Err(err) => net_debug!("eth promiscuous: dropped frame: {}", err),
            }
        })))
    }

    /// Remove a listener added with [`add_promiscuous_listener`].
    ///
    /// [`add_promiscuous_listener`]: #method.add_promiscuous_listener
    pub fn remove_promiscuous_listener(&self, id: ListenerId) -> bool {
        self.nic.remove_listener(id)
    }

    fn receive(&self, bytes: &[u8]) {
        let frame = match ethernet_frame::new_checked(bytes) {
            Ok(frame) => frame,
            Err(err) => {
                net_debug!("eth: dropped malformed frame: {}", err);
                return;
            },
        };

        let dst_addr = frame.dst_addr();
        if !self.nic.has_address(dst_addr) {
            net_trace!("eth: ignored frame for {}", dst_addr);
            return;
        }

        self.demux.dispatch(frame.ethertype(), frame);
    }

    fn lock_listener(&self) -> std::sync::MutexGuard<Option<ListenerId>> {
        self.listener.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Layer for Endpoint {
    type Key = EthernetProtocol;
    type Packet = ethernet_frame;
    type Address = EthernetAddress;
    type Out = Out;

    fn demux(&self) -> &Demux<EthernetProtocol, ethernet_frame> {
        &self.demux
    }

    fn address(&self) -> EthernetAddress {
        self.nic.address()
    }

    fn send(&self, packet: Out) -> Result<()> {
        let repr = EthernetRepr {
            src_addr: packet.src_addr.unwrap_or_else(|| self.nic.address()),
            dst_addr: packet.dst_addr,
            ethertype: packet.ethertype,
        };

        if repr.src_addr.is_multicast() {
            return Err(Error::Illegal);
        }

        let mut buffer = vec![0; ethernet_frame::buffer_len(packet.payload.len())];
        let frame = ethernet_frame::new_unchecked_mut(&mut buffer);
        repr.emit(frame);
        frame.payload_mut().copy_from_slice(&packet.payload);

        net_trace!("eth: send {} to {} ({} bytes)",
            repr.ethertype, repr.dst_addr, packet.payload.len());
        self.nic.send(&buffer)
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(id) = self.lock_listener().take() {
            self.nic.remove_listener(id);
        }
    }
}
