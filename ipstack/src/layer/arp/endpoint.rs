use std::sync::{Arc, Mutex, RwLock};

use crate::layer::{eth, Demux, FnHandler, Handle, Layer, Recv, Result};
use crate::layer::demux::deliver;
use crate::nic::ListenerId;
use crate::wire::{arp_packet, ethernet_frame, ArpOperation, ArpRepr};
use crate::wire::{EthernetAddress, EthernetProtocol};

/// The ARP endpoint on top of one ethernet endpoint.
pub struct Endpoint {
    eth: Arc<eth::Endpoint>,
    demux: Demux<ArpOperation, ArpRepr>,
    observers: RwLock<Vec<(ListenerId, Arc<dyn Recv<ArpRepr>>)>>,
    /// Our registration for the ARP EtherType.
    handle: Mutex<Option<Handle>>,
}

/// An outgoing ARP packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Out {
    /// The frame source, the address of the device when `None`.
    pub src_addr: Option<EthernetAddress>,
    /// The frame destination, broadcast for requests.
    pub dst_addr: EthernetAddress,
    /// The packet itself.
    pub repr: ArpRepr,
}

impl Endpoint {
    /// Attach to the ethernet layer, replacing any other ARP handler there.
    pub fn new(eth: Arc<eth::Endpoint>) -> Arc<Self> {
        let endpoint = Arc::new(Endpoint {
            eth,
            demux: Demux::new("arp"),
            observers: RwLock::new(Vec::new()),
            handle: Mutex::new(None),
        });

        let weak = Arc::downgrade(&endpoint);
        let handle = endpoint.eth.register(EthernetProtocol::Arp, Arc::new(FnHandler(
            move |frame: &ethernet_frame| -> Result<()> {
                if let Some(endpoint) = weak.upgrade() {
                    endpoint.receive(frame);
                }
                Ok(())
            })));
        *endpoint.lock_handle() = Some(handle);

        endpoint
    }

    /// The ethernet layer below.
    pub fn eth(&self) -> &Arc<eth::Endpoint> {
        &self.eth
    }

    /// See every parsed packet before it is dispatched by its operation.
    pub fn add_observer(&self, handler: Arc<dyn Recv<ArpRepr>>) -> ListenerId {
        let id = ListenerId::next();
        self.observers.write()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((id, handler));
        id
    }

    /// Remove an observer, returns if one was added with the id.
    pub fn remove_observer(&self, id: ListenerId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|poison| poison.into_inner());
        let before = observers.len();
        observers.retain(|(other, _)| *other != id);
        observers.len() != before
    }

    fn receive(&self, frame: &ethernet_frame) {
        let packet = match arp_packet::new_checked(frame.payload()) {
            Ok(packet) => packet,
            Err(err) => {
                net_debug!("arp: dropped packet from {}: {}", frame.src_addr(), err);
                return;
            },
        };

        let repr = match ArpRepr::parse(packet) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("arp: dropped packet from {}: {}", frame.src_addr(), err);
                return;
            },
        };

        net_trace!("arp: received {}", repr);
        let observers: Vec<_> = self.observers.read()
            .unwrap_or_else(|poison| poison.into_inner())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in observers {
            deliver("arp observer", repr.operation(), &*handler, &repr);
        }

        self.demux.dispatch(repr.operation(), &repr);
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<Option<Handle>> {
        self.handle.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Layer for Endpoint {
    type Key = ArpOperation;
    type Packet = ArpRepr;
    type Address = EthernetAddress;
    type Out = Out;

    fn demux(&self) -> &Demux<ArpOperation, ArpRepr> {
        &self.demux
    }

    fn address(&self) -> EthernetAddress {
        self.eth.address()
    }

    fn send(&self, packet: Out) -> Result<()> {
        let mut payload = vec![0; packet.repr.buffer_len()];
        packet.repr.emit(arp_packet::new_unchecked_mut(&mut payload));

        self.eth.send(eth::Out {
            src_addr: packet.src_addr,
            dst_addr: packet.dst_addr,
            ethertype: EthernetProtocol::Arp,
            payload,
        })
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_handle().take() {
            self.eth.unregister_handle(handle);
        }
    }
}
