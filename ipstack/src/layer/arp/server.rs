use std::sync::{Arc, Weak};

use crate::layer::{Error, FnHandler, Handle, Layer, Result};
use crate::wire::{ArpOperation, ArpRepr, Ipv4Address};

use super::{Endpoint, Out};

/// Answers ARP requests for one address.
///
/// See [RFC826] for details. Requests for other addresses are ignored, there is no negative
/// response.
///
/// [RFC826]: https://tools.ietf.org/html/rfc826
pub struct Server {
    arp: Weak<Endpoint>,
    addr: Ipv4Address,
    handle: Handle,
}

impl Server {
    /// Serve `addr` on an ARP endpoint.
    ///
    /// Registers for the request operation, replacing any previous request handler.
    pub fn attach(arp: &Arc<Endpoint>, addr: Ipv4Address) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Server>| {
            let weak = weak.clone();
            let handle = arp.register(ArpOperation::Request, Arc::new(FnHandler(
                move |repr: &ArpRepr| -> Result<()> {
                    match weak.upgrade() {
                        Some(server) => server.answer(repr),
                        None => Ok(()),
                    }
                })));
            Server {
                arp: Arc::downgrade(arp),
                addr,
                handle,
            }
        })
    }

    /// The served address.
    pub fn address(&self) -> Ipv4Address {
        self.addr
    }

    /// Stop answering requests.
    pub fn detach(&self) -> bool {
        match self.arp.upgrade() {
            Some(arp) => arp.unregister_handle(self.handle),
            None => false,
        }
    }

    fn answer(&self, repr: &ArpRepr) -> Result<()> {
        let ArpRepr::EthernetIpv4 {
            operation,
            source_hardware_addr,
            source_protocol_addr,
            target_hardware_addr: _,
            target_protocol_addr,
        } = *repr;

        if operation != ArpOperation::Request {
            net_error!("arp server: registered for requests but received {:?}", operation);
            return Err(Error::Illegal);
        }

        if target_protocol_addr != self.addr {
            return Ok(());
        }

        let arp = self.arp.upgrade().ok_or(Error::Closed)?;
        let own_addr = arp.address();
        let reply = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Reply,
            source_hardware_addr: own_addr,
            source_protocol_addr: self.addr,
            target_hardware_addr: source_hardware_addr,
            target_protocol_addr: source_protocol_addr,
        };

        net_debug!("arp server: {} is at {}, telling {}",
            self.addr, own_addr, source_protocol_addr);
        arp.send(Out {
            src_addr: None,
            dst_addr: source_hardware_addr,
            repr: reply,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layer::eth;
    use crate::nic::Hub;
    use crate::wire::EthernetAddress;

    #[test]
    fn reply_is_a_contract_violation() {
        let hub = Hub::new();
        let port = hub.port(EthernetAddress([0x02, 0, 0, 0, 0, 1])).unwrap();
        let arp = Endpoint::new(eth::Endpoint::new(port));
        let server = Server::attach(&arp, Ipv4Address::new(10, 0, 0, 1));

        let reply = ArpRepr::EthernetIpv4 {
            operation: ArpOperation::Reply,
            source_hardware_addr: EthernetAddress([0x02, 0, 0, 0, 0, 2]),
            source_protocol_addr: Ipv4Address::new(10, 0, 0, 2),
            target_hardware_addr: EthernetAddress([0x02, 0, 0, 0, 0, 1]),
            target_protocol_addr: Ipv4Address::new(10, 0, 0, 1),
        };
        assert_eq!(server.answer(&reply), Err(Error::Illegal));
        assert_eq!(server.address(), Ipv4Address::new(10, 0, 0, 1));
    }
}
