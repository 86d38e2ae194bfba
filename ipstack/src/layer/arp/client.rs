use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::time::Instant as Deadline;

use crate::layer::eth::{Answer, NeighborCache};
use crate::layer::{Error, FnHandler, Handle, Layer, Result};
use crate::nic::ListenerId;
use crate::time::{Duration, Instant};
use crate::wire::{ArpOperation, ArpRepr, EthernetAddress, IpAddress, Ipv4Address};

use super::{Endpoint, Out};

/// Configures an ARP [`Client`].
///
/// [`Client`]: struct.Client.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// How long a learned mapping stays valid.
    pub lifetime: Duration,
    /// How long `resolve` waits for a reply.
    pub timeout: Duration,
    /// The most mappings remembered at once.
    pub capacity: usize,
}

/// Resolves IPv4 addresses to link addresses.
///
/// Every reply seen on the link is learned, whether or not it answers one of our own requests.
/// The sender of a request is learned as well.
pub struct Client {
    arp: Weak<Endpoint>,
    addr: Ipv4Address,
    timeout: Duration,
    neighbors: Mutex<NeighborCache>,
    learned: Condvar,
    handle: Handle,
    observer: ListenerId,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            lifetime: Duration::from_secs(60),
            timeout: Duration::from_secs(1),
            capacity: 1024,
        }
    }
}

impl Client {
    /// Resolve addresses on an ARP endpoint, sending requests from `addr`.
    ///
    /// Registers for the reply operation, replacing any previous reply handler, and observes
    /// requests.
    pub fn attach(arp: &Arc<Endpoint>, addr: Ipv4Address, config: ClientConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Client>| {
            let requests = weak.clone();
            let observer = arp.add_observer(Arc::new(FnHandler(
                move |repr: &ArpRepr| -> Result<()> {
                    match requests.upgrade() {
                        Some(client) if repr.operation() == ArpOperation::Request => {
                            client.learn_sender(repr)
                        },
                        _ => Ok(()),
                    }
                })));
            let weak = weak.clone();
            let handle = arp.register(ArpOperation::Reply, Arc::new(FnHandler(
                move |repr: &ArpRepr| -> Result<()> {
                    match weak.upgrade() {
                        Some(client) => client.learn(repr),
                        None => Ok(()),
                    }
                })));
            Client {
                arp: Arc::downgrade(arp),
                addr,
                timeout: config.timeout,
                neighbors: Mutex::new(NeighborCache::with_capacity(config.lifetime, config.capacity)),
                learned: Condvar::new(),
                handle,
                observer,
            }
        })
    }

    /// Find the link address of `addr` in the cache, without asking the link.
    pub fn lookup(&self, addr: Ipv4Address) -> Option<EthernetAddress> {
        self.lock().lookup_pure(&IpAddress::Ipv4(addr), Instant::now())
    }

    /// Find the link address of `addr`, asking the link if it is unknown.
    ///
    /// Blocks until a reply arrives or the configured timeout passes, then failing with
    /// `Error::Unreachable`. Requests for missing addresses are sent at most once per second.
    pub fn resolve(&self, addr: Ipv4Address) -> Result<EthernetAddress> {
        let key = IpAddress::Ipv4(addr);
        let deadline = Deadline::now() + self.timeout;

        let mut neighbors = self.lock();
        match neighbors.lookup(&key, Instant::now()) {
            Answer::Found(hardware_addr) => return Ok(hardware_addr),
            Answer::NotFound => self.request(addr)?,
            Answer::RateLimited => net_trace!("arp client: not asking for {} again yet", addr),
        }

        loop {
            if let Some(hardware_addr) = neighbors.lookup_pure(&key, Instant::now()) {
                return Ok(hardware_addr);
            }

            let now = Deadline::now();
            if now >= deadline {
                net_debug!("arp client: no reply for {}", addr);
                return Err(Error::Unreachable);
            }

            neighbors = self.learned.wait_timeout(neighbors, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poison| poison.into_inner().0);
        }
    }

    /// Stop learning from the link.
    pub fn detach(&self) -> bool {
        match self.arp.upgrade() {
            Some(arp) => {
                arp.remove_observer(self.observer);
                arp.unregister_handle(self.handle)
            },
            None => false,
        }
    }

    fn request(&self, addr: Ipv4Address) -> Result<()> {
        let arp = self.arp.upgrade().ok_or(Error::Closed)?;
        net_debug!("arp client: who has {}? tell {}", addr, self.addr);
        arp.send(Out {
            src_addr: None,
            dst_addr: EthernetAddress::BROADCAST,
            repr: ArpRepr::EthernetIpv4 {
                operation: ArpOperation::Request,
                source_hardware_addr: arp.address(),
                source_protocol_addr: self.addr,
                target_hardware_addr: EthernetAddress::default(),
                target_protocol_addr: addr,
            },
        })
    }

    fn learn(&self, repr: &ArpRepr) -> Result<()> {
        let operation = repr.operation();
        if operation != ArpOperation::Reply {
            net_error!("arp client: registered for replies but received {:?}", operation);
            return Err(Error::Illegal);
        }

        self.learn_sender(repr)
    }

    fn learn_sender(&self, repr: &ArpRepr) -> Result<()> {
        let ArpRepr::EthernetIpv4 {
            source_hardware_addr,
            source_protocol_addr,
            ..
        } = *repr;

        if !source_protocol_addr.is_unicast() || !source_hardware_addr.is_unicast() {
            net_debug!("arp client: ignored sender {}", source_protocol_addr);
            return Ok(());
        }

        self.lock().fill(
            IpAddress::Ipv4(source_protocol_addr),
            source_hardware_addr,
            Some(Instant::now()))?;
        self.learned.notify_all();
        Ok(())
    }

    fn lock(&self) -> MutexGuard<NeighborCache> {
        self.neighbors.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}
