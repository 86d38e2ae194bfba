//! A software link shared by several devices.
use std::sync::{Arc, Mutex, RwLock};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::layer::{Error, Result};
use crate::wire::EthernetAddress;

use super::{Device, Listener, ListenerId};

/// An in-memory Ethernet segment.
///
/// Every frame sent by one port is delivered to all other ports, each port receiving on its own
/// thread. Ports perform no filtering; that is the job of the Ethernet layer.
#[derive(Clone)]
pub struct Hub {
    shared: Arc<Shared>,
}

/// A device attached to a [`Hub`].
///
/// Dropping the port detaches it from the hub and ends its receive thread.
///
/// [`Hub`]: struct.Hub.html
pub struct Port {
    id: usize,
    address: EthernetAddress,
    extra: RwLock<Vec<EthernetAddress>>,
    listeners: Arc<Listeners>,
    shared: Arc<Shared>,
}

struct Shared {
    promiscuous: bool,
    ports: Mutex<Ports>,
}

#[derive(Default)]
struct Ports {
    next_id: usize,
    attached: Vec<Attached>,
}

struct Attached {
    id: usize,
    queue: Sender<Frame>,
}

enum Frame {
    /// Sent by another port.
    Foreign(Vec<u8>),
    /// Sent by the receiving port itself, seen only by promiscuous listeners.
    Own(Vec<u8>),
}

#[derive(Default)]
struct Listeners {
    normal: RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>,
    promiscuous: RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>,
}

impl Hub {
    /// Create a segment whose ports support promiscuous capture.
    pub fn new() -> Self {
        Self::with_promiscuous(true)
    }

    /// Create a segment, choosing if its ports can capture foreign traffic.
    pub fn with_promiscuous(promiscuous: bool) -> Self {
        Hub {
            shared: Arc::new(Shared {
                promiscuous,
                ports: Mutex::new(Ports::default()),
            }),
        }
    }

    /// Attach a new device with the given hardware address.
    ///
    /// Spawns the receive thread of the port.
    pub fn port(&self, address: EthernetAddress) -> Result<Arc<Port>> {
        let (queue, incoming) = mpsc::channel();
        let listeners = Arc::new(Listeners::default());

        let rx_listeners = listeners.clone();
        thread::Builder::new()
            .name(format!("rx-{}", address))
            .spawn(move || receive_loop(incoming, rx_listeners))
            .map_err(|_| Error::Exhausted)?;

        let mut ports = self.shared.lock_ports();
        let id = ports.next_id;
        ports.next_id += 1;
        ports.attached.push(Attached { id, queue });

        net_debug!("hub: attached port {} as {}", id, address);
        Ok(Arc::new(Port {
            id,
            address,
            extra: RwLock::new(Vec::new()),
            listeners,
            shared: self.shared.clone(),
        }))
    }

    /// The number of attached ports.
    pub fn len(&self) -> usize {
        self.shared.lock_ports().attached.len()
    }

    /// Check if no port is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Hub {
    fn default() -> Self {
        Hub::new()
    }
}

impl Shared {
    fn lock_ports(&self) -> std::sync::MutexGuard<Ports> {
        // A poisoned list of senders is still consistent.
        self.ports.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

fn receive_loop(incoming: Receiver<Frame>, listeners: Arc<Listeners>) {
    for frame in incoming {
        let (bytes, own) = match &frame {
            Frame::Foreign(bytes) => (bytes, false),
            Frame::Own(bytes) => (bytes, true),
        };

        if !own {
            for listener in snapshot(&listeners.normal) {
                listener.on_frame(bytes);
            }
        }

        for listener in snapshot(&listeners.promiscuous) {
            listener.on_frame(bytes);
        }
    }
}

fn snapshot(list: &RwLock<Vec<(ListenerId, Arc<dyn Listener>)>>) -> Vec<Arc<dyn Listener>> {
    let list = list.read().unwrap_or_else(|poison| poison.into_inner());
    list.iter().map(|(_, listener)| listener.clone()).collect()
}

impl Device for Port {
    fn address(&self) -> EthernetAddress {
        self.address
    }

    fn add_address(&self, addr: EthernetAddress) {
        let mut extra = self.extra.write().unwrap_or_else(|poison| poison.into_inner());
        if addr != self.address && !extra.contains(&addr) {
            extra.push(addr);
        }
    }

    fn has_address(&self, addr: EthernetAddress) -> bool {
        addr == self.address || self.extra.read()
            .unwrap_or_else(|poison| poison.into_inner())
            .contains(&addr)
    }

    fn addresses(&self) -> Vec<EthernetAddress> {
        let extra = self.extra.read().unwrap_or_else(|poison| poison.into_inner());
        let mut all = Vec::with_capacity(extra.len() + 1);
        all.push(self.address);
        all.extend(extra.iter().cloned());
        all
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        let ports = self.shared.lock_ports();
        for port in ports.attached.iter() {
            let frame = if port.id == self.id {
                Frame::Own(frame.to_vec())
            } else {
                Frame::Foreign(frame.to_vec())
            };
            // A port whose receive loop ended is simply skipped.
            let _ = port.queue.send(frame);
        }
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn Listener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.normal.write()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        [&self.listeners.normal, &self.listeners.promiscuous].iter().any(|list| {
            let mut list = list.write().unwrap_or_else(|poison| poison.into_inner());
            let before = list.len();
            list.retain(|(other, _)| *other != id);
            list.len() != before
        })
    }

    fn add_promiscuous_listener(&self, listener: Arc<dyn Listener>) -> Result<ListenerId> {
        if !self.shared.promiscuous {
            return Err(Error::Unsupported("device does not support promiscuous capture"));
        }

        let id = ListenerId::next();
        self.listeners.promiscuous.write()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((id, listener));
        Ok(id)
    }
}

impl Drop for Port {
    fn drop(&mut self) {
        let mut ports = self.shared.lock_ports();
        ports.attached.retain(|port| port.id != self.id);
    }
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;
    use crate::layer::FnHandler;

    fn collect(port: &Port) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        port.add_listener(Arc::new(FnHandler(move |frame: &[u8]| {
            let _ = tx.lock().unwrap().send(frame.to_vec());
        })));
        rx
    }

    #[test]
    fn delivers_to_others() {
        let hub = Hub::new();
        let a = hub.port(EthernetAddress([2, 0, 0, 0, 0, 1])).unwrap();
        let b = hub.port(EthernetAddress([2, 0, 0, 0, 0, 2])).unwrap();
        let at_a = collect(&a);
        let at_b = collect(&b);

        a.send(&[1, 2, 3]).unwrap();
        assert_eq!(at_b.recv_timeout(Duration::from_secs(1)).unwrap(), vec![1, 2, 3]);
        assert!(at_a.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn promiscuous_sees_own() {
        let hub = Hub::new();
        let a = hub.port(EthernetAddress([2, 0, 0, 0, 0, 1])).unwrap();
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let id = a.add_promiscuous_listener(Arc::new(FnHandler(move |frame: &[u8]| {
            let _ = tx.lock().unwrap().send(frame.len());
        }))).unwrap();

        a.send(&[0; 60]).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 60);
        assert!(a.remove_listener(id));
        assert!(!a.remove_listener(id));
    }

    #[test]
    fn promiscuous_unsupported() {
        let hub = Hub::with_promiscuous(false);
        let a = hub.port(EthernetAddress([2, 0, 0, 0, 0, 1])).unwrap();
        let result = a.add_promiscuous_listener(Arc::new(FnHandler(|_: &[u8]| ())));
        match result {
            Err(Error::Unsupported(_)) => (),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn addresses() {
        let hub = Hub::new();
        let own = EthernetAddress([2, 0, 0, 0, 0, 1]);
        let a = hub.port(own).unwrap();
        a.add_address(EthernetAddress::BROADCAST);
        a.add_address(EthernetAddress::BROADCAST);
        assert!(a.has_address(own));
        assert!(a.has_address(EthernetAddress::BROADCAST));
        assert_eq!(a.addresses(), vec![own, EthernetAddress::BROADCAST]);

        assert_eq!(hub.len(), 1);
        drop(a);
        assert_eq!(hub.len(), 0);
    }
}
