use std::sync::{Arc, Mutex};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant as Clock};

use super::*;
use crate::layer::{eth, Error, FnHandler, Layer, Result};
use crate::nic::{Device, Hub, Port};
use crate::wire::{ethernet_frame, icmpv6_packet, ipv6_packet};
use crate::wire::{EthernetAddress, EthernetProtocol, EthernetRepr, IpAddress, IpProtocol};
use crate::wire::{Ipv6Address, Ipv6Cidr, Ipv6Repr};
use crate::wire::{NdiscNeighborFlags, NdiscPrefixInfoFlags, NdiscPrefixInformation, NdiscRepr};
use crate::wire::NdiscRouterFlags;

const MAC_HOST: EthernetAddress = EthernetAddress([0x8c, 0x85, 0x90, 0xa5, 0x09, 0x60]);
const MAC_ROUTER: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 1]);
const MAC_OTHER: EthernetAddress = EthernetAddress([0x02, 0, 0, 0, 0, 2]);

const WAIT: Duration = Duration::from_secs(2);
const QUIET: Duration = Duration::from_millis(200);

fn host_link_local() -> Ipv6Address {
    Ipv6Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960)
}

fn host_global() -> Ipv6Address {
    Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960)
}

fn prefix() -> Ipv6Address {
    Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0)
}

fn addr(last: u16) -> Ipv6Address {
    Ipv6Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, last)
}

fn fast() -> Config {
    Config {
        dad_attempts: 3,
        dad_interval: Duration::from_millis(100),
        router_poll_interval: Duration::from_millis(50),
        .. Config::default()
    }
}

fn stack(port: &Arc<Port>) -> Arc<eth::Endpoint> {
    eth::Endpoint::new(port.clone())
}

struct Captured {
    eth: EthernetRepr,
    ip: Ipv6Repr,
    payload: Vec<u8>,
}

impl Captured {
    fn ndisc(&self) -> Option<NdiscRepr> {
        if self.ip.next_header != IpProtocol::Icmpv6 {
            return None;
        }
        let packet = icmpv6_packet::new_checked(&self.payload).ok()?;
        NdiscRepr::parse(packet, self.ip.src_addr, self.ip.dst_addr).ok()
    }
}

/// Capture the IPv6 packets a raw port receives.
fn capture(port: &Port) -> Receiver<Captured> {
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    port.add_listener(Arc::new(FnHandler(move |bytes: &[u8]| {
        let frame = ethernet_frame::new_checked(bytes).unwrap();
        let eth = EthernetRepr::parse(frame).unwrap();
        if eth.ethertype != EthernetProtocol::Ipv6 {
            return;
        }
        let packet = ipv6_packet::new_checked(frame.payload()).unwrap();
        let ip = Ipv6Repr::parse(packet).unwrap();
        let payload = packet.payload_slice().to_vec();
        let _ = tx.lock().unwrap().send(Captured { eth, ip, payload });
    })));
    rx
}

/// Wait for the next neighbor discovery message accepted by the filter.
fn next_ndisc<F>(frames: &Receiver<Captured>, mut filter: F) -> Option<(Captured, NdiscRepr)>
    where F: FnMut(&NdiscRepr) -> bool
{
    let deadline = Clock::now() + WAIT;
    loop {
        let left = deadline.saturating_duration_since(Clock::now());
        let frame = frames.recv_timeout(left).ok()?;
        if let Some(repr) = frame.ndisc() {
            if filter(&repr) {
                return Some((frame, repr));
            }
        }
    }
}

/// Wait for the next packet that is not neighbor discovery.
fn next_data(frames: &Receiver<Captured>, timeout: Duration) -> Option<Captured> {
    let deadline = Clock::now() + timeout;
    loop {
        let left = deadline.saturating_duration_since(Clock::now());
        let frame = frames.recv_timeout(left).ok()?;
        if frame.ndisc().is_none() {
            return Some(frame);
        }
    }
}

fn is_solicit(repr: &NdiscRepr) -> bool {
    match repr {
        NdiscRepr::NeighborSolicit { .. } => true,
        _ => false,
    }
}

fn is_advert(repr: &NdiscRepr) -> bool {
    match repr {
        NdiscRepr::NeighborAdvert { .. } => true,
        _ => false,
    }
}

fn frame(eth: EthernetRepr, ip: Ipv6Repr, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; ethernet_frame::buffer_len(ipv6_packet::buffer_len(payload.len()))];
    let frame = ethernet_frame::new_unchecked_mut(&mut buffer);
    eth.emit(frame);
    let packet = ipv6_packet::new_unchecked_mut(frame.payload_mut());
    ip.emit(packet);
    packet.payload_mut_slice().copy_from_slice(payload);
    buffer
}

fn ndisc_frame(
    dst_mac: EthernetAddress,
    src_addr: Ipv6Address,
    dst_addr: Ipv6Address,
    hop_limit: u8,
    repr: NdiscRepr,
) -> Vec<u8> {
    let mut icmp = vec![0; repr.buffer_len()];
    repr.emit(icmpv6_packet::new_unchecked_mut(&mut icmp), src_addr, dst_addr);
    frame(EthernetRepr {
        src_addr: MAC_OTHER,
        dst_addr: dst_mac,
        ethertype: EthernetProtocol::Ipv6,
    }, Ipv6Repr {
        src_addr,
        dst_addr,
        next_header: IpProtocol::Icmpv6,
        payload_len: icmp.len(),
        hop_limit,
    }, &icmp)
}

fn udp_frame(dst_mac: EthernetAddress, src_addr: Ipv6Address, dst_addr: Ipv6Address) -> Vec<u8> {
    let payload = b"datagram";
    frame(EthernetRepr {
        src_addr: MAC_OTHER,
        dst_addr: dst_mac,
        ethertype: EthernetProtocol::Ipv6,
    }, Ipv6Repr {
        src_addr,
        dst_addr,
        next_header: IpProtocol::Udp,
        payload_len: payload.len(),
        hop_limit: 64,
    }, payload)
}

fn router_advert(flags: NdiscRouterFlags, router_lifetime: u16) -> NdiscRepr {
    prefix_advert(flags, router_lifetime, prefix(), 64)
}

fn prefix_advert(
    flags: NdiscRouterFlags,
    router_lifetime: u16,
    prefix: Ipv6Address,
    prefix_len: u8,
) -> NdiscRepr {
    NdiscRepr::RouterAdvert {
        hop_limit: 64,
        flags,
        router_lifetime,
        reachable_time: 0,
        retrans_time: 0,
        lladdr: Some(MAC_OTHER),
        mtu: None,
        prefix_info: Some(NdiscPrefixInformation {
            prefix_len,
            flags: NdiscPrefixInfoFlags::ON_LINK | NdiscPrefixInfoFlags::ADDRCONF,
            valid_lifetime: 600,
            preferred_lifetime: 300,
            prefix,
        }),
    }
}

fn wait_for<F: FnMut() -> bool>(mut condition: F) {
    let start = Clock::now();
    while !condition() {
        assert!(start.elapsed() < WAIT, "condition not reached in time");
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn eui64_link_local() {
    let hub = Hub::new();
    let port = hub.port(MAC_HOST).unwrap();
    let iface = Interface::new(stack(&port), fast());

    assert_eq!(iface.phase(), Phase::Unconfigured);
    assert_eq!(iface.link_local(), host_link_local());
    assert_eq!(iface.addresses(), vec![Ipv6Cidr::new(host_link_local(), 64)]);
    assert_eq!(iface.address(), host_link_local());

    let link_local = iface.link_local();
    let id = &link_local.as_bytes()[8..];
    assert_eq!(id[0], 0x8c ^ 0x02);
    assert_eq!(&id[3..5], &[0xff, 0xfe]);
    assert_eq!(&id[5..], &MAC_HOST.as_bytes()[3..]);
}

#[test]
fn dad_detects_duplicate() {
    let hub = Hub::new();
    let host = hub.port(MAC_HOST).unwrap();
    let other = hub.port(MAC_OTHER).unwrap();

    // Another node already claims the address the host derives.
    let _owner = Interface::with_address(stack(&other),
        Ipv6Cidr::new(host_link_local(), 64), fast());

    let iface = Interface::new(stack(&host), Config {
        dad_interval: Duration::from_millis(500),
        .. fast()
    });
    assert_eq!(iface.configure(), Err(Error::DuplicateAddress(host_link_local())));
    assert_eq!(iface.phase(), Phase::DuplicateDetected);

    let out = Out::new(Ipv6Address::LINK_LOCAL_ALL_NODES, IpProtocol::Udp, vec![0; 8]);
    assert_eq!(iface.send(out), Err(Error::DuplicateAddress(host_link_local())));
    assert_eq!(iface.configure(), Err(Error::Illegal));
}

#[test]
fn dad_then_router_solicit() {
    let hub = Hub::new();
    let host = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let iface = Interface::new(stack(&host), fast());
    let worker = {
        let iface = iface.clone();
        thread::spawn(move || iface.configure())
    };

    let (probe, repr) = next_ndisc(&frames, is_solicit).unwrap();
    assert_eq!(probe.eth.dst_addr, EthernetAddress([0x33, 0x33, 0xff, 0xa5, 0x09, 0x60]));
    assert_eq!(probe.ip.src_addr, Ipv6Address::UNSPECIFIED);
    assert_eq!(probe.ip.dst_addr, host_link_local().solicited_node_multicast());
    assert_eq!(probe.ip.hop_limit, 255);
    assert_eq!(repr, NdiscRepr::NeighborSolicit {
        target_addr: host_link_local(),
        lladdr: None,
    });

    let (solicit, repr) = next_ndisc(&frames, |repr| match repr {
        NdiscRepr::RouterSolicit { .. } => true,
        _ => false,
    }).unwrap();
    assert_eq!(solicit.eth.dst_addr, EthernetAddress([0x33, 0x33, 0, 0, 0, 2]));
    assert_eq!(solicit.ip.src_addr, host_link_local());
    assert_eq!(solicit.ip.dst_addr, Ipv6Address::LINK_LOCAL_ALL_ROUTERS);
    assert_eq!(repr, NdiscRepr::RouterSolicit { lladdr: Some(MAC_HOST) });
    assert_eq!(iface.phase(), Phase::RouterSolicitPending);

    // Nobody answers, the interface keeps waiting past several poll intervals.
    thread::sleep(QUIET);
    assert_eq!(iface.phase(), Phase::RouterSolicitPending);

    iface.close();
    assert_eq!(worker.join().unwrap(), Err(Error::Closed));
}

#[test]
fn tentative_address_not_served() {
    let hub = Hub::new();
    let host = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let iface = Interface::new(stack(&host), Config {
        dad_attempts: 1,
        dad_interval: Duration::from_secs(1),
        .. fast()
    });
    let worker = {
        let iface = iface.clone();
        thread::spawn(move || iface.configure())
    };

    next_ndisc(&frames, is_solicit).unwrap();
    assert_eq!(iface.phase(), Phase::DadPending);

    let other = link_local_address(MAC_OTHER);
    let group = host_link_local().solicited_node_multicast();
    raw.send(&ndisc_frame(EthernetAddress::ipv6_multicast(group), other, group, 255,
        NdiscRepr::NeighborSolicit {
            target_addr: host_link_local(),
            lladdr: Some(MAC_OTHER),
        })).unwrap();

    let quiet = Clock::now();
    while quiet.elapsed() < QUIET {
        if let Ok(frame) = frames.recv_timeout(Duration::from_millis(20)) {
            assert!(!frame.ndisc().map_or(false, |repr| is_advert(&repr)));
        }
    }

    iface.close();
    assert_eq!(worker.join().unwrap(), Err(Error::Closed));
}

#[test]
fn slaac_from_router() {
    let hub = Hub::new();
    let router_port = hub.port(MAC_ROUTER).unwrap();
    let host_port = hub.port(MAC_HOST).unwrap();

    let _router = Interface::with_address(stack(&router_port),
        Ipv6Cidr::new(addr(1), 64), Config::router());
    let host = Interface::new(stack(&host_port), fast());
    assert_eq!(host.addresses().len(), 1);

    assert_eq!(host.configure(), Ok(()));
    assert_eq!(host.phase(), Phase::Configured);
    assert_eq!(host.addresses(), vec![Ipv6Cidr::new(host_global(), 64)]);
    assert_eq!(host.address(), host_global());
    assert_eq!(host.link_local(), host_link_local());

    let router_link_local = link_local_address(MAC_ROUTER);
    assert_eq!(host.neighbor(router_link_local), Some(MAC_ROUTER));
    let gateway = host.routes().default_route().and_then(|route| route.next_hop);
    assert_eq!(gateway, Some(IpAddress::Ipv6(router_link_local)));
}

#[test]
fn slaac_ignores_managed_advert() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::new(stack(&host_port), fast());
    let worker = {
        let host = host.clone();
        thread::spawn(move || host.configure())
    };

    next_ndisc(&frames, |repr| match repr {
        NdiscRepr::RouterSolicit { .. } => true,
        _ => false,
    }).unwrap();

    let all_nodes = EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_NODES);
    let router = link_local_address(MAC_OTHER);
    raw.send(&ndisc_frame(all_nodes, router, Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
        router_advert(NdiscRouterFlags::MANAGED, 0))).unwrap();

    thread::sleep(QUIET);
    assert_eq!(host.phase(), Phase::RouterSolicitPending);
    assert_eq!(host.address(), host_link_local());

    raw.send(&ndisc_frame(all_nodes, router, Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
        router_advert(NdiscRouterFlags::empty(), 0))).unwrap();

    assert_eq!(worker.join().unwrap(), Ok(()));
    assert_eq!(host.addresses(), vec![Ipv6Cidr::new(host_global(), 64)]);
    // A router lifetime of zero does not make a default router.
    assert!(host.routes().default_route().is_none());
}

#[test]
fn router_advert_contents() {
    let hub = Hub::new();
    let router_port = hub.port(MAC_ROUTER).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let router = Interface::with_address(stack(&router_port),
        Ipv6Cidr::new(addr(1), 64), Config::router());

    let other = link_local_address(MAC_OTHER);
    let all_routers = EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_ROUTERS);
    raw.send(&ndisc_frame(all_routers, other, Ipv6Address::LINK_LOCAL_ALL_ROUTERS, 255,
        NdiscRepr::RouterSolicit { lladdr: Some(MAC_OTHER) })).unwrap();

    let (advert, repr) = next_ndisc(&frames, |repr| match repr {
        NdiscRepr::RouterAdvert { .. } => true,
        _ => false,
    }).unwrap();

    assert_eq!(advert.eth.dst_addr, MAC_OTHER);
    assert_eq!(advert.eth.src_addr, MAC_ROUTER);
    assert_eq!(advert.ip.src_addr, link_local_address(MAC_ROUTER));
    assert_eq!(advert.ip.dst_addr, other);
    assert_eq!(repr, NdiscRepr::RouterAdvert {
        hop_limit: 10,
        flags: NdiscRouterFlags::OTHER,
        router_lifetime: 10000,
        reachable_time: 10000,
        retrans_time: 10000,
        lladdr: Some(MAC_ROUTER),
        mtu: None,
        prefix_info: Some(NdiscPrefixInformation {
            prefix_len: 64,
            flags: NdiscPrefixInfoFlags::ON_LINK | NdiscPrefixInfoFlags::ADDRCONF,
            valid_lifetime: 99999,
            preferred_lifetime: 99999,
            prefix: prefix(),
        }),
    });

    assert_eq!(router.neighbor(other), Some(MAC_OTHER));
}

#[test]
fn serves_neighbor_solicit() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    let other = link_local_address(MAC_OTHER);
    let group = addr(5).solicited_node_multicast();
    raw.send(&ndisc_frame(EthernetAddress::ipv6_multicast(group), other, group, 255,
        NdiscRepr::NeighborSolicit {
            target_addr: addr(5),
            lladdr: Some(MAC_OTHER),
        })).unwrap();

    let (advert, repr) = next_ndisc(&frames, is_advert).unwrap();
    assert_eq!(advert.eth.dst_addr, MAC_OTHER);
    assert_eq!(advert.ip.src_addr, addr(5));
    assert_eq!(advert.ip.dst_addr, other);
    assert_eq!(repr, NdiscRepr::NeighborAdvert {
        flags: NdiscNeighborFlags::SOLICITED | NdiscNeighborFlags::OVERRIDE,
        target_addr: addr(5),
        lladdr: Some(MAC_HOST),
    });

    // The solicitor was learned on the way.
    assert_eq!(host.neighbor(other), Some(MAC_OTHER));
}

#[test]
fn learns_from_any_solicitation() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    // Asks for somebody else, sent directly to the host.
    raw.send(&ndisc_frame(MAC_HOST, addr(7), addr(5), 255, NdiscRepr::NeighborSolicit {
        target_addr: addr(9),
        lladdr: Some(MAC_OTHER),
    })).unwrap();

    wait_for(|| host.neighbor(addr(7)) == Some(MAC_OTHER));
    assert!(next_ndisc(&frames, is_advert).is_none());
}

#[test]
fn forwarded_ndisc_is_ignored() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    raw.send(&ndisc_frame(MAC_HOST, addr(7), addr(5), 64, NdiscRepr::NeighborSolicit {
        target_addr: addr(5),
        lladdr: Some(MAC_OTHER),
    })).unwrap();

    assert!(next_ndisc(&frames, is_advert).is_none());
    assert_eq!(host.neighbor(addr(7)), None);
}

#[test]
fn learned_neighbor_is_addressed() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    let all_nodes = EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_NODES);
    raw.send(&ndisc_frame(all_nodes, addr(7), Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
        NdiscRepr::NeighborAdvert {
            flags: NdiscNeighborFlags::OVERRIDE,
            target_addr: addr(7),
            lladdr: Some(MAC_OTHER),
        })).unwrap();
    wait_for(|| host.neighbor(addr(7)) == Some(MAC_OTHER));

    host.send(Out::new(addr(7), IpProtocol::Udp, b"hello".to_vec())).unwrap();

    let data = next_data(&frames, WAIT).unwrap();
    assert_eq!(data.eth.dst_addr, MAC_OTHER);
    assert_eq!(data.ip.src_addr, addr(5));
    assert_eq!(data.ip.dst_addr, addr(7));
    assert_eq!(data.ip.next_header, IpProtocol::Udp);
    assert_eq!(data.ip.hop_limit, DEFAULT_HOP_LIMIT);
    assert_eq!(data.payload, b"hello");
}

#[test]
fn unresolved_falls_back_to_broadcast() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());
    host.send(Out::new(addr(7), IpProtocol::Udp, b"first".to_vec())).unwrap();

    let (solicit, repr) = next_ndisc(&frames, is_solicit).unwrap();
    let group = addr(7).solicited_node_multicast();
    assert_eq!(solicit.eth.dst_addr, EthernetAddress::ipv6_multicast(group));
    assert_eq!(solicit.ip.src_addr, addr(5));
    assert_eq!(solicit.ip.dst_addr, group);
    assert_eq!(repr, NdiscRepr::NeighborSolicit {
        target_addr: addr(7),
        lladdr: Some(MAC_HOST),
    });

    let data = next_data(&frames, WAIT).unwrap();
    assert_eq!(data.eth.dst_addr, EthernetAddress::BROADCAST);
    assert_eq!(data.payload, b"first");

    // Within the rate limit the neighbor is not solicited again.
    host.send(Out::new(addr(7), IpProtocol::Udp, b"second".to_vec())).unwrap();
    let data = next_data(&frames, WAIT).unwrap();
    assert_eq!(data.eth.dst_addr, EthernetAddress::BROADCAST);
    assert_eq!(data.payload, b"second");
    assert!(frames.recv_timeout(QUIET).is_err());
}

#[test]
fn expired_neighbor_is_forgotten() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), Config {
        neighbor_lifetime: Duration::from_millis(200),
        .. fast()
    });

    let all_nodes = EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_NODES);
    raw.send(&ndisc_frame(all_nodes, addr(7), Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
        NdiscRepr::NeighborAdvert {
            flags: NdiscNeighborFlags::OVERRIDE,
            target_addr: addr(7),
            lladdr: Some(MAC_OTHER),
        })).unwrap();
    wait_for(|| host.neighbor(addr(7)).is_some());

    thread::sleep(Duration::from_millis(300));
    assert_eq!(host.neighbor(addr(7)), None);

    host.send(Out::new(addr(7), IpProtocol::Udp, b"late".to_vec())).unwrap();
    next_ndisc(&frames, is_solicit).unwrap();
    let data = next_data(&frames, WAIT).unwrap();
    assert_eq!(data.eth.dst_addr, EthernetAddress::BROADCAST);
}

#[test]
fn upper_layer_and_observers() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    let (up_tx, up_rx) = mpsc::channel();
    let up_tx = Mutex::new(up_tx);
    host.register(IpProtocol::Udp, Arc::new(FnHandler(move |packet: &ipv6_packet| -> Result<()> {
        let _ = up_tx.lock().unwrap().send(packet.src_addr());
        Ok(())
    })));

    let (seen_tx, seen_rx) = mpsc::channel();
    let seen_tx = Mutex::new(seen_tx);
    let observer = host.add_observer(Arc::new(FnHandler(move |packet: &ipv6_packet| -> Result<()> {
        if packet.next_header() == IpProtocol::Udp {
            let _ = seen_tx.lock().unwrap().send((packet.src_addr(), packet.dst_addr()));
        }
        Ok(())
    })));

    raw.send(&udp_frame(MAC_HOST, addr(7), addr(5))).unwrap();
    assert_eq!(up_rx.recv_timeout(WAIT), Ok(addr(7)));
    assert_eq!(seen_rx.recv_timeout(WAIT), Ok((addr(7), addr(5))));

    // Packets for other addresses are observed but not delivered.
    raw.send(&udp_frame(MAC_HOST, addr(7), addr(6))).unwrap();
    assert_eq!(seen_rx.recv_timeout(WAIT), Ok((addr(7), addr(6))));
    assert!(up_rx.recv_timeout(QUIET).is_err());

    host.send(Out::new(addr(7), IpProtocol::Udp, b"reply".to_vec())).unwrap();
    assert_eq!(seen_rx.recv_timeout(WAIT), Ok((addr(5), addr(7))));
    next_data(&frames, WAIT).unwrap();

    assert!(host.remove_observer(observer));
    assert!(!host.remove_observer(observer));
}

#[test]
fn close_detaches() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());
    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    host.register(IpProtocol::Udp, Arc::new(FnHandler(move |_: &ipv6_packet| -> Result<()> {
        let _ = tx.lock().unwrap().send(());
        Ok(())
    })));

    host.close();
    assert!(host.demux().is_empty());
    assert!(!host.eth().demux().contains(EthernetProtocol::Ipv6));

    raw.send(&udp_frame(MAC_HOST, addr(7), addr(5))).unwrap();
    assert!(rx.recv_timeout(QUIET).is_err());

    let out = Out::new(addr(7), IpProtocol::Udp, vec![]);
    assert_eq!(host.send(out), Err(Error::Closed));
    assert_eq!(host.configure(), Err(Error::Closed));
}

#[test]
fn oversized_payload() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    let out = Out::new(addr(7), IpProtocol::Udp, vec![0; 0x1_0000]);
    assert_eq!(host.send(out), Err(Error::BadSize));
}

#[test]
fn slaac_ignores_unusable_prefix() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::new(stack(&host_port), fast());
    let worker = {
        let host = host.clone();
        thread::spawn(move || host.configure())
    };

    next_ndisc(&frames, |repr| match repr {
        NdiscRepr::RouterSolicit { .. } => true,
        _ => false,
    }).unwrap();

    let all_nodes = EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_NODES);
    let router = link_local_address(MAC_OTHER);
    let unusable = [
        (Ipv6Address::new(0xff02, 0, 0, 0, 0, 0, 0, 0), 64),
        (Ipv6Address::UNSPECIFIED, 128),
        (Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 64),
        (prefix(), 0),
    ];
    for &(prefix, prefix_len) in unusable.iter() {
        raw.send(&ndisc_frame(all_nodes, router, Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
            prefix_advert(NdiscRouterFlags::empty(), 600, prefix, prefix_len))).unwrap();
    }

    thread::sleep(QUIET);
    assert_eq!(host.phase(), Phase::RouterSolicitPending);
    assert_eq!(host.addresses(), vec![Ipv6Cidr::new(host_link_local(), 64)]);
    assert!(host.routes().default_route().is_none());

    // Still reachable through its solicited-node group and configurable afterwards.
    let group = host_link_local().solicited_node_multicast();
    raw.send(&ndisc_frame(EthernetAddress::ipv6_multicast(group), addr(7), group, 255,
        NdiscRepr::NeighborSolicit {
            target_addr: host_link_local(),
            lladdr: Some(MAC_OTHER),
        })).unwrap();
    next_ndisc(&frames, is_advert).unwrap();

    raw.send(&ndisc_frame(all_nodes, router, Ipv6Address::LINK_LOCAL_ALL_NODES, 255,
        router_advert(NdiscRouterFlags::empty(), 600))).unwrap();
    assert_eq!(worker.join().unwrap(), Ok(()));
    assert_eq!(host.addresses(), vec![Ipv6Cidr::new(host_global(), 64)]);
}

#[test]
fn neighbor_cache_is_bounded() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), Config {
        neighbor_capacity: 4,
        .. fast()
    });

    for last in 100..110 {
        raw.send(&ndisc_frame(MAC_HOST, addr(last), addr(5), 255, NdiscRepr::NeighborSolicit {
            target_addr: addr(9),
            lladdr: Some(MAC_OTHER),
        })).unwrap();
    }

    wait_for(|| host.neighbor(addr(109)).is_some());
    let known = (100..110).filter(|&last| host.neighbor(addr(last)).is_some()).count();
    assert_eq!(known, 4);
}

#[test]
fn solicits_each_unresolved_neighbor() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let raw = hub.port(MAC_OTHER).unwrap();
    let frames = capture(&raw);

    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());
    host.send(Out::new(addr(7), IpProtocol::Udp, b"first".to_vec())).unwrap();
    host.send(Out::new(addr(8), IpProtocol::Udp, b"second".to_vec())).unwrap();

    let mut targets = Vec::new();
    for _ in 0..2 {
        match next_ndisc(&frames, is_solicit) {
            Some((_, NdiscRepr::NeighborSolicit { target_addr, .. })) => targets.push(target_addr),
            other => panic!("expected a solicitation, got {:?}", other.map(|(_, repr)| repr)),
        }
    }
    targets.sort();
    assert_eq!(targets, vec![addr(7), addr(8)]);
}

#[test]
fn unspecified_destination() {
    let hub = Hub::new();
    let host_port = hub.port(MAC_HOST).unwrap();
    let host = Interface::with_address(stack(&host_port), Ipv6Cidr::new(addr(5), 64), fast());

    let out = Out::new(Ipv6Address::UNSPECIFIED, IpProtocol::Udp, b"nowhere".to_vec());
    assert_eq!(host.send(out), Err(Error::Illegal));
}
