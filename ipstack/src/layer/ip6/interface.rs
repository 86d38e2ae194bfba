use std::iter;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::thread;

use crate::layer::{eth, Demux, Error, FnHandler, Handle, Layer, Recv, Result};
use crate::layer::demux::deliver;
use crate::layer::eth::{Answer, NeighborCache};
use crate::layer::ip::{IfIndex, Route, Routes};
use crate::nic::ListenerId;
use crate::time::{Duration, Instant};
use crate::wire::{ethernet_frame, icmpv6_packet, ipv6_packet};
use crate::wire::{EthernetAddress, EthernetProtocol, InterfaceId, IpAddress, IpCidr, IpProtocol};
use crate::wire::{Ipv6Address, Ipv6Cidr, Ipv6Repr};
use crate::wire::{NdiscNeighborFlags, NdiscPrefixInformation, NdiscRepr, NdiscRouterFlags};

use super::{Config, RouterConfig};

/// Hop limit of packets sent without an explicit one.
pub const DEFAULT_HOP_LIMIT: u8 = 64;

/// Neighbor discovery messages with any other hop limit were forwarded and are invalid.
const NDISC_HOP_LIMIT: u8 = 255;

/// Prefix length of the link-local address.
const LINK_LOCAL_PREFIX_LEN: u8 = 64;

/// The routing table of an interface only refers to the interface itself.
const OWN_INDEX: IfIndex = IfIndex(0);

/// The configuration progress of an [`Interface`].
///
/// [`Interface`]: struct.Interface.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The tentative link-local address is derived but not probed.
    Unconfigured,
    /// Waiting for other nodes to object to the tentative address.
    DadPending,
    /// The link-local address is unique, waiting for a router advertisement.
    RouterSolicitPending,
    /// The primary address is usable.
    Configured,
    /// Another node uses the tentative address. The interface stays unusable.
    DuplicateDetected,
}

/// An outgoing IPv6 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Out {
    /// The source, the primary address when `None`.
    pub src_addr: Option<Ipv6Address>,
    /// The destination address.
    pub dst_addr: Ipv6Address,
    /// The protocol of the payload.
    pub next_header: IpProtocol,
    /// The hop limit, [`DEFAULT_HOP_LIMIT`] for `Out::new`.
    ///
    /// [`DEFAULT_HOP_LIMIT`]: constant.DEFAULT_HOP_LIMIT.html
    pub hop_limit: u8,
    /// The upper layer packet, at most 65535 bytes.
    pub payload: Vec<u8>,
}

/// An IPv6 interface on an Ethernet link.
///
/// Runs neighbor discovery ([RFC 4861]) and stateless address autoconfiguration ([RFC 4862]) for
/// its addresses. The first address of the interface is its primary address, used as the default
/// source of outgoing packets. Autoconfiguration replaces it in place.
///
/// Neighbor solicitations for any of its addresses are answered once the address is no longer
/// tentative. Solicitations and advertisements seen on the link fill the neighbor cache used to
/// address outgoing frames. Sending does not block on address resolution: a missing neighbor is
/// solicited and the packet itself goes to the broadcast address.
///
/// [RFC 4861]: https://tools.ietf.org/html/rfc4861
/// [RFC 4862]: https://tools.ietf.org/html/rfc4862
pub struct Interface {
    this: Weak<Interface>,
    eth: Arc<eth::Endpoint>,
    config: Config,
    demux: Demux<IpProtocol, ipv6_packet>,
    state: Mutex<State>,
    /// Signalled on every change of `state` that a configuration wait depends on.
    changed: Condvar,
    neighbors: Mutex<NeighborCache>,
    routes: RwLock<Routes>,
    observers: RwLock<Vec<(ListenerId, Arc<dyn Recv<ipv6_packet>>)>>,
    /// The registration at the ethernet layer, `None` once closed.
    handle: Mutex<Option<Handle>>,
}

struct State {
    phase: Phase,
    /// Never empty, the first entry is the primary address.
    addresses: Vec<Ipv6Cidr>,
    link_local: Ipv6Address,
    awaiting_router: bool,
    dad_retries: u32,
    last_advert: Option<NdiscRepr>,
    closed: bool,
}

impl Out {
    /// A packet from the primary address with the default hop limit.
    pub fn new(dst_addr: Ipv6Address, next_header: IpProtocol, payload: Vec<u8>) -> Self {
        Out {
            src_addr: None,
            dst_addr,
            next_header,
            hop_limit: DEFAULT_HOP_LIMIT,
            payload,
        }
    }
}

impl Interface {
    /// Create an unconfigured interface.
    ///
    /// Derives the tentative link-local address from the hardware address of the link. The
    /// address is not used until [`configure`] has checked that it is unique.
    ///
    /// [`configure`]: #method.configure
    pub fn new(eth: Arc<eth::Endpoint>, config: Config) -> Arc<Self> {
        let link_local = link_local_address(eth.address());
        let primary = Ipv6Cidr::new(link_local, LINK_LOCAL_PREFIX_LEN);
        Self::attach(eth, config, Phase::Unconfigured, primary)
    }

    /// Create an interface with a manually assigned primary address.
    ///
    /// The address is used immediately without duplicate address detection. The derived
    /// link-local address is served as well.
    pub fn with_address(eth: Arc<eth::Endpoint>, addr: Ipv6Cidr, config: Config) -> Arc<Self> {
        let iface = Self::attach(eth, config, Phase::Configured, addr);
        iface.join_solicited(addr.address());
        iface.write_routes().add(Route::direct(IpCidr::Ipv6(addr), OWN_INDEX));
        iface
    }

    /// Create an interface and run the autoconfiguration until done.
    ///
    /// See [`configure`] for the failure conditions.
    ///
    /// [`configure`]: #method.configure
    pub fn autoconfigure(eth: Arc<eth::Endpoint>, config: Config) -> Result<Arc<Self>> {
        let iface = Self::new(eth, config);
        iface.configure()?;
        Ok(iface)
    }

    fn attach(eth: Arc<eth::Endpoint>, config: Config, phase: Phase, primary: Ipv6Cidr)
        -> Arc<Self>
    {
        let link_local = link_local_address(eth.address());
        eth.join(EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_NODES));
        if config.is_router() {
            eth.join(EthernetAddress::ipv6_multicast(Ipv6Address::LINK_LOCAL_ALL_ROUTERS));
        }
        if phase == Phase::Configured {
            eth.join(EthernetAddress::ipv6_multicast(link_local.solicited_node_multicast()));
        }

        let mut routes = Routes::new();
        routes.add(Route::direct(
            IpCidr::Ipv6(Ipv6Cidr::new(link_local, LINK_LOCAL_PREFIX_LEN)),
            OWN_INDEX));

        Arc::new_cyclic(|weak: &Weak<Interface>| {
            let this = weak.clone();
            let handle = eth.register(EthernetProtocol::Ipv6, Arc::new(FnHandler(
                move |frame: &ethernet_frame| -> Result<()> {
                    match this.upgrade() {
                        Some(iface) => iface.receive(frame),
                        None => Ok(()),
                    }
                })));

            Interface {
                this: weak.clone(),
                eth,
                demux: Demux::new("ip6"),
                state: Mutex::new(State {
                    phase,
                    addresses: vec![primary],
                    link_local,
                    awaiting_router: false,
                    dad_retries: 0,
                    last_advert: None,
                    closed: false,
                }),
                changed: Condvar::new(),
                neighbors: Mutex::new(NeighborCache::with_capacity(
                    config.neighbor_lifetime,
                    config.neighbor_capacity)),
                routes: RwLock::new(routes),
                observers: RwLock::new(Vec::new()),
                handle: Mutex::new(Some(handle)),
                config,
            }
        })
    }

    /// Run duplicate address detection and router discovery.
    ///
    /// Blocks until the interface is configured. Fails with `Error::DuplicateAddress` if another
    /// node answers for the tentative address within the detection window; the interface is then
    /// in its terminal [`Phase::DuplicateDetected`]. Router discovery waits without bound, only
    /// [`close`] ends it early with `Error::Closed`. In router mode the interface is configured
    /// right after the address turned out unique.
    ///
    /// Fails with `Error::Illegal` unless the interface is unconfigured.
    ///
    /// [`Phase::DuplicateDetected`]: enum.Phase.html#variant.DuplicateDetected
    /// [`close`]: ../trait.Layer.html#method.close
    pub fn configure(&self) -> Result<()> {
        let tentative = {
            let mut state = self.lock();
            if state.closed {
                return Err(Error::Closed);
            }
            if state.phase != Phase::Unconfigured {
                return Err(Error::Illegal);
            }
            state.phase = Phase::DadPending;
            state.dad_retries = 0;
            state.last_advert = None;
            state.addresses[0].address()
        };

        net_debug!("ip6: probing tentative address {}", tentative);
        let group = tentative.solicited_node_multicast();
        self.eth.join(EthernetAddress::ipv6_multicast(group));
        self.send_ndisc(Ipv6Address::UNSPECIFIED, group, NdiscRepr::NeighborSolicit {
            target_addr: tentative,
            lladdr: None,
        })?;

        let mut state = self.lock();
        for attempt in 1..=self.config.dad_attempts {
            state = self.wait_while(state, self.config.dad_interval,
                |state| state.last_advert.is_none() && !state.closed);
            if state.closed || state.last_advert.is_some() {
                break;
            }
            state.dad_retries = attempt;
        }

        if state.closed {
            return Err(Error::Closed);
        }

        if let Some(advert) = state.last_advert {
            state.phase = Phase::DuplicateDetected;
            net_error!("ip6: duplicate address {}, got {}; configure the interface manually",
                tentative, advert);
            return Err(Error::DuplicateAddress(tentative));
        }

        net_debug!("ip6: {} is unique after {} probe intervals", tentative, state.dad_retries);
        if self.config.is_router() {
            state.phase = Phase::Configured;
            return Ok(());
        }

        state.phase = Phase::RouterSolicitPending;
        state.awaiting_router = true;
        let link_local = state.link_local;
        drop(state);

        self.send_ndisc(link_local, Ipv6Address::LINK_LOCAL_ALL_ROUTERS, NdiscRepr::RouterSolicit {
            lladdr: Some(self.eth.address()),
        })?;

        let mut state = self.lock();
        loop {
            state = self.wait_while(state, self.config.router_poll_interval,
                |state| state.awaiting_router && !state.closed);
            if state.closed {
                return Err(Error::Closed);
            }
            if !state.awaiting_router {
                return Ok(());
            }
            net_trace!("ip6: still waiting for a router advertisement");
        }
    }

    /// The ethernet layer below.
    pub fn eth(&self) -> &Arc<eth::Endpoint> {
        &self.eth
    }

    /// The configuration the interface was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current configuration phase.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// All addresses, the primary address first.
    pub fn addresses(&self) -> Vec<Ipv6Cidr> {
        self.lock().addresses.clone()
    }

    /// The link-local address derived from the hardware address.
    pub fn link_local(&self) -> Ipv6Address {
        self.lock().link_local
    }

    /// The cached link address of a neighbor, if it is still valid.
    pub fn neighbor(&self, addr: Ipv6Address) -> Option<EthernetAddress> {
        self.lock_neighbors().lookup_pure(&IpAddress::Ipv6(addr), Instant::now())
    }

    /// The routing table consulted for the next hop of outgoing packets.
    ///
    /// Destinations without a route are assumed to be on-link.
    pub fn routes(&self) -> RwLockReadGuard<Routes> {
        self.routes.read().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Modify the routing table.
    pub fn routes_mut(&self) -> RwLockWriteGuard<Routes> {
        self.write_routes()
    }

    /// Observe every packet received on the interface and every packet it sends.
    ///
    /// Received packets are observed before the destination is checked.
    pub fn add_observer(&self, handler: Arc<dyn Recv<ipv6_packet>>) -> ListenerId {
        let id = ListenerId::next();
        self.observers.write()
            .unwrap_or_else(|poison| poison.into_inner())
            .push((id, handler));
        id
    }

    /// Remove an observer added with [`add_observer`].
    ///
    /// [`add_observer`]: #method.add_observer
    pub fn remove_observer(&self, id: ListenerId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|poison| poison.into_inner());
        let before = observers.len();
        observers.retain(|(other, _)| *other != id);
        observers.len() != before
    }

    fn receive(&self, frame: &ethernet_frame) -> Result<()> {
        let packet = match ipv6_packet::new_checked(frame.payload()) {
            Ok(packet) => packet,
            Err(err) => {
                net_debug!("ip6: dropped malformed packet: {}", err);
                return Ok(());
            },
        };
        let repr = match Ipv6Repr::parse(packet) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("ip6: dropped malformed packet: {}", err);
                return Ok(());
            },
        };

        // Cut off the link layer padding.
        let packet = ipv6_packet::new_unchecked(&packet.as_bytes()[..packet.total_len()]);
        self.observe(packet);

        if !self.accepts(repr.dst_addr) {
            net_trace!("ip6: ignored packet for {}", repr.dst_addr);
            return Ok(());
        }

        if repr.next_header == IpProtocol::Icmpv6 {
            self.process_icmpv6(frame.src_addr(), &repr, packet.payload_slice());
        }

        self.demux.dispatch(repr.next_header, packet);
        Ok(())
    }

    fn process_icmpv6(&self, link_src: EthernetAddress, ip: &Ipv6Repr, payload: &[u8]) {
        let packet = match icmpv6_packet::new_checked(payload) {
            Ok(packet) => packet,
            Err(err) => {
                net_debug!("ip6: dropped malformed icmpv6 message: {}", err);
                return;
            },
        };

        if !packet.msg_type().is_ndisc() {
            return;
        }

        if ip.hop_limit != NDISC_HOP_LIMIT {
            net_debug!("ip6: dropped {} from {} with hop limit {}",
                packet.msg_type(), ip.src_addr, ip.hop_limit);
            return;
        }

        let repr = match NdiscRepr::parse(packet, ip.src_addr, ip.dst_addr) {
            Ok(repr) => repr,
            Err(err) => {
                net_debug!("ip6: dropped {} from {}: {}", packet.msg_type(), ip.src_addr, err);
                return;
            },
        };

        net_trace!("ip6: {} from {}", repr, ip.src_addr);
        match repr {
            NdiscRepr::NeighborSolicit { target_addr, lladdr } =>
                self.solicited(ip.src_addr, target_addr, lladdr.unwrap_or(link_src)),
            NdiscRepr::NeighborAdvert { target_addr, lladdr, .. } =>
                self.advertised(repr, target_addr, lladdr),
            NdiscRepr::RouterSolicit { lladdr } =>
                self.router_solicited(ip.src_addr, lladdr),
            NdiscRepr::RouterAdvert { flags, router_lifetime, lladdr, prefix_info, .. } =>
                self.router_advertised(ip.src_addr, flags, router_lifetime, lladdr, prefix_info),
        }
    }

    fn solicited(&self, src_addr: Ipv6Address, target_addr: Ipv6Address, lladdr: EthernetAddress) {
        // A probe for a tentative address teaches nothing.
        if !src_addr.is_unspecified() {
            self.learn(src_addr, lladdr);
        }

        if !self.serves(target_addr) {
            return;
        }

        let mut flags = NdiscNeighborFlags::SOLICITED | NdiscNeighborFlags::OVERRIDE;
        if self.config.is_router() {
            flags |= NdiscNeighborFlags::ROUTER;
        }

        let dst_addr = if src_addr.is_unspecified() {
            flags.remove(NdiscNeighborFlags::SOLICITED);
            Ipv6Address::LINK_LOCAL_ALL_NODES
        } else {
            src_addr
        };

        net_debug!("ip6: {} is at {}, telling {}", target_addr, self.eth.address(), dst_addr);
        let advert = NdiscRepr::NeighborAdvert {
            flags,
            target_addr,
            lladdr: Some(self.eth.address()),
        };
        if let Err(err) = self.send_ndisc(target_addr, dst_addr, advert) {
            net_warn!("ip6: advertising {} failed: {}", target_addr, err);
        }
    }

    fn advertised(&self, repr: NdiscRepr, target_addr: Ipv6Address, lladdr: Option<EthernetAddress>) {
        if let Some(lladdr) = lladdr {
            self.learn(target_addr, lladdr);
        }

        let mut state = self.lock();
        if state.phase == Phase::DadPending && state.addresses[0].address() == target_addr {
            state.last_advert = Some(repr);
            self.changed.notify_all();
        }
    }

    fn router_solicited(&self, src_addr: Ipv6Address, lladdr: Option<EthernetAddress>) {
        let router = match self.config.router {
            Some(router) => router,
            None => return,
        };

        if let Some(lladdr) = lladdr {
            self.learn(src_addr, lladdr);
        }

        let (link_local, primary) = {
            let state = self.lock();
            if state.phase != Phase::Configured {
                net_debug!("ip6: not advertising before configuration is done");
                return;
            }
            (state.link_local, state.addresses[0])
        };

        let dst_addr = if src_addr.is_unspecified() {
            Ipv6Address::LINK_LOCAL_ALL_NODES
        } else {
            src_addr
        };

        net_debug!("ip6: advertising prefix of {} to {}", primary, dst_addr);
        let advert = self.router_advert(&router, primary);
        if let Err(err) = self.send_ndisc(link_local, dst_addr, advert) {
            net_warn!("ip6: router advertisement to {} failed: {}", dst_addr, err);
        }
    }

    fn router_advert(&self, router: &RouterConfig, primary: Ipv6Cidr) -> NdiscRepr {
        let prefix_len = primary.prefix_len();
        NdiscRepr::RouterAdvert {
            hop_limit: router.hop_limit,
            flags: router.flags - NdiscRouterFlags::MANAGED,
            router_lifetime: router.router_lifetime,
            reachable_time: router.reachable_time,
            retrans_time: router.retrans_time,
            lladdr: Some(self.eth.address()),
            mtu: None,
            prefix_info: Some(NdiscPrefixInformation {
                prefix_len,
                flags: router.prefix_flags,
                valid_lifetime: router.valid_lifetime,
                preferred_lifetime: router.preferred_lifetime,
                prefix: primary.address().mask(prefix_len),
            }),
        }
    }

    fn router_advertised(
        &self,
        src_addr: Ipv6Address,
        flags: NdiscRouterFlags,
        router_lifetime: u16,
        lladdr: Option<EthernetAddress>,
        prefix_info: Option<NdiscPrefixInformation>,
    ) {
        if let Some(lladdr) = lladdr {
            self.learn(src_addr, lladdr);
        }

        let mut state = self.lock();
        if !state.awaiting_router {
            return;
        }

        if flags.contains(NdiscRouterFlags::MANAGED) {
            net_debug!("ip6: router {} demands managed configuration, ignored", src_addr);
            return;
        }

        let info = match prefix_info {
            Some(info) => info,
            None => {
                net_debug!("ip6: router {} advertised no prefix", src_addr);
                return;
            },
        };

        if !is_global_prefix(info.prefix) {
            net_debug!("ip6: router {} advertised unusable prefix {}", src_addr, info.prefix);
            return;
        }

        let global = state.addresses[0].address().with_prefix(info.prefix, info.prefix_len);
        if !global.is_unicast() || global.is_link_local() {
            net_debug!("ip6: prefix {}/{} of router {} yields no global address {}",
                info.prefix, info.prefix_len, src_addr, global);
            return;
        }

        let cidr = Ipv6Cidr::new(global, info.prefix_len);
        self.join_solicited(global);
        state.addresses[0] = cidr;

        {
            let mut routes = self.write_routes();
            let prefix = Ipv6Cidr::new(info.prefix.mask(info.prefix_len), info.prefix_len);
            routes.add(Route::direct(IpCidr::Ipv6(prefix), OWN_INDEX));
            if router_lifetime > 0 {
                routes.set_default_route(Route::gateway(IpAddress::Ipv6(src_addr), OWN_INDEX));
            }
        }

        state.phase = Phase::Configured;
        state.awaiting_router = false;
        net_debug!("ip6: configured {} from router {}", cidr, src_addr);
        self.changed.notify_all();
    }

    /// Check if neighbor solicitations for the address are answered.
    fn serves(&self, addr: Ipv6Address) -> bool {
        let state = self.lock();
        match state.phase {
            Phase::Unconfigured | Phase::DadPending | Phase::DuplicateDetected => false,
            Phase::RouterSolicitPending | Phase::Configured => state.owns(addr),
        }
    }

    fn accepts(&self, dst_addr: Ipv6Address) -> bool {
        if dst_addr == Ipv6Address::LINK_LOCAL_ALL_NODES {
            return true;
        }
        if dst_addr == Ipv6Address::LINK_LOCAL_ALL_ROUTERS {
            return self.config.is_router();
        }

        let state = self.lock();
        if dst_addr.is_multicast() {
            state.own_addresses().any(|addr| addr.solicited_node_multicast() == dst_addr)
        } else {
            state.owns(dst_addr)
        }
    }

    fn learn(&self, addr: Ipv6Address, lladdr: EthernetAddress) {
        if !addr.is_unicast() || !lladdr.is_unicast() {
            return;
        }

        if let Err(err) = self.lock_neighbors().fill(IpAddress::Ipv6(addr), lladdr, Some(Instant::now())) {
            net_debug!("ip6: could not remember {} at {}: {}", addr, lladdr, err);
        }
    }

    fn join_solicited(&self, addr: Ipv6Address) {
        self.eth.join(EthernetAddress::ipv6_multicast(addr.solicited_node_multicast()));
    }

    /// Ask the link for the hardware address of a neighbor.
    fn solicit(&self, target_addr: Ipv6Address) {
        let src_addr = self.lock().addresses[0].address();
        net_debug!("ip6: who has {}? tell {}", target_addr, src_addr);
        let solicit = NdiscRepr::NeighborSolicit {
            target_addr,
            lladdr: Some(self.eth.address()),
        };
        if let Err(err) = self.send_ndisc(src_addr, target_addr.solicited_node_multicast(), solicit) {
            net_warn!("ip6: soliciting {} failed: {}", target_addr, err);
        }
    }

    fn send_ndisc(&self, src_addr: Ipv6Address, dst_addr: Ipv6Address, repr: NdiscRepr)
        -> Result<()>
    {
        let mut payload = vec![0; repr.buffer_len()];
        repr.emit(icmpv6_packet::new_unchecked_mut(&mut payload), src_addr, dst_addr);
        let packet = build_packet(&Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: IpProtocol::Icmpv6,
            payload_len: payload.len(),
            hop_limit: NDISC_HOP_LIMIT,
        }, &payload);
        self.transmit(dst_addr, &packet)
    }

    /// Address the packet on the link, send it and show it to the observers.
    fn transmit(&self, dst_addr: Ipv6Address, packet: &[u8]) -> Result<()> {
        let hardware_addr = if dst_addr.is_multicast() {
            EthernetAddress::ipv6_multicast(dst_addr)
        } else {
            self.resolve(dst_addr)
        };

        self.eth.send(eth::Out {
            src_addr: None,
            dst_addr: hardware_addr,
            ethertype: EthernetProtocol::Ipv6,
            payload: packet.to_vec(),
        })?;

        self.observe(ipv6_packet::new_unchecked(packet));
        Ok(())
    }

    /// The hardware address of the next hop, broadcast if it is unknown.
    fn resolve(&self, dst_addr: Ipv6Address) -> EthernetAddress {
        let next_hop = match self.routes().next_hop(IpAddress::Ipv6(dst_addr)) {
            Some(IpAddress::Ipv6(next_hop)) => next_hop,
            _ => dst_addr,
        };

        let answer = self.lock_neighbors().lookup(&IpAddress::Ipv6(next_hop), Instant::now());
        match answer {
            Answer::Found(hardware_addr) => hardware_addr,
            Answer::NotFound => {
                self.solicit(next_hop);
                EthernetAddress::BROADCAST
            },
            Answer::RateLimited => {
                net_trace!("ip6: {} still unknown, broadcasting", next_hop);
                EthernetAddress::BROADCAST
            },
        }
    }

    fn observe(&self, packet: &ipv6_packet) {
        let observers: Vec<_> = self.observers.read()
            .unwrap_or_else(|poison| poison.into_inner())
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in observers {
            deliver("ip6 observer", packet.next_header(), &*handler, packet);
        }
    }

    fn wait_while<'a, F>(&self, state: MutexGuard<'a, State>, timeout: Duration, condition: F)
        -> MutexGuard<'a, State>
        where F: FnMut(&mut State) -> bool
    {
        self.changed.wait_timeout_while(state, timeout, condition)
            .map(|(state, _)| state)
            .unwrap_or_else(|poison| poison.into_inner().0)
    }

    fn lock(&self) -> MutexGuard<State> {
        self.state.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_neighbors(&self) -> MutexGuard<NeighborCache> {
        self.neighbors.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    fn write_routes(&self) -> RwLockWriteGuard<Routes> {
        self.routes.write().unwrap_or_else(|poison| poison.into_inner())
    }

    fn unregister_from_eth(&self) {
        let handle = self.handle.lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .take();
        if let Some(handle) = handle {
            self.eth.unregister_handle(handle);
        }
    }
}

impl State {
    fn own_addresses(&self) -> impl Iterator<Item=Ipv6Address> + '_ {
        iter::once(self.link_local)
            .chain(self.addresses.iter().map(|cidr| cidr.address()))
    }

    fn owns(&self, addr: Ipv6Address) -> bool {
        self.own_addresses().any(|own| own == addr)
    }
}

impl Layer for Interface {
    type Key = IpProtocol;
    type Packet = ipv6_packet;
    type Address = Ipv6Address;
    type Out = Out;

    fn demux(&self) -> &Demux<IpProtocol, ipv6_packet> {
        &self.demux
    }

    /// The primary address.
    fn address(&self) -> Ipv6Address {
        self.lock().addresses[0].address()
    }

    /// Queue a packet for sending.
    ///
    /// Returns as soon as the packet is handed to a sending thread, resolution of the next hop
    /// happens there. Packets sent in sequence may leave the interface in another order.
    fn send(&self, packet: Out) -> Result<()> {
        let src_addr = {
            let state = self.lock();
            if state.closed {
                return Err(Error::Closed);
            }
            if state.phase == Phase::DuplicateDetected {
                return Err(Error::DuplicateAddress(state.addresses[0].address()));
            }
            packet.src_addr.unwrap_or_else(|| state.addresses[0].address())
        };

        if packet.payload.len() > usize::from(u16::MAX) {
            return Err(Error::BadSize);
        }

        if packet.dst_addr.is_unspecified() {
            net_debug!("ip6: refused to send to the unspecified address");
            return Err(Error::Illegal);
        }

        let dst_addr = packet.dst_addr;
        let buffer = build_packet(&Ipv6Repr {
            src_addr,
            dst_addr,
            next_header: packet.next_header,
            payload_len: packet.payload.len(),
            hop_limit: packet.hop_limit,
        }, &packet.payload);

        let iface = self.this.upgrade().ok_or(Error::Closed)?;
        thread::Builder::new()
            .name("ip6-send".into())
            .spawn(move || {
                if let Err(err) = iface.transmit(dst_addr, &buffer) {
                    net_warn!("ip6: sending to {} failed: {}", dst_addr, err);
                }
            })
            .map_err(|_| Error::Exhausted)?;
        Ok(())
    }

    /// Detach from the ethernet layer and drop all handlers and observers.
    ///
    /// Pending configuration fails with `Error::Closed`, as does every later send.
    fn close(&self) {
        {
            let mut state = self.lock();
            state.closed = true;
            state.awaiting_router = false;
            self.changed.notify_all();
        }

        self.unregister_from_eth();
        self.observers.write()
            .unwrap_or_else(|poison| poison.into_inner())
            .clear();
        self.demux.clear();
        net_debug!("ip6: closed interface on {}", self.eth.address());
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        self.unregister_from_eth();
    }
}

/// The modified EUI-64 link-local address of a hardware address.
///
/// ```
/// use ipstack::layer::ip6::link_local_address;
/// use ipstack::wire::{EthernetAddress, Ipv6Address};
///
/// let mac = EthernetAddress([0x8c, 0x85, 0x90, 0xa5, 0x09, 0x60]);
/// assert_eq!(link_local_address(mac),
///     Ipv6Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960));
/// ```
pub fn link_local_address(addr: EthernetAddress) -> Ipv6Address {
    Ipv6Address::from_link_local_id(InterfaceId::from_vendor_ether(addr))
}

/// A prefix autoconfiguration may form a global address from.
fn is_global_prefix(prefix: Ipv6Address) -> bool {
    !prefix.is_multicast() && !prefix.is_unspecified() && !prefix.is_link_local()
}

fn build_packet(repr: &Ipv6Repr, payload: &[u8]) -> Vec<u8> {
    let mut buffer = vec![0; ipv6_packet::buffer_len(payload.len())];
    let packet = ipv6_packet::new_unchecked_mut(&mut buffer);
    repr.emit(packet);
    packet.payload_mut_slice().copy_from_slice(payload);
    buffer
}
