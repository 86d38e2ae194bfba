// Heads up! Before working on this file you should read, at least,
// the parts of RFC 1122 that discuss ARP and RFC 4861 § 7.3 on neighbor reachability.
use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::layer::{Error, Result};
use crate::time::{Duration, Expiration, Instant};
use crate::wire::{EthernetAddress, IpAddress};

/// A cached neighbor.
///
/// A neighbor mapping translates from a protocol address (IPv4 and IPv6) to a hardware address,
/// and contains the timestamp past which the mapping should be considered invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Neighbor {
    protocol_addr: IpAddress,
    hardware_addr: EthernetAddress,
    expires_at:    Expiration,
}

/// An answer to a neighbor cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    /// The neighbor address is in the cache and not expired.
    Found(EthernetAddress),
    /// The neighbor address is not in the cache, or has expired.
    NotFound,
    /// The neighbor address is not in the cache, or has expired,
    /// and a lookup has been made recently.
    RateLimited,
}

/// A neighbor cache backed by a map.
///
/// Shared between the receive path, which learns mappings from observed traffic, and the send
/// path which looks them up. Owners wrap it in a lock.
///
/// # Examples
///
/// ```rust
/// use ipstack::layer::eth::{Answer, NeighborCache};
/// use ipstack::time::Instant;
/// use ipstack::wire::{EthernetAddress, IpAddress};
///
/// let mut cache = NeighborCache::default();
/// let addr = IpAddress::v4(192, 168, 1, 1);
/// let hw = EthernetAddress([0x02, 0, 0, 0, 0, 1]);
///
/// assert_eq!(cache.lookup(&addr, Instant::from_secs(0)), Answer::NotFound);
/// cache.fill(addr, hw, Some(Instant::from_secs(0))).unwrap();
/// assert_eq!(cache.lookup(&addr, Instant::from_secs(1)), Answer::Found(hw));
/// ```
#[derive(Debug, Clone)]
pub struct NeighborCache {
    storage:  BTreeMap<IpAddress, Neighbor>,
    capacity: Option<usize>,
    lifetime: Duration,
    /// Missing addresses solicited recently, with the end of their silent period.
    silent:   BTreeMap<IpAddress, Instant>,
}

impl NeighborCache {
    /// Minimum delay between discovery requests, in milliseconds.
    pub(crate) const SILENT_TIME: Duration = Duration::from_millis(1_000);

    /// Neighbor entry lifetime, in milliseconds.
    pub(crate) const ENTRY_LIFETIME: Duration = Duration::from_millis(60_000);

    /// Create an unbounded cache whose entries live for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        NeighborCache {
            storage: BTreeMap::new(),
            capacity: None,
            lifetime,
            silent: BTreeMap::new(),
        }
    }

    /// Create a cache holding at most `capacity` entries.
    ///
    /// When full, expired entries are dropped first. Otherwise a new entry evicts the one expiring
    /// soonest.
    pub fn with_capacity(lifetime: Duration, capacity: usize) -> Self {
        NeighborCache {
            capacity: Some(capacity),
            .. NeighborCache::new(lifetime)
        }
    }

    /// The lifetime of new entries.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Add an entry containing a MAC address, or refresh an existing one.
    ///
    /// Provide the current timestamp or `None` to disable expiration. Fails with
    /// `Error::Exhausted` when the cache is full and every entry lives longer than the new one.
    pub fn fill(
        &mut self,
        protocol_addr: IpAddress,
        hardware_addr: EthernetAddress,
        timestamp: Option<Instant>,
    ) -> Result<()> {
        debug_assert!(protocol_addr.is_unicast());

        let lifetime = self.lifetime;
        let new_neighbor = Neighbor {
            protocol_addr,
            hardware_addr,
            expires_at: timestamp.map(|ts| ts + lifetime).into(),
        };

        self.silent.remove(&protocol_addr);

        if let Some(old) = self.storage.get_mut(&protocol_addr) {
            net_trace!("neighbor: refreshed entry {}: {} - expiry: {:?}",
                protocol_addr, hardware_addr, new_neighbor.expires_at);
            *old = new_neighbor;
            return Ok(());
        }

        match self.capacity {
            Some(0) => return Err(Error::Exhausted),
            Some(capacity) if self.storage.len() >= capacity => {
                if let Some(timestamp) = timestamp {
                    self.flush(timestamp);
                }
            },
            _ => (),
        }

        match self.capacity {
            Some(capacity) if self.storage.len() >= capacity => {
                // Find the entry expiring soonest.
                let oldest = self.storage.values()
                    .min_by_key(|neighbor| neighbor.expires_at)
                    .copied()
                    .ok_or(Error::Exhausted)?;
                if oldest.expires_at > new_neighbor.expires_at {
                    return Err(Error::Exhausted);
                }
                net_trace!("neighbor: evicted {}", oldest.protocol_addr);
                self.storage.remove(&oldest.protocol_addr);
            },
            _ => (),
        }

        self.storage.insert(protocol_addr, new_neighbor);
        Ok(())
    }

    /// Look up an address, rate limiting the misses.
    ///
    /// A `NotFound` answer means the caller should solicit the address now. Further misses of the
    /// same address within one second of it answer `RateLimited` instead.
    pub fn lookup(&mut self, protocol_addr: &IpAddress, timestamp: Instant) -> Answer {
        if let Some(hardware_addr) = self.lookup_pure(protocol_addr, timestamp) {
            return Answer::Found(hardware_addr);
        }

        self.silent.retain(|_, until| timestamp < *until);
        if self.silent.contains_key(protocol_addr) {
            return Answer::RateLimited;
        }

        self.silent.insert(*protocol_addr, timestamp + Self::SILENT_TIME);
        Answer::NotFound
    }

    /// Look up an address without affecting the rate limit.
    pub fn lookup_pure(
        &self,
        protocol_addr: &IpAddress,
        timestamp: Instant,
    ) -> Option<EthernetAddress> {
        if let IpAddress::Ipv4(addr) = protocol_addr {
            if addr.is_broadcast() {
                return Some(EthernetAddress::BROADCAST);
            }
        }

        let entry = self.storage.get(protocol_addr)?;
        if Expiration::When(timestamp) >= entry.expires_at {
            return None;
        }

        Some(entry.hardware_addr)
    }

    /// Remove the entry of an address.
    pub fn remove(&mut self, protocol_addr: &IpAddress) -> Option<Neighbor> {
        self.storage.remove(protocol_addr)
    }

    /// Drop all entries expired at `timestamp`.
    pub fn flush(&mut self, timestamp: Instant) {
        self.storage.retain(|_, neighbor| neighbor.is_alive(timestamp));
    }

    /// The number of entries, including expired ones not yet flushed.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Iterate over all entries ordered by protocol address.
    pub fn iter(&self) -> btree_map::Values<IpAddress, Neighbor> {
        self.storage.values()
    }
}

impl Default for NeighborCache {
    fn default() -> Self {
        NeighborCache::new(Self::ENTRY_LIFETIME)
    }
}

impl Neighbor {
    /// The protocol address of the neighbor.
    pub fn protocol_addr(&self) -> IpAddress {
        self.protocol_addr
    }

    /// Its link layer address.
    pub fn hardware_addr(&self) -> EthernetAddress {
        self.hardware_addr
    }

    /// When the mapping becomes invalid.
    pub fn expires_at(&self) -> Expiration {
        self.expires_at
    }

    /// If the entry can still be used at `ts`.
    pub fn is_alive(&self, ts: Instant) -> bool {
        Expiration::When(ts) < self.expires_at
    }

    /// If the entry is no longer valid at `ts`.
    pub fn is_expired(&self, ts: Instant) -> bool {
        !self.is_alive(ts)
    }
}
