use crate::time::Duration;
use crate::wire::{NdiscPrefixInfoFlags, NdiscRouterFlags};

/// Timing and role of an IPv6 [`Interface`].
///
/// [`Interface`]: struct.Interface.html
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// How long a learned neighbor stays valid.
    pub neighbor_lifetime: Duration,
    /// The most neighbors remembered at once.
    pub neighbor_capacity: usize,
    /// Number of intervals to wait for a conflicting advertisement.
    pub dad_attempts: u32,
    /// Length of one duplicate address detection interval.
    pub dad_interval: Duration,
    /// Period at which a pending router discovery is polled.
    pub router_poll_interval: Duration,
    /// Answer router solicitations with these parameters.
    ///
    /// A router does not solicit routers itself, it is configured after duplicate address
    /// detection succeeds.
    pub router: Option<RouterConfig>,
}

/// The content of the router advertisements sent in router mode.
///
/// The advertised prefix is the one of the primary address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Hop limit hosts should use.
    pub hop_limit: u8,
    /// The managed flag is always cleared before sending.
    pub flags: NdiscRouterFlags,
    /// In seconds, zero means not a default router.
    pub router_lifetime: u16,
    /// In milliseconds.
    pub reachable_time: u32,
    /// In milliseconds.
    pub retrans_time: u32,
    /// Flags of the advertised prefix.
    pub prefix_flags: NdiscPrefixInfoFlags,
    /// In seconds.
    pub valid_lifetime: u64,
    /// In seconds.
    pub preferred_lifetime: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            neighbor_lifetime: Duration::from_secs(60),
            neighbor_capacity: 1024,
            dad_attempts: 5,
            dad_interval: Duration::from_secs(1),
            router_poll_interval: Duration::from_secs(5),
            router: None,
        }
    }
}

impl Config {
    /// A configuration for router mode with default advertisement parameters.
    pub fn router() -> Self {
        Config {
            router: Some(RouterConfig::default()),
            .. Config::default()
        }
    }

    /// Check if the interface answers router solicitations.
    pub fn is_router(&self) -> bool {
        self.router.is_some()
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            hop_limit: 10,
            flags: NdiscRouterFlags::OTHER,
            router_lifetime: 10000,
            reachable_time: 10000,
            retrans_time: 10000,
            prefix_flags: NdiscPrefixInfoFlags::ON_LINK | NdiscPrefixInfoFlags::ADDRCONF,
            valid_lifetime: 99999,
            preferred_lifetime: 99999,
        }
    }
}
