//! CIDR, relevant rfc1519, rfc4632.
//!
use core::fmt;

use crate::layer::{Error, Result};
use crate::wire::{IpAddress, IpCidr};

/// Identifies the output interface of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IfIndex(pub u32);

/// A prefix of addresses that should be routed via a router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Route {
    /// The network routed through this route.
    ///
    /// `None` matches every address, it is used for the default route.
    pub dest: Option<IpCidr>,

    /// Next hop for this network.
    ///
    /// `None` for directly attached networks, the destination itself is the next hop then.
    pub next_hop: Option<IpAddress>,

    /// The interface to send on.
    pub interface: IfIndex,
}

impl Route {
    /// A route to a directly attached network.
    pub fn direct(dest: IpCidr, interface: IfIndex) -> Self {
        Route {
            dest: Some(dest),
            next_hop: None,
            interface,
        }
    }

    /// A route to a network behind a router.
    pub fn via(dest: IpCidr, next_hop: IpAddress, interface: IfIndex) -> Self {
        Route {
            dest: Some(dest),
            next_hop: Some(next_hop),
            interface,
        }
    }

    /// A default route via the `gateway`.
    pub fn gateway(gateway: IpAddress, interface: IfIndex) -> Self {
        Route {
            dest: None,
            next_hop: Some(gateway),
            interface,
        }
    }

    /// Check if the route applies to a destination.
    pub fn matches(&self, dst_addr: IpAddress) -> bool {
        match self.dest {
            Some(cidr) => cidr.contains(dst_addr),
            None => true,
        }
    }

    /// The address to resolve on the link for a packet to `dst_addr`.
    pub fn next_hop_for(&self, dst_addr: IpAddress) -> IpAddress {
        self.next_hop.unwrap_or(dst_addr)
    }
}

impl fmt::Display for IfIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.dest {
            Some(dest) => write!(f, "{}", dest)?,
            None => write!(f, "default")?,
        }
        match self.next_hop {
            Some(next_hop) => write!(f, "\t{}", next_hop)?,
            None => write!(f, "\t-")?,
        }
        write!(f, "\t{}", self.interface)
    }
}

/// A routing table.
///
/// An ordered list of routes plus at most one default route. Lookup picks the *first* route in
/// table order whose destination contains the address, not the longest match, so the order of
/// insertion determines precedence.
///
/// # Examples
///
/// ```rust
/// use ipstack::layer::ip::{IfIndex, Route, Routes};
/// use ipstack::wire::{IpAddress, IpCidr};
///
/// let mut routes = Routes::new();
/// routes.add(Route::direct(IpCidr::new(IpAddress::v4(192, 168, 1, 0), 24), IfIndex(0)));
/// routes.set_default_gateway(IpAddress::v4(192, 168, 1, 1)).unwrap();
///
/// let route = routes.get_route(IpAddress::v4(10, 0, 0, 1)).unwrap();
/// assert_eq!(route.next_hop_for(IpAddress::v4(10, 0, 0, 1)), IpAddress::v4(192, 168, 1, 1));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Routes {
    storage: Vec<Route>,
    default: Option<Route>,
}

impl Routes {
    /// Creates an empty routing table.
    pub fn new() -> Self {
        Routes::default()
    }

    /// Append a route.
    pub fn add(&mut self, route: Route) {
        self.storage.push(route);
    }

    /// Append a route to `dest` via a router.
    ///
    /// The output interface is the one of the route currently used for `next_hop`, fails with
    /// `Error::Unreachable` if there is none.
    pub fn add_via(&mut self, dest: IpCidr, next_hop: IpAddress) -> Result<()> {
        let interface = self.interface_for(next_hop)?;
        self.add(Route::via(dest, next_hop, interface));
        Ok(())
    }

    /// Insert a route at a position of the table.
    ///
    /// Fails with `Error::BadSize` if the index is past the end.
    pub fn insert(&mut self, index: usize, route: Route) -> Result<()> {
        if index > self.storage.len() {
            return Err(Error::BadSize);
        }
        self.storage.insert(index, route);
        Ok(())
    }

    /// Remove the first route to exactly this destination.
    pub fn remove(&mut self, dest: IpCidr) -> Option<Route> {
        let index = self.storage.iter()
            .position(|route| route.dest == Some(dest))?;
        Some(self.storage.remove(index))
    }

    /// Remove the route at a position of the table.
    pub fn remove_at(&mut self, index: usize) -> Option<Route> {
        if index < self.storage.len() {
            Some(self.storage.remove(index))
        } else {
            None
        }
    }

    /// Remove all routes, the default route stays.
    pub fn remove_all(&mut self) {
        self.storage.clear();
    }

    /// The routes in table order, without the default route.
    pub fn iter(&self) -> core::slice::Iter<Route> {
        self.storage.iter()
    }

    /// The number of routes, without the default route.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the table holds no routes besides the default.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Replace the default route, returning the previous one.
    ///
    /// The destination of the route is ignored.
    pub fn set_default_route(&mut self, route: Route) -> Option<Route> {
        self.default.replace(Route { dest: None, .. route })
    }

    /// Remove the default route.
    pub fn clear_default_route(&mut self) -> Option<Route> {
        self.default.take()
    }

    /// Set a default gateway (ie. "ip route add default via `gateway`").
    ///
    /// The output interface is derived as in [`add_via`]. On success, returns the previous default
    /// route, if any.
    ///
    /// [`add_via`]: #method.add_via
    pub fn set_default_gateway(&mut self, gateway: IpAddress) -> Result<Option<Route>> {
        let interface = self.interface_for(gateway)?;
        Ok(self.set_default_route(Route::gateway(gateway, interface)))
    }

    /// The current default route.
    pub fn default_route(&self) -> Option<&Route> {
        self.default.as_ref()
    }

    /// Find the route for a destination.
    ///
    /// The first matching route in table order, else the default route.
    pub fn get_route(&self, dst_addr: IpAddress) -> Option<&Route> {
        self.storage.iter()
            .find(|route| route.matches(dst_addr))
            .or(self.default.as_ref())
    }

    /// The next hop towards a destination, if it is routable at all.
    pub fn next_hop(&self, dst_addr: IpAddress) -> Option<IpAddress> {
        self.get_route(dst_addr).map(|route| route.next_hop_for(dst_addr))
    }

    fn interface_for(&self, next_hop: IpAddress) -> Result<IfIndex> {
        match self.get_route(next_hop) {
            Some(route) => Ok(route.interface),
            None => {
                net_debug!("routes: no route towards next hop {}", next_hop);
                Err(Error::Unreachable)
            },
        }
    }
}

impl fmt::Display for Routes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "destination\tnext-hop\tinterface")?;
        for route in self.storage.iter() {
            writeln!(f, "{}", route)?;
        }
        if let Some(default) = &self.default {
            writeln!(f, "{}", default)?;
        }
        Ok(())
    }
}
