//! The IP routing table.
//!
//! Abstract a way to find the next hop for a destination. The table is a pure lookup structure,
//! it performs no forwarding itself. The sending layer asks it for the route of a destination and
//! resolves the next hop of that route on the link.
//!
//! Unlike most operating systems, the lookup is *first match* rather than longest match: routes
//! are tried in table order and the first whose destination contains the address wins. Only
//! when none does is the default route used.
mod route;

pub use route::{
    IfIndex,
    Route,
    Routes,
};
