//! The ethernet layer.
//!
//! This is tasked with decoding the framed ethernet data that the device deals with, and putting
//! upper layer data into an ethernet framing. This is conceptually and practically simply an
//! implementation of the ideas outlined in the [generic layer documentation][layer]. The state and
//! logic within the ethernet endpoint is tiny compared to other layers.
//!
//! Received frames are filtered by their destination, only frames addressed to one of the
//! addresses of the device (its own, broadcast, or joined multicast groups) are dispatched by
//! their EtherType. Traffic for other stations is only visible through a promiscuous listener,
//! and only on devices which support capturing it.
//!
//! The [`NeighborCache`] lives here as well since both address resolution protocols above
//! produce the same kind of mapping to a link address.
//!
//! [layer]: ../index.html
//! [`NeighborCache`]: struct.NeighborCache.html
mod endpoint;
mod neighbor;


pub use endpoint::{
    Endpoint,
    Out,
};

pub use neighbor::{
    Answer,
    Neighbor,
    NeighborCache,
};
