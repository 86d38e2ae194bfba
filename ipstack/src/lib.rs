//! A layered network stack for hosts and routers on an Ethernet link.
//!
//! ## Table of contents
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//! 3. [The layers](layer/index.html)
//!    1. [Dispatch](layer/index.html#dispatch)
//!    1. [The eth layer](layer/eth/index.html)
//!    1. [The arp layer](layer/arp/index.html)
//!    1. [IPv6 and neighbor discovery](layer/ip6/index.html)
//!    1. [Routing](layer/ip/index.html)
//! 4. [Network interfaces](nic/index.html)
//!
//! ## Design and relevant core concepts
//!
//! Packets arrive as raw bytes from a [`nic::Device`], each device running its own receive
//! thread. The Ethernet layer strips the frame and hands the payload to whichever handler is
//! registered for its EtherType. The ARP layer and the IPv6 interface are such handlers, each
//! dispatching further by operation code or next header. Every layer shares the same small
//! registration contract, see [`layer::Layer`].
//!
//! The IPv6 interface embeds the neighbor discovery engine. Given only a link-layer address it
//! derives a link-local address, checks it for duplicates on the link and then waits for a router
//! to advertise a global prefix. Configured as a router it answers such solicitations itself.
//!
//! Sending never blocks on the link. Link addresses come from a [neighbor cache] which is filled
//! passively from observed traffic, and a destination missing from it is sent to the broadcast
//! address instead.
//!
//! [`nic::Device`]: nic/trait.Device.html
//! [`layer::Layer`]: layer/trait.Layer.html
//! [neighbor cache]: layer/eth/struct.NeighborCache.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

#[macro_use] mod macros;
pub mod layer;
pub mod nic;
pub mod time;
pub mod wire;
