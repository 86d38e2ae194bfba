/*! Low-level packet access and construction.

# An overview over packet representations

The `wire` module deals with the packet *representation*. It provides two levels of
functionality.

 * First, it provides functions to extract fields from sequences of octets, and to insert fields
   into sequences of octets. This happens in the lowercase structures e.g. [`ethernet_frame`] or
   [`icmpv6_packet`].
 * Second, it provides a compact, high-level representation of header data that can be created
   from parsing and emitted into a sequence of octets. This happens through the `Repr` family of
   structs and enums, e.g. [`ArpRepr`] or [`NdiscRepr`].

[`ethernet_frame`]: struct.ethernet_frame.html
[`icmpv6_packet`]: struct.icmpv6_packet.html
[`ArpRepr`]: enum.ArpRepr.html
[`NdiscRepr`]: enum.NdiscRepr.html

The lowercase byte wrappers guarantee that, if their `check_len()` method returned `Ok(())`, then
no field accessor or setter method will panic. Their `new_checked` constructors are shorthands for
`new_unchecked` followed by `check_len`. When parsing untrusted input, it is *necessary* to use
either of the checked methods.

In the `Repr` family of data structures, the `Repr::parse()` method never panics and the
`Repr::emit()` method never panics as long as the underlying buffer is at least
`Repr::buffer_len()` octets long.

# Examples

To emit a neighbor solicitation into an octet buffer, and then parse it back:

```rust
use ipstack::wire::*;

let src = Ipv6Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960);
let target = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
let repr = NdiscRepr::NeighborSolicit {
    target_addr: target,
    lladdr: Some(EthernetAddress([0x8c, 0x85, 0x90, 0xa5, 0x09, 0x60])),
};
let dst = target.solicited_node_multicast();

let mut buffer = vec![0; repr.buffer_len()];
repr.emit(icmpv6_packet::new_unchecked_mut(&mut buffer), src, dst);

let packet = icmpv6_packet::new_checked(&buffer)
    .expect("truncated packet");
let parsed = NdiscRepr::parse(packet, src, dst)
    .expect("malformed packet");
assert_eq!(repr, parsed);
```
*/
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `arp.rs`
// * `error.rs`
// * `ethernet.rs`
// * `icmpv6.rs`
// * `ip.rs`
// * `ipv4.rs`
// * `ipv6.rs`
// * `mod.rs` (this file)
// * `ndiscoption.rs`
// * `ndisc.rs`
#![allow(missing_docs)]

mod field {
    pub(crate) type Field = ::core::ops::Range<usize>;
    pub(crate) type Rest  = ::core::ops::RangeFrom<usize>;
}

mod ethernet;
mod error;
mod arp;
mod ip;
mod ipv4;
mod ipv6;
mod icmpv6;
mod ndisc;
mod ndiscoption;

pub use self::ethernet::{
    ethernet as ethernet_frame,
    EtherType as EthernetProtocol,
    Address as EthernetAddress,
    Repr as EthernetRepr};

pub use self::error::{
    Error,
    Result};

pub use self::arp::{
    arp as arp_packet,
    Hardware as ArpHardware,
    Operation as ArpOperation,
    Repr as ArpRepr};

pub use self::ip::{
    Protocol as IpProtocol,
    Address as IpAddress,
    Cidr as IpCidr,
    Subnet as IpSubnet};

pub use self::ipv4::{
    Address as Ipv4Address,
    Cidr as Ipv4Cidr,
    Subnet as Ipv4Subnet};

pub use self::ipv6::{
    InterfaceId,
    ipv6 as ipv6_packet,
    Address as Ipv6Address,
    Repr as Ipv6Repr,
    Cidr as Ipv6Cidr,
    Subnet as Ipv6Subnet};

pub use self::icmpv6::{
    icmpv6 as icmpv6_packet,
    Message as Icmpv6Message};

pub use self::ndisc::{
    Repr as NdiscRepr,
    RouterFlags as NdiscRouterFlags,
    NeighborFlags as NdiscNeighborFlags};

pub use self::ndiscoption::{
    ndisc_option,
    MAX_PREFIX_LIFETIME,
    Repr as NdiscOptionRepr,
    Type as NdiscOptionType,
    PrefixInformation as NdiscPrefixInformation,
    PrefixInfoFlags as NdiscPrefixInfoFlags};
