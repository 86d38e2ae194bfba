use core::fmt;
use bitflags::bitflags;

use super::{Error, Result, EthernetAddress, Ipv6Address};
use super::icmpv6::{icmpv6, Message};
use super::ndiscoption::{ndisc_option, Options, PrefixInformation, Repr as NdiscOptionRepr};

bitflags! {
    /// Flags of a router advertisement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RouterFlags: u8 {
        /// Addresses are available via DHCPv6, stateless configuration must not be used.
        const MANAGED = 0b1000_0000;
        /// Other configuration is available via DHCPv6.
        const OTHER   = 0b0100_0000;
    }
}

bitflags! {
    /// Flags of a neighbor advertisement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NeighborFlags: u8 {
        /// The sender is a router.
        const ROUTER    = 0b1000_0000;
        /// The advertisement answers a solicitation.
        const SOLICITED = 0b0100_0000;
        /// The advertisement should replace an existing cache entry.
        const OVERRIDE  = 0b0010_0000;
    }
}

/// A high-level representation of a Neighbor Discovery packet header.
///
/// See [RFC 4861 § 4] for the message formats. Options that are not relevant for a message or not
/// understood are skipped while parsing.
///
/// [RFC 4861 § 4]: https://tools.ietf.org/html/rfc4861#section-4
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Repr {
    RouterSolicit {
        lladdr: Option<EthernetAddress>,
    },
    RouterAdvert {
        hop_limit: u8,
        flags: RouterFlags,
        /// Lifetime as default router, in seconds.
        router_lifetime: u16,
        /// In milliseconds.
        reachable_time: u32,
        /// In milliseconds.
        retrans_time: u32,
        lladdr: Option<EthernetAddress>,
        mtu: Option<u32>,
        prefix_info: Option<PrefixInformation>,
    },
    NeighborSolicit {
        target_addr: Ipv6Address,
        lladdr: Option<EthernetAddress>,
    },
    NeighborAdvert {
        flags: NeighborFlags,
        target_addr: Ipv6Address,
        lladdr: Option<EthernetAddress>,
    },
}

impl Repr {
    /// Parse an NDISC packet and return a high-level representation of the packet.
    ///
    /// The checksum is verified against the pseudo header formed from the enclosing IPv6 source
    /// and destination address.
    pub fn parse(packet: &icmpv6, src_addr: Ipv6Address, dst_addr: Ipv6Address) -> Result<Repr> {
        packet.check_len()?;
        if !packet.msg_type().is_ndisc() {
            return Err(Error::Unrecognized);
        }
        if !packet.verify_checksum(src_addr, dst_addr) {
            return Err(Error::WrongChecksum);
        }
        if packet.msg_code() != 0 {
            return Err(Error::Malformed);
        }

        let mut lladdr = None;
        let mut mtu = None;
        let mut prefix_info = None;
        for opt in Options::new(packet.options()) {
            match NdiscOptionRepr::parse(opt?)? {
                NdiscOptionRepr::SourceLinkLayerAddr(addr) => match packet.msg_type() {
                    Message::NeighborAdvert => (),
                    _ => lladdr = Some(addr),
                },
                NdiscOptionRepr::TargetLinkLayerAddr(addr) => match packet.msg_type() {
                    Message::NeighborAdvert => lladdr = Some(addr),
                    _ => (),
                },
                NdiscOptionRepr::Mtu(val) => mtu = Some(val),
                // Only the first prefix is of interest.
                NdiscOptionRepr::PrefixInformation(info) => if prefix_info.is_none() {
                    prefix_info = Some(info);
                },
                NdiscOptionRepr::Unknown { .. } => (),
            }
        }

        match packet.msg_type() {
            Message::RouterSolicit => Ok(Repr::RouterSolicit { lladdr }),
            Message::RouterAdvert => Ok(Repr::RouterAdvert {
                hop_limit: packet.current_hop_limit(),
                flags: RouterFlags::from_bits_truncate(packet.router_flags()),
                router_lifetime: packet.router_lifetime(),
                reachable_time: packet.reachable_time(),
                retrans_time: packet.retrans_time(),
                lladdr,
                mtu,
                prefix_info,
            }),
            Message::NeighborSolicit => {
                let target_addr = packet.target_addr();
                if target_addr.is_multicast() {
                    return Err(Error::Malformed);
                }
                Ok(Repr::NeighborSolicit { target_addr, lladdr })
            },
            Message::NeighborAdvert => {
                let target_addr = packet.target_addr();
                if target_addr.is_multicast() {
                    return Err(Error::Malformed);
                }
                Ok(Repr::NeighborAdvert {
                    flags: NeighborFlags::from_bits_truncate(packet.neighbor_flags()),
                    target_addr,
                    lladdr,
                })
            },
            _ => Err(Error::Unrecognized),
        }
    }

    /// The ICMPv6 message type of this representation.
    pub fn msg_type(&self) -> Message {
        match self {
            Repr::RouterSolicit { .. } => Message::RouterSolicit,
            Repr::RouterAdvert { .. } => Message::RouterAdvert,
            Repr::NeighborSolicit { .. } => Message::NeighborSolicit,
            Repr::NeighborAdvert { .. } => Message::NeighborAdvert,
        }
    }

    fn options(&self) -> impl Iterator<Item=NdiscOptionRepr> {
        let (lladdr, mtu, prefix_info) = match *self {
            Repr::RouterSolicit { lladdr } =>
                (lladdr.map(NdiscOptionRepr::SourceLinkLayerAddr), None, None),
            Repr::RouterAdvert { lladdr, mtu, prefix_info, .. } => (
                lladdr.map(NdiscOptionRepr::SourceLinkLayerAddr),
                mtu.map(NdiscOptionRepr::Mtu),
                prefix_info.map(NdiscOptionRepr::PrefixInformation),
            ),
            Repr::NeighborSolicit { lladdr, .. } =>
                (lladdr.map(NdiscOptionRepr::SourceLinkLayerAddr), None, None),
            Repr::NeighborAdvert { lladdr, .. } =>
                (lladdr.map(NdiscOptionRepr::TargetLinkLayerAddr), None, None),
        };

        lladdr.into_iter()
            .chain(mtu)
            .chain(prefix_info)
    }

    /// Return the length of a packet that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        let header = match self {
            Repr::RouterSolicit { .. } => 8,
            Repr::RouterAdvert { .. } => 16,
            Repr::NeighborSolicit { .. } | Repr::NeighborAdvert { .. } => 24,
        };

        header + self.options()
            .map(|opt| opt.buffer_len())
            .sum::<usize>()
    }

    /// Emit a high-level representation into an NDISC packet and fill in its checksum.
    ///
    /// # Panics
    /// This function panics if the buffer is shorter than [`buffer_len`]. The checksum covers the
    /// whole buffer, so it should have exactly that length.
    ///
    /// [`buffer_len`]: #method.buffer_len
    pub fn emit(&self, packet: &mut icmpv6, src_addr: Ipv6Address, dst_addr: Ipv6Address) {
        packet.set_msg_type(self.msg_type());
        packet.set_msg_code(0);
        packet.clear_reserved();

        match *self {
            Repr::RouterSolicit { .. } => (),
            Repr::RouterAdvert {
                hop_limit, flags, router_lifetime, reachable_time, retrans_time, ..
            } => {
                packet.set_current_hop_limit(hop_limit);
                packet.set_router_flags(flags.bits());
                packet.set_router_lifetime(router_lifetime);
                packet.set_reachable_time(reachable_time);
                packet.set_retrans_time(retrans_time);
            },
            Repr::NeighborSolicit { target_addr, .. } => {
                packet.set_target_addr(target_addr);
            },
            Repr::NeighborAdvert { flags, target_addr, .. } => {
                packet.set_neighbor_flags(flags.bits());
                packet.set_target_addr(target_addr);
            },
        }

        let mut offset = 0;
        for opt in self.options() {
            let len = opt.buffer_len();
            let buffer = &mut packet.options_mut()[offset..offset + len];
            opt.emit(ndisc_option::new_unchecked_mut(buffer));
            offset += len;
        }

        packet.fill_checksum(src_addr, dst_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Repr::RouterSolicit { .. } => write!(f, "RS"),
            Repr::RouterAdvert { flags, prefix_info, .. } => {
                write!(f, "RA flags={:?}", flags)?;
                if let Some(info) = prefix_info {
                    write!(f, " prefix={}/{}", info.prefix, info.prefix_len)?;
                }
                Ok(())
            },
            Repr::NeighborSolicit { target_addr, .. } => write!(f, "NS target={}", target_addr),
            Repr::NeighborAdvert { target_addr, lladdr, .. } => match lladdr {
                Some(lladdr) => write!(f, "NA target={} lladdr={}", target_addr, lladdr),
                None => write!(f, "NA target={}", target_addr),
            },
        }
    }
}
