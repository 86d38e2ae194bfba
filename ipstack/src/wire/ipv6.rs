use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result, EthernetAddress};
pub use super::IpProtocol as Protocol;

/// A sixteen-octet IPv6 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 16]);

/// A 64-bit interface ID.
///
/// This is an instance of an `EUI-64` address. A universally administered IEEE 802 address or an
/// EUI-64 is signified by a 0 in the U/L bit position (the next-to-lower-order bit of the most
/// significant byte), while a globally unique IPv6 Interface Identifier is signified by a 1 in the
/// corresponding position.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct InterfaceId(pub [u8; 8]);

impl Address {
    /// The [unspecified address].
    ///
    /// [unspecified address]: https://tools.ietf.org/html/rfc4291#section-2.5.2
    pub const UNSPECIFIED: Address = Address([0x00; 16]);

    /// The link-local [all nodes multicast address].
    ///
    /// [all nodes multicast address]: https://tools.ietf.org/html/rfc4291#section-2.7.1
    pub const LINK_LOCAL_ALL_NODES: Address =
        Address([0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01]);

    /// The link-local [all routers multicast address].
    ///
    /// [all routers multicast address]: https://tools.ietf.org/html/rfc4291#section-2.7.1
    pub const LINK_LOCAL_ALL_ROUTERS: Address =
        Address([0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02]);

    /// Construct an IPv6 address from parts.
    pub fn new(
        a0: u16, a1: u16, a2: u16, a3: u16,
        a4: u16, a5: u16, a6: u16, a7: u16,
    ) -> Address {
        let mut addr = [0u8; 16];
        let parts = [a0, a1, a2, a3, a4, a5, a6, a7];
        for (chunk, part) in addr.chunks_mut(2).zip(parts.iter()) {
            NetworkEndian::write_u16(chunk, *part);
        }
        Address(addr)
    }

    /// Construct an IPv6 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 16];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// Create the link-local address of an interface identifier.
    ///
    /// The result lives in `fe80::/64` and is only valid in link-local scope. Global addresses
    /// are formed later by overlaying an advertised prefix, see [`with_prefix`].
    ///
    /// [`with_prefix`]: #method.with_prefix
    pub const fn from_link_local_id(id: InterfaceId) -> Address {
        let InterfaceId([a, b, c, d, e, f, g, h]) = id;
        Address([0xfe, 0x80, 0, 0, 0, 0, 0, 0, a, b, c, d, e, f, g, h])
    }

    /// Return an IPv6 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the IPv6 address is an [unicast address].
    ///
    /// [unicast address]: https://tools.ietf.org/html/rfc4291#section-2.5
    pub fn is_unicast(&self) -> bool {
        !(self.is_multicast() || self.is_unspecified())
    }

    /// Query whether the IPv6 address is a [multicast address].
    ///
    /// [multicast address]: https://tools.ietf.org/html/rfc4291#section-2.7
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Query whether the IPv6 address is the [unspecified address].
    ///
    /// [unspecified address]: https://tools.ietf.org/html/rfc4291#section-2.5.2
    pub fn is_unspecified(&self) -> bool {
        self.0 == [0x00; 16]
    }

    /// Query whether the IPv6 address is in the [link-local] scope.
    ///
    /// [link-local]: https://tools.ietf.org/html/rfc4291#section-2.5.6
    pub fn is_link_local(&self) -> bool {
        self.0[0..8] == [0xfe, 0x80, 0x00, 0x00,
                         0x00, 0x00, 0x00, 0x00]
    }

    /// Mask the address to some prefix length.
    ///
    /// # Panics
    /// This function panics if `prefix` is greater than 128.
    pub fn mask(&self, prefix: u8) -> Address {
        assert!(prefix <= 128);
        let mut bytes = self.0;
        for (i, part) in bytes.iter_mut().enumerate() {
            // Remaining bits in this part.
            let bits = prefix
                .saturating_sub((i*8) as u8)
                .min(8);
            *part &= !0xffu8
                .checked_shr(bits.into())
                .unwrap_or(0);
        }
        Address(bytes)
    }

    /// Replace the leading `prefix_len` bits with those of `prefix`.
    ///
    /// The host bits of `self` are kept. This is the address formation of stateless
    /// autoconfiguration, for an arbitrary advertised prefix length.
    ///
    /// ```rust
    /// # use ipstack::wire::Ipv6Address as Address;
    /// let local = Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960);
    /// let prefix = Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0);
    /// assert_eq!(local.with_prefix(prefix, 64),
    ///     Address::new(0x2001, 0xdb8, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960));
    /// ```
    ///
    /// # Panics
    /// This function panics if `prefix_len` is greater than 128.
    pub fn with_prefix(&self, prefix: Address, prefix_len: u8) -> Address {
        let net = prefix.mask(prefix_len);
        let netmask = Address([0xff; 16]).mask(prefix_len);
        let mut bytes = self.0;
        for ((byte, net), mask) in bytes.iter_mut().zip(net.0.iter()).zip(netmask.0.iter()) {
            *byte = (*byte & !mask) | net;
        }
        Address(bytes)
    }

    /// The solicited node multicast group for the given unicast address.
    ///
    /// This is `ff02::1:ff00:0/104` with the low 24 bits of the address, see [RFC 4291 § 2.7.1].
    ///
    /// [RFC 4291 § 2.7.1]: https://tools.ietf.org/html/rfc4291#section-2.7.1
    ///
    /// # Panics
    /// This function panics if the given address is not unicast.
    pub fn solicited_node_multicast(&self) -> Address {
        assert!(self.is_unicast());
        let mut bytes = Cidr::SOLICITED_NODE_PREFIX.address.0;
        bytes[13..].copy_from_slice(&self.0[13..]);
        Address(bytes)
    }
}

impl From<Address> for ::std::net::Ipv6Addr {
    fn from(Address(x): Address) -> ::std::net::Ipv6Addr {
        x.into()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // RFC 5952 text form, zero runs collapsed.
        fmt::Display::fmt(&::std::net::Ipv6Addr::from(*self), f)
    }
}

impl InterfaceId {
    /// Form an interface id from a unique address.
    ///
    /// This is the modified EUI-64: the universal/local bit is flipped and `ff:fe` inserted
    /// between the third and fourth octet. It should only be used when the address is a vendor or
    /// hardware provided address whose global uniqueness was specified at the time of assignment.
    pub const fn from_vendor_ether(addr: EthernetAddress) -> Self {
        let EthernetAddress([a, b, c, d, e, f]) = addr;
        InterfaceId([a ^ 0x2, b, c, 0xff, 0xfe, d, e, f])
    }
}

/// An IPv6 CIDR host: an address and a variable-length subnet masking prefix length.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Cidr {
    address:    Address,
    prefix_len: u8,
}

/// An IPv6 CIDR block.
///
/// Relevant RFCs:
/// * [RFC 1519: Classless Inter-Domain Routing (CIDR)][RFC1519]
///
/// [RFC1519]: https://tools.ietf.org/html/rfc1519
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Subnet {
    address: Address,
    prefix: u8,
}

impl Cidr {
    /// The [solicited node prefix].
    ///
    /// [solicited node prefix]: https://tools.ietf.org/html/rfc4291#section-2.7.1
    pub const SOLICITED_NODE_PREFIX: Cidr =
        Cidr {
            address: Address([0xff, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
                              0x00, 0x00, 0x00, 0x01, 0xff, 0x00, 0x00, 0x00]),
            prefix_len: 104
        };

    /// Create an IPv6 CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 128.
    pub fn new(address: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 128);
        Cidr { address, prefix_len }
    }

    /// Return the address of this IPv6 CIDR block.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv6 CIDR block.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// The subnet containing this address.
    pub fn subnet(self) -> Subnet {
        Subnet::from_cidr(self)
    }
}

impl Subnet {
    /// Get the subnet block of a CIDR address.
    pub fn from_cidr(cidr: Cidr) -> Self {
        Subnet {
            address: cidr.address().mask(cidr.prefix_len()),
            prefix: cidr.prefix_len(),
        }
    }

    /// Query whether a host is contained in the block describe by `self`.
    ///
    /// It completely ignores the host identifiers.
    pub fn contains(&self, address: Address) -> bool {
        // Own address is already masked.
        self.address == address.mask(self.prefix)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // https://tools.ietf.org/html/rfc4291#section-2.3
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

byte_wrapper! {
    /// A byte sequence representing an IPv6 packet.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ipv6([u8]);
}

// Ranges and constants describing the IPv6 header
//
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version| Traffic Class |           Flow Label                  |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |         Payload Length        |  Next Header  |   Hop Limit   |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                         Source Address                        +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                      Destination Address                      +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// See https://tools.ietf.org/html/rfc8200#section-3 for details.
mod field {
    use crate::wire::field::Field;
    // 4-bit version number, 8-bit traffic class, and the
    // 20-bit flow label.
    pub(crate) const VER_TC_FLOW: Field = 0..4;
    // Note: extension headers are included in this length.
    pub(crate) const LENGTH:      Field = 4..6;
    pub(crate) const NXT_HDR:     usize = 6;
    pub(crate) const HOP_LIMIT:   usize = 7;
    pub(crate) const SRC_ADDR:    Field = 8..24;
    pub(crate) const DST_ADDR:    Field = 24..40;
}

impl ipv6 {
    /// Imbue a raw octet buffer with IPv6 packet structure.
    pub fn new_unchecked(buffer: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(buffer)
    }

    /// Imbue a mutable octet buffer with IPv6 packet structure.
    pub fn new_unchecked_mut(buffer: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(buffer)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(buffer: &[u8]) -> Result<&Self> {
        let packet = Self::new_unchecked(buffer);
        packet.check_len()?;
        Ok(packet)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    ///
    /// The result of this check is invalidated by calling [set_payload_len].
    ///
    /// [set_payload_len]: #method.set_payload_len
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::DST_ADDR.end || len < self.total_len() {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the header length.
    pub fn header_len() -> usize {
        field::DST_ADDR.end
    }

    /// Return the length of a buffer required to hold a packet with the payload
    /// of a given length.
    pub fn buffer_len(payload_len: usize) -> usize {
        field::DST_ADDR.end + payload_len
    }

    /// Return the version field.
    pub fn version(&self) -> u8 {
        self.0[field::VER_TC_FLOW.start] >> 4
    }

    /// Return the payload length field.
    pub fn payload_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::LENGTH])
    }

    /// Return the payload length added to the known header length.
    pub fn total_len(&self) -> usize {
        Self::header_len() + self.payload_len() as usize
    }

    /// Return the next header field.
    pub fn next_header(&self) -> Protocol {
        Protocol::from(self.0[field::NXT_HDR])
    }

    /// Return the hop limit field.
    pub fn hop_limit(&self) -> u8 {
        self.0[field::HOP_LIMIT]
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SRC_ADDR])
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DST_ADDR])
    }

    /// Set the version, traffic class and flow label, the latter two to zero.
    pub fn set_version(&mut self, value: u8) {
        NetworkEndian::write_u32(&mut self.0[field::VER_TC_FLOW], u32::from(value & 0x0f) << 28);
    }

    /// Set the payload length field.
    pub fn set_payload_len(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::LENGTH], value);
    }

    /// Set the next header field.
    pub fn set_next_header(&mut self, value: Protocol) {
        self.0[field::NXT_HDR] = value.into();
    }

    /// Set the hop limit field.
    pub fn set_hop_limit(&mut self, value: u8) {
        self.0[field::HOP_LIMIT] = value;
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SRC_ADDR].copy_from_slice(value.as_bytes());
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DST_ADDR].copy_from_slice(value.as_bytes());
    }

    /// Return the payload, bounded by the payload length field.
    pub fn payload_slice(&self) -> &[u8] {
        let range = Self::header_len()..self.total_len();
        &self.0[range]
    }

    /// Return the payload mutably, bounded by the payload length field.
    pub fn payload_mut_slice(&mut self) -> &mut [u8] {
        let range = Self::header_len()..self.total_len();
        &mut self.0[range]
    }
}

/// A high-level representation of an Internet Protocol version 6 packet header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// IPv6 address of the source node.
    pub src_addr:    Address,
    /// IPv6 address of the destination node.
    pub dst_addr:    Address,
    /// Protocol contained in the next header.
    pub next_header: Protocol,
    /// Length of the payload including the extension headers.
    pub payload_len: usize,
    /// The 8-bit hop limit field.
    pub hop_limit:   u8
}

impl Repr {
    /// Parse an Internet Protocol version 6 packet and return a high-level representation.
    pub fn parse(packet: &ipv6) -> Result<Repr> {
        packet.check_len()?;
        if packet.version() != 6 { return Err(Error::Malformed); }
        Ok(Repr {
            src_addr:    packet.src_addr(),
            dst_addr:    packet.dst_addr(),
            next_header: packet.next_header(),
            payload_len: packet.payload_len() as usize,
            hop_limit:   packet.hop_limit()
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        field::DST_ADDR.end
    }

    /// Emit a high-level representation into an Internet Protocol version 6 packet.
    pub fn emit(&self, packet: &mut ipv6) {
        // Make no assumptions about the original state of the packet buffer.
        packet.set_version(6);
        packet.set_payload_len(self.payload_len as u16);
        packet.set_hop_limit(self.hop_limit);
        packet.set_next_header(self.next_header);
        packet.set_src_addr(self.src_addr);
        packet.set_dst_addr(self.dst_addr);
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IPv6 src={} dst={} nxt_hdr={} hop_limit={}",
               self.src_addr, self.dst_addr, self.next_header, self.hop_limit)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static LINK_LOCAL_ADDR: Address = Address([0xfe, 0x80, 0x00, 0x00,
                                               0x00, 0x00, 0x00, 0x00,
                                               0x00, 0x00, 0x00, 0x00,
                                               0x00, 0x00, 0x00, 0x01]);

    static REPR_PACKET_BYTES: [u8; 52] = [0x60, 0x00, 0x00, 0x00,
                                          0x00, 0x0c, 0x11, 0x40,
                                          0xfe, 0x80, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x01,
                                          0xff, 0x02, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x00,
                                          0x00, 0x00, 0x00, 0x01,
                                          0x00, 0x01, 0x00, 0x02,
                                          0x00, 0x0c, 0x02, 0x4e,
                                          0xff, 0xff, 0xff, 0xff];

    #[test]
    fn basic_multicast() {
        assert!(!Address::LINK_LOCAL_ALL_ROUTERS.is_unspecified());
        assert!(Address::LINK_LOCAL_ALL_ROUTERS.is_multicast());
        assert!(!Address::LINK_LOCAL_ALL_ROUTERS.is_link_local());
        assert!(Address::LINK_LOCAL_ALL_NODES.is_multicast());
        assert!(!Address::LINK_LOCAL_ALL_NODES.is_unicast());
    }

    #[test]
    fn address_format() {
        assert_eq!("ff02::1", format!("{}", Address::LINK_LOCAL_ALL_NODES));
        assert_eq!("fe80::1", format!("{}", LINK_LOCAL_ADDR));
        assert_eq!("fe80::7f00:0:1",
                   format!("{}", Address::new(0xfe80, 0, 0, 0, 0, 0x7f00, 0x0000, 0x0001)));
        assert_eq!("::", format!("{}", Address::UNSPECIFIED));
        assert_eq!("2001:db8::1/64",
                   format!("{}", Cidr::new(Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 64)));
    }

    #[test]
    fn mask() {
        let addr = Address::new(0x0123, 0x4567, 0x89ab, 0, 0, 0, 0, 1);
        assert_eq!(addr.mask(11).0, [0x01, 0x20, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.mask(15).0, [0x01, 0x22, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.mask(26).0, [0x01, 0x23, 0x45, 0x40, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(addr.mask(128), addr);
        assert_eq!(addr.mask(0), Address::UNSPECIFIED);
    }

    #[test]
    fn eui64() {
        let mac = EthernetAddress([0x8c, 0x85, 0x90, 0xa5, 0x09, 0x60]);
        let id = InterfaceId::from_vendor_ether(mac);
        assert_eq!(id.0, [0x8e, 0x85, 0x90, 0xff, 0xfe, 0xa5, 0x09, 0x60]);
        assert_eq!(id.0[0] ^ mac.0[0], 0x02);
        let local = Address::from_link_local_id(id);
        assert!(local.is_link_local());
        assert_eq!(format!("{}", local), "fe80::8e85:90ff:fea5:960");
    }

    #[test]
    fn solicited_node() {
        let addr = Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960);
        let group = addr.solicited_node_multicast();
        assert_eq!(group, Address::new(0xff02, 0, 0, 0, 0, 1, 0xffa5, 0x0960));
        assert!(Cidr::SOLICITED_NODE_PREFIX.subnet().contains(group));
    }

    #[test]
    fn overlay_prefix() {
        let local = Address::new(0xfe80, 0, 0, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960);
        let prefix = Address::new(0x2001, 0xdb8, 0xffff, 0, 0, 0, 0, 0);
        let global = local.with_prefix(prefix, 48);
        assert_eq!(global, Address::new(0x2001, 0xdb8, 0xffff, 0, 0x8e85, 0x90ff, 0xfea5, 0x0960));
        // Host bits of the advertised prefix never leak into the result.
        let noisy = Address::new(0x2001, 0xdb8, 0, 0, 0xdead, 0, 0, 0);
        assert_eq!(local.with_prefix(noisy, 64).0[8..], local.0[8..]);
    }

    #[test]
    fn subnet_contains() {
        let net = Cidr::new(Address::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 32).subnet();
        assert!(net.contains(Address::new(0x2001, 0xdb8, 7, 0, 0, 0, 0, 1)));
        assert!(!net.contains(Address::new(0x2001, 0xdb9, 0, 0, 0, 0, 0, 1)));
        assert!(Cidr::new(Address::UNSPECIFIED, 0).subnet().contains(LINK_LOCAL_ADDR));
    }

    #[test]
    fn repr_parse() {
        let packet = ipv6::new_checked(&REPR_PACKET_BYTES[..]).unwrap();
        let repr = Repr::parse(packet).unwrap();
        assert_eq!(repr, Repr {
            src_addr: LINK_LOCAL_ADDR,
            dst_addr: Address::LINK_LOCAL_ALL_NODES,
            next_header: Protocol::Udp,
            payload_len: 12,
            hop_limit: 64,
        });
        assert_eq!(packet.payload_slice(), &REPR_PACKET_BYTES[40..]);
    }

    #[test]
    fn repr_emit() {
        let repr = Repr {
            src_addr: LINK_LOCAL_ADDR,
            dst_addr: Address::LINK_LOCAL_ALL_NODES,
            next_header: Protocol::Udp,
            payload_len: 12,
            hop_limit: 64,
        };
        let mut bytes = vec![0xa5; repr.buffer_len() + 12];
        let packet = ipv6::new_unchecked_mut(&mut bytes);
        repr.emit(packet);
        packet.payload_mut_slice().copy_from_slice(&REPR_PACKET_BYTES[40..]);
        assert_eq!(&bytes[..], &REPR_PACKET_BYTES[..]);
    }

    #[test]
    fn repr_wrong_version() {
        let mut bytes = REPR_PACKET_BYTES;
        bytes[0] = 0x40;
        let packet = ipv6::new_checked(&bytes[..]).unwrap();
        assert_eq!(Repr::parse(packet), Err(Error::Malformed));
    }

    #[test]
    fn truncated_payload() {
        assert_eq!(ipv6::new_checked(&REPR_PACKET_BYTES[..46]).err(), Some(Error::Truncated));
    }
}
