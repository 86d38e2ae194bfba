use core::fmt;
use core::convert::From;

use super::{Ipv4Address, Ipv4Cidr, Ipv4Subnet};
use super::{Ipv6Address, Ipv6Cidr, Ipv6Subnet};

enum_with_unknown! {
    /// IP datagram encapsulated protocol.
    pub enum Protocol(u8) {
        HopByHop  = 0x00,
        Icmp      = 0x01,
        Tcp       = 0x06,
        Udp       = 0x11,
        Icmpv6    = 0x3a,
        Ipv6NoNxt = 0x3b,
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Protocol::HopByHop    => write!(f, "Hop-by-Hop"),
            Protocol::Icmp        => write!(f, "ICMP"),
            Protocol::Tcp         => write!(f, "TCP"),
            Protocol::Udp         => write!(f, "UDP"),
            Protocol::Icmpv6      => write!(f, "ICMPv6"),
            Protocol::Ipv6NoNxt   => write!(f, "IPv6-NoNxt"),
            Protocol::Unknown(id) => write!(f, "0x{:02x}", id)
        }
    }
}

/// An internetworking address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Address {
    /// An IPv4 address.
    Ipv4(Ipv4Address),

    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

impl Address {
    /// Create an address wrapping an IPv4 address with the given octets.
    pub const fn v4(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address::Ipv4(Ipv4Address::new(a0, a1, a2, a3))
    }

    /// Query whether the address is a valid unicast address.
    pub fn is_unicast(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_unicast(),
            Address::Ipv6(addr) => addr.is_unicast(),
        }
    }
}

impl From<Ipv4Address> for Address {
    fn from(addr: Ipv4Address) -> Self {
        Address::Ipv4(addr)
    }
}

impl From<Ipv6Address> for Address {
    fn from(addr: Ipv6Address) -> Self {
        Address::Ipv6(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Ipv4(addr) => write!(f, "{}", addr),
            Address::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}

/// A specification of a CIDR block, containing an address and a variable-length
/// subnet masking prefix length.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Cidr {
    Ipv4(Ipv4Cidr),
    Ipv6(Ipv6Cidr),
}

/// A network block of either version, the host bits of its address cleared.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Subnet {
    Ipv4(Ipv4Subnet),
    Ipv6(Ipv6Subnet),
}

impl Cidr {
    /// Create a CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the given prefix length is invalid for the given address.
    pub fn new(addr: Address, prefix_len: u8) -> Cidr {
        match addr {
            Address::Ipv4(addr) => Cidr::Ipv4(Ipv4Cidr::new(addr, prefix_len)),
            Address::Ipv6(addr) => Cidr::Ipv6(Ipv6Cidr::new(addr, prefix_len)),
        }
    }

    /// The subnet containing this address.
    pub fn subnet(self) -> Subnet {
        match self {
            Cidr::Ipv4(addr) => Subnet::Ipv4(addr.subnet()),
            Cidr::Ipv6(addr) => Subnet::Ipv6(addr.subnet()),
        }
    }

    /// Return the IP address of this CIDR block.
    pub fn address(&self) -> Address {
        match self {
            Cidr::Ipv4(cidr) => Address::Ipv4(cidr.address()),
            Cidr::Ipv6(cidr) => Address::Ipv6(cidr.address()),
        }
    }

    /// Return the prefix length of this CIDR block.
    pub fn prefix_len(&self) -> u8 {
        match self {
            Cidr::Ipv4(cidr) => cidr.prefix_len(),
            Cidr::Ipv6(cidr) => cidr.prefix_len(),
        }
    }

    /// Query whether the network of this block contains the given address.
    pub fn contains(&self, addr: Address) -> bool {
        self.subnet().contains(addr)
    }
}

impl Subnet {
    /// Query whether the CIDR subnetwork contains the given address.
    ///
    /// Addresses of the other IP version are never contained.
    pub fn contains(&self, addr: Address) -> bool {
        match (self, addr) {
            (Subnet::Ipv4(block), Address::Ipv4(addr)) =>
                block.contains(addr),
            (Subnet::Ipv6(block), Address::Ipv6(addr)) =>
                block.contains(addr),
            (Subnet::Ipv4(_), Address::Ipv6(_)) | (Subnet::Ipv6(_), Address::Ipv4(_)) =>
                false,
        }
    }
}

impl From<Ipv4Cidr> for Cidr {
    fn from(addr: Ipv4Cidr) -> Self {
        Cidr::Ipv4(addr)
    }
}

impl From<Ipv6Cidr> for Cidr {
    fn from(addr: Ipv6Cidr) -> Self {
        Cidr::Ipv6(addr)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cidr::Ipv4(cidr) => write!(f, "{}", cidr),
            Cidr::Ipv6(cidr) => write!(f, "{}", cidr),
        }
    }
}

pub(crate) mod checksum {
    use byteorder::{ByteOrder, NetworkEndian};

    use super::*;

    fn propagate_carries(word: u32) -> u16 {
        let sum = (word >> 16) + (word & 0xffff);
        ((sum >> 16) as u16) + (sum as u16)
    }

    /// Compute an RFC 1071 compliant checksum (without the final complement).
    pub(crate) fn data(mut data: &[u8]) -> u16 {
        let mut accum = 0;

        // For each 32-byte chunk...
        const CHUNK_SIZE: usize = 32;
        while data.len() >= CHUNK_SIZE {
            let mut d = &data[..CHUNK_SIZE];
            // ... take by 2 bytes and sum them.
            while d.len() >= 2 {
                accum += NetworkEndian::read_u16(d) as u32;
                d = &d[2..];
            }

            data = &data[CHUNK_SIZE..];
        }

        // Sum the rest that does not fit the last 32-byte chunk,
        // taking by 2 bytes.
        while data.len() >= 2 {
            accum += NetworkEndian::read_u16(data) as u32;
            data = &data[2..];
        }

        // Add the last remaining odd byte, if any.
        if let Some(&value) = data.first() {
            accum += (value as u32) << 8;
        }

        propagate_carries(accum)
    }

    /// Combine several RFC 1071 compliant checksums.
    pub(crate) fn combine(checksums: &[u16]) -> u16 {
        let mut accum: u32 = 0;
        for &word in checksums {
            accum += word as u32;
        }
        propagate_carries(accum)
    }

    /// Compute the IPv6 pseudo header checksum, see [RFC 8200 § 8.1].
    ///
    /// [RFC 8200 § 8.1]: https://tools.ietf.org/html/rfc8200#section-8.1
    pub(crate) fn pseudo_header(src_addr: &Ipv6Address, dst_addr: &Ipv6Address,
                                protocol: Protocol, length: u32) -> u16 {
        let mut proto_len = [0u8; 8];
        proto_len[7] = protocol.into();
        NetworkEndian::write_u32(&mut proto_len[0..4], length);

        combine(&[
            data(src_addr.as_bytes()),
            data(dst_addr.as_bytes()),
            data(&proto_len[..])
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn v6(a0: u16, a1: u16, a2: u16, a3: u16, a4: u16, a5: u16, a6: u16, a7: u16) -> Address {
        Address::Ipv6(Ipv6Address::new(a0, a1, a2, a3, a4, a5, a6, a7))
    }

    #[test]
    fn cidr_contains() {
        let v4 = Cidr::new(Address::v4(192, 168, 1, 0), 24);
        assert!(v4.contains(Address::v4(192, 168, 1, 77)));
        assert!(!v4.contains(Address::v4(192, 168, 2, 1)));
        assert!(!v4.contains(v6(0xfe80, 0, 0, 0, 0, 0, 0, 1)));

        let net = Cidr::new(v6(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0), 64);
        assert!(net.contains(v6(0x2001, 0xdb8, 0, 0, 1, 2, 3, 4)));
        assert!(!net.contains(Address::v4(32, 1, 13, 184)));
    }

    #[test]
    fn checksum_odd_length() {
        // Trailing octet is padded with zero.
        assert_eq!(checksum::data(&[0x01, 0x02, 0x03]), 0x0402);
        assert_eq!(checksum::combine(&[0xffff, 0x0001]), 0x0001);
    }

    #[test]
    fn protocol_roundtrip() {
        assert_eq!(Protocol::from(0x3a), Protocol::Icmpv6);
        assert_eq!(u8::from(Protocol::Unknown(0x99)), 0x99);
        assert_eq!(format!("{}", Protocol::Icmpv6), "ICMPv6");
    }
}
