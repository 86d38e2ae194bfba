use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result, Ipv6Address};

enum_with_unknown! {
    /// Ethernet protocol type.
    pub doc enum EtherType(u16) {
        /// Internet protocol version 4.
        Ipv4 = 0x0800,
        /// Address resolution protocol.
        Arp  = 0x0806,
        /// Internet protocol version 6.
        Ipv6 = 0x86DD,
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EtherType::Ipv4 => write!(f, "IPv4"),
            EtherType::Ipv6 => write!(f, "IPv6"),
            EtherType::Arp  => write!(f, "ARP"),
            EtherType::Unknown(id) => write!(f, "0x{:04x}", id)
        }
    }
}

/// A six-octet Ethernet II address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Address(pub [u8; 6]);

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address([0xff; 6]);

    /// Construct an Ethernet address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not six octets long.
    pub fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; 6];
        bytes.copy_from_slice(data);
        Address(bytes)
    }

    /// The group address an IPv6 multicast address is delivered to.
    ///
    /// See [RFC 2464 § 7], the last four octets of the IPv6 address appended to `33:33`.
    ///
    /// [RFC 2464 § 7]: https://tools.ietf.org/html/rfc2464#section-7
    pub fn ipv6_multicast(addr: Ipv6Address) -> Address {
        let b = addr.0;
        Address([0x33, 0x33, b[12], b[13], b[14], b[15]])
    }

    /// Return an Ethernet address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !(self.is_broadcast() ||
          self.is_multicast())
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the "multicast" bit in the OUI is set.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bytes = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
               bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5])
    }
}

byte_wrapper! {
    /// A byte sequence representing an Ethernet II frame.
    #[derive(Debug, PartialEq, Eq)]
    pub struct ethernet([u8]);
}

mod field {
    use crate::wire::field::*;

    pub(crate) const DESTINATION: Field =  0..6;
    pub(crate) const SOURCE:      Field =  6..12;
    pub(crate) const ETHERTYPE:   Field = 12..14;
    pub(crate) const PAYLOAD:     Rest  = 14..;
}

impl ethernet {
    /// Imbue a raw octet buffer with Ethernet frame structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with Ethernet frame structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        Self::new_unchecked(data).check_len()?;
        Ok(Self::new_unchecked(data))
    }

    /// Unwrap the frame as a raw byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    /// Returns `Err(Error::Truncated)` if the buffer is too short.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::PAYLOAD.start {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Return the length of a buffer required to hold a packet with the payload
    /// of a given length.
    pub fn buffer_len(payload_len: usize) -> usize {
        field::PAYLOAD.start + payload_len
    }

    /// Return the destination address field.
    pub fn dst_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::DESTINATION])
    }

    /// Return the source address field.
    pub fn src_addr(&self) -> Address {
        Address::from_bytes(&self.0[field::SOURCE])
    }

    /// Return the EtherType field, without checking for 802.1Q.
    pub fn ethertype(&self) -> EtherType {
        let raw = NetworkEndian::read_u16(&self.0[field::ETHERTYPE]);
        EtherType::from(raw)
    }

    /// Set the destination address field.
    pub fn set_dst_addr(&mut self, value: Address) {
        self.0[field::DESTINATION].copy_from_slice(value.as_bytes())
    }

    /// Set the source address field.
    pub fn set_src_addr(&mut self, value: Address) {
        self.0[field::SOURCE].copy_from_slice(value.as_bytes())
    }

    /// Set the EtherType field.
    pub fn set_ethertype(&mut self, value: EtherType) {
        NetworkEndian::write_u16(&mut self.0[field::ETHERTYPE], value.into())
    }

    /// Return the payload as a byte slice.
    pub fn payload(&self) -> &[u8] {
        &self.0[field::PAYLOAD]
    }

    /// Return the payload as a mutable byte slice.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.0[field::PAYLOAD]
    }
}

/// A high-level representation of an Ethernet II frame header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    pub src_addr:    Address,
    pub dst_addr:    Address,
    pub ethertype:   EtherType,
}

impl Repr {
    /// Parse an Ethernet II frame and return a high-level representation.
    pub fn parse(frame: &ethernet) -> Result<Repr> {
        frame.check_len()?;
        Ok(Repr {
            src_addr: frame.src_addr(),
            dst_addr: frame.dst_addr(),
            ethertype: frame.ethertype(),
        })
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        field::PAYLOAD.start
    }

    /// Emit a high-level representation into an Ethernet II frame.
    pub fn emit(&self, frame: &mut ethernet) {
        frame.set_src_addr(self.src_addr);
        frame.set_dst_addr(self.dst_addr);
        frame.set_ethertype(self.ethertype);
    }
}
