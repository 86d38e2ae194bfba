use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result, IpProtocol, Ipv6Address};
use super::ip::checksum;

enum_with_unknown! {
    /// Internet protocol control message type.
    pub doc enum Message(u8) {
        /// Destination Unreachable.
        DstUnreachable  = 0x01,
        /// Echo Request.
        EchoRequest     = 0x80,
        /// Echo Reply.
        EchoReply       = 0x81,
        /// Router Solicitation.
        RouterSolicit   = 0x85,
        /// Router Advertisement.
        RouterAdvert    = 0x86,
        /// Neighbor Solicitation.
        NeighborSolicit = 0x87,
        /// Neighbor Advertisement.
        NeighborAdvert  = 0x88,
    }
}

impl Message {
    /// Per [RFC 4443 § 2.1] ICMPv6 message types with the highest order
    /// bit set are informational messages while message types without
    /// the highest order bit set are error messages.
    ///
    /// [RFC 4443 § 2.1]: https://tools.ietf.org/html/rfc4443#section-2.1
    pub fn is_error(&self) -> bool {
        (u8::from(*self) & 0x80) != 0x80
    }

    /// Return a boolean value indicating if the given message type
    /// is an [NDISC] message type.
    ///
    /// [NDISC]: https://tools.ietf.org/html/rfc4861
    pub fn is_ndisc(&self) -> bool {
        match *self {
            Message::RouterSolicit | Message::RouterAdvert |
            Message::NeighborSolicit | Message::NeighborAdvert => true,
            _ => false,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Message::DstUnreachable  => write!(f, "destination unreachable"),
            Message::EchoRequest     => write!(f, "echo request"),
            Message::EchoReply       => write!(f, "echo reply"),
            Message::RouterSolicit   => write!(f, "router solicitation"),
            Message::RouterAdvert    => write!(f, "router advertisement"),
            Message::NeighborSolicit => write!(f, "neighbor solicitation"),
            Message::NeighborAdvert  => write!(f, "neighbor advert"),
            Message::Unknown(id)     => write!(f, "{}", id),
        }
    }
}

byte_wrapper! {
    /// A byte sequence representing an ICMPv6 message.
    #[derive(Debug, PartialEq, Eq)]
    pub struct icmpv6([u8]);
}

// Ranges and constants describing key boundaries in the ICMPv6 header.
mod field {
    use crate::wire::field::*;

    // ICMPv6: See https://tools.ietf.org/html/rfc4443
    pub(crate) const TYPE:          usize = 0;
    pub(crate) const CODE:          usize = 1;
    pub(crate) const CHECKSUM:      Field = 2..4;
    pub(crate) const HEADER_END:    usize = 4;

    // Router Advertisement message offsets
    pub(crate) const CUR_HOP_LIMIT: usize = 4;
    pub(crate) const ROUTER_FLAGS:  usize = 5;
    pub(crate) const ROUTER_LT:     Field = 6..8;
    pub(crate) const REACHABLE_TM:  Field = 8..12;
    pub(crate) const RETRANS_TM:    Field = 12..16;

    // Neighbor Solicitation and Neighbor Advertisement message offsets
    pub(crate) const NEIGH_FLAGS:   usize = 4;
    pub(crate) const TARGET_ADDR:   Field = 8..24;

    // Options start after the fixed part of each message.
    pub(crate) const RS_OPTIONS:    Rest = 8..;
    pub(crate) const RA_OPTIONS:    Rest = 16..;
    pub(crate) const NEIGH_OPTIONS: Rest = 24..;
}

impl icmpv6 {
    /// Imbue a raw octet buffer with ICMPv6 packet structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with ICMPv6 packet structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        let packet = Self::new_unchecked(data);
        packet.check_len()?;
        Ok(packet)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the fixed part of the message
    /// type it declares.
    pub fn check_len(&self) -> Result<()> {
        let len = self.0.len();
        if len < field::HEADER_END || len < self.header_len() {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Length of the fixed part of the message, options and data excluded.
    ///
    /// # Panics
    /// This function may panic if the buffer does not contain the type field.
    pub fn header_len(&self) -> usize {
        match self.msg_type() {
            Message::RouterSolicit => field::RS_OPTIONS.start,
            Message::RouterAdvert => field::RA_OPTIONS.start,
            Message::NeighborSolicit | Message::NeighborAdvert => field::NEIGH_OPTIONS.start,
            _ => field::HEADER_END,
        }
    }

    /// Return the message type field.
    pub fn msg_type(&self) -> Message {
        Message::from(self.0[field::TYPE])
    }

    /// Return the message code field.
    pub fn msg_code(&self) -> u8 {
        self.0[field::CODE]
    }

    /// Return the checksum field.
    pub fn checksum(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::CHECKSUM])
    }

    /// Return the current hop limit field of a router advertisement.
    pub fn current_hop_limit(&self) -> u8 {
        self.0[field::CUR_HOP_LIMIT]
    }

    /// Return the raw flag octet of a router advertisement.
    pub fn router_flags(&self) -> u8 {
        self.0[field::ROUTER_FLAGS]
    }

    /// Return the router lifetime field in seconds.
    pub fn router_lifetime(&self) -> u16 {
        NetworkEndian::read_u16(&self.0[field::ROUTER_LT])
    }

    /// Return the reachable time field in milliseconds.
    pub fn reachable_time(&self) -> u32 {
        NetworkEndian::read_u32(&self.0[field::REACHABLE_TM])
    }

    /// Return the retransmit time field in milliseconds.
    pub fn retrans_time(&self) -> u32 {
        NetworkEndian::read_u32(&self.0[field::RETRANS_TM])
    }

    /// Return the raw flag octet of a neighbor advertisement.
    pub fn neighbor_flags(&self) -> u8 {
        self.0[field::NEIGH_FLAGS]
    }

    /// Return the target address of a neighbor solicitation or advertisement.
    pub fn target_addr(&self) -> Ipv6Address {
        Ipv6Address::from_bytes(&self.0[field::TARGET_ADDR])
    }

    /// The options following the fixed part of the message.
    pub fn options(&self) -> &[u8] {
        &self.0[self.header_len()..]
    }

    /// Validate the header checksum.
    ///
    /// The pseudo header is formed from the enclosing IPv6 source and destination.
    pub fn verify_checksum(&self, src_addr: Ipv6Address, dst_addr: Ipv6Address) -> bool {
        let len = self.0.len() as u32;
        let sum = checksum::combine(&[
            checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Icmpv6, len),
            checksum::data(&self.0),
        ]);
        sum == !0
    }

    /// Set the message type field.
    pub fn set_msg_type(&mut self, value: Message) {
        self.0[field::TYPE] = value.into()
    }

    /// Set the message code field.
    pub fn set_msg_code(&mut self, value: u8) {
        self.0[field::CODE] = value
    }

    /// Set the checksum field.
    pub fn set_checksum(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::CHECKSUM], value)
    }

    /// Clear the reserved field following the header.
    ///
    /// The field is four octets long for all neighbor discovery messages.
    pub fn clear_reserved(&mut self) {
        NetworkEndian::write_u32(&mut self.0[4..8], 0);
    }

    pub fn set_current_hop_limit(&mut self, value: u8) {
        self.0[field::CUR_HOP_LIMIT] = value;
    }

    pub fn set_router_flags(&mut self, flags: u8) {
        self.0[field::ROUTER_FLAGS] = flags;
    }

    pub fn set_router_lifetime(&mut self, value: u16) {
        NetworkEndian::write_u16(&mut self.0[field::ROUTER_LT], value);
    }

    pub fn set_reachable_time(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.0[field::REACHABLE_TM], value);
    }

    pub fn set_retrans_time(&mut self, value: u32) {
        NetworkEndian::write_u32(&mut self.0[field::RETRANS_TM], value);
    }

    pub fn set_neighbor_flags(&mut self, flags: u8) {
        self.0[field::NEIGH_FLAGS] = flags;
    }

    pub fn set_target_addr(&mut self, value: Ipv6Address) {
        self.0[field::TARGET_ADDR].copy_from_slice(value.as_bytes());
    }

    /// The options following the fixed part of the message, mutably.
    pub fn options_mut(&mut self) -> &mut [u8] {
        let start = self.header_len();
        &mut self.0[start..]
    }

    /// Compute and fill in the header checksum.
    pub fn fill_checksum(&mut self, src_addr: Ipv6Address, dst_addr: Ipv6Address) {
        self.set_checksum(0);
        let len = self.0.len() as u32;
        let sum = checksum::combine(&[
            checksum::pseudo_header(&src_addr, &dst_addr, IpProtocol::Icmpv6, len),
            checksum::data(&self.0),
        ]);
        self.set_checksum(!sum)
    }
}

impl fmt::Display for icmpv6 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ICMPv6 type={} code={}", self.msg_type(), self.msg_code())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static SRC: Ipv6Address = Ipv6Address([0xfe, 0x80, 0, 0, 0, 0, 0, 0,
                                           0, 0, 0, 0, 0, 0, 0, 1]);
    static DST: Ipv6Address = Ipv6Address([0xfe, 0x80, 0, 0, 0, 0, 0, 0,
                                           0, 0, 0, 0, 0, 0, 0, 2]);

    #[test]
    fn checksum_roundtrip() {
        let mut bytes = vec![0u8; 8];
        {
            let packet = icmpv6::new_unchecked_mut(&mut bytes);
            packet.set_msg_type(Message::RouterSolicit);
            packet.set_msg_code(0);
            packet.clear_reserved();
            packet.fill_checksum(SRC, DST);
        }
        let packet = icmpv6::new_checked(&bytes).unwrap();
        assert!(packet.verify_checksum(SRC, DST));
        assert!(!packet.verify_checksum(DST, Ipv6Address::LINK_LOCAL_ALL_ROUTERS));

        bytes[5] ^= 0x10;
        assert!(!icmpv6::new_unchecked(&bytes).verify_checksum(SRC, DST));
    }

    #[test]
    fn truncated_by_type() {
        // A neighbor solicitation needs room for its target address.
        let bytes = [0x87, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(icmpv6::new_checked(&bytes[..]).err(), Some(Error::Truncated));
        // An echo request has no such fixed part.
        let bytes = [0x80, 0x00, 0x00, 0x00];
        assert!(icmpv6::new_checked(&bytes[..]).is_ok());
    }

    #[test]
    fn message_kind() {
        assert!(Message::NeighborAdvert.is_ndisc());
        assert!(!Message::EchoReply.is_ndisc());
        assert!(Message::DstUnreachable.is_error());
        assert!(!Message::RouterAdvert.is_error());
    }
}
