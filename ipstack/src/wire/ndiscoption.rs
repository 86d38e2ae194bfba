use core::fmt;
use bitflags::bitflags;
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result, EthernetAddress, Ipv6Address, Ipv6Cidr, Ipv6Subnet};

enum_with_unknown! {
    /// NDISC Option Type
    pub doc enum Type(u8) {
        /// Source Link-layer Address
        SourceLinkLayerAddr = 0x1,
        /// Target Link-layer Address
        TargetLinkLayerAddr = 0x2,
        /// Prefix Information
        PrefixInformation   = 0x3,
        /// Redirected Header
        RedirectedHeader    = 0x4,
        /// MTU
        Mtu                 = 0x5,
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::SourceLinkLayerAddr => write!(f, "source link-layer address"),
            Type::TargetLinkLayerAddr => write!(f, "target link-layer address"),
            Type::PrefixInformation   => write!(f, "prefix information"),
            Type::RedirectedHeader    => write!(f, "redirected header"),
            Type::Mtu                 => write!(f, "mtu"),
            Type::Unknown(id)         => write!(f, "{}", id),
        }
    }
}

bitflags! {
    /// Flags of the prefix information option.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PrefixInfoFlags: u8 {
        /// The prefix can be used for on-link determination.
        const ON_LINK  = 0b1000_0000;
        /// The prefix can be used for stateless address configuration.
        const ADDRCONF = 0b0100_0000;
    }
}

byte_wrapper! {
    /// A read/write wrapper around an [NDISC Option].
    ///
    /// [NDISC Option]: https://tools.ietf.org/html/rfc4861#section-4.6
    #[derive(Debug, PartialEq, Eq)]
    pub struct ndisc_option([u8]);
}

// Format of an NDISC Option
//
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |     Type      |    Length     |              ...              |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// ~                              ...                              ~
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
// See https://tools.ietf.org/html/rfc4861#section-4.6 for details.
mod field {
    use crate::wire::field::*;

    // 8-bit identifier of the type of option.
    pub(crate) const TYPE:          usize = 0;
    // 8-bit unsigned integer. Length of the option, in units of 8 octets.
    pub(crate) const LENGTH:        usize = 1;
    // Minimum length of an option.
    pub(crate) const MIN_OPT_LEN:   usize = 8;

    // Link-layer Address
    pub(crate) const LL_ADDR:       Field = 2..8;

    // Prefix Information, the value part being 30 octets:
    // prefix length, flags, 48-bit valid lifetime, 48-bit preferred lifetime, prefix.
    pub(crate) const PREFIX_LEN:    usize = 2;
    pub(crate) const FLAGS:         usize = 3;
    pub(crate) const VALID_LT:      Field = 4..10;
    pub(crate) const PREF_LT:       Field = 10..16;
    pub(crate) const PREFIX:        Field = 16..32;

    // MTU
    pub(crate) const MTU:           Field = 4..8;
}

/// The largest lifetime representable in the 48-bit fields of the prefix information option.
pub const MAX_PREFIX_LIFETIME: u64 = 0xffff_ffff_ffff;

impl ndisc_option {
    /// Imbue a raw octet buffer with NDISC option structure.
    pub fn new_unchecked(data: &[u8]) -> &Self {
        Self::__from_macro_new_unchecked(data)
    }

    /// Imbue a mutable octet buffer with NDISC option structure.
    pub fn new_unchecked_mut(data: &mut [u8]) -> &mut Self {
        Self::__from_macro_new_unchecked_mut(data)
    }

    /// Shorthand for a combination of [new_unchecked] and [check_len].
    ///
    /// [new_unchecked]: #method.new_unchecked
    /// [check_len]: #method.check_len
    pub fn new_checked(data: &[u8]) -> Result<&Self> {
        let opt = Self::new_unchecked(data);
        opt.check_len()?;
        Ok(opt)
    }

    /// Ensure that no accessor method will panic if called.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is shorter than the length field claims, and
    /// `Err(Error::Malformed)` for an option with a length of zero.
    pub fn check_len(&self) -> Result<()> {
        let data = &self.0;
        let len = data.len();

        if len < field::MIN_OPT_LEN {
            return Err(Error::Truncated);
        }

        let opt_len = self.data_len() as usize * 8;
        if opt_len == 0 {
            Err(Error::Malformed)
        } else if len < opt_len {
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// The bytes of this option, bounded by its length field.
    pub fn as_bytes(&self) -> &[u8] {
        let len = (usize::from(self.data_len()) * 8).min(self.0.len());
        &self.0[..len]
    }

    /// Return the option type field.
    pub fn option_type(&self) -> Type {
        Type::from(self.0[field::TYPE])
    }

    /// Return the option length field, in units of 8 octets.
    pub fn data_len(&self) -> u8 {
        self.0[field::LENGTH]
    }

    /// Return the link-layer address of a source or target address option.
    pub fn link_layer_addr(&self) -> EthernetAddress {
        EthernetAddress::from_bytes(&self.0[field::LL_ADDR])
    }

    /// Return the MTU field of a MTU option.
    pub fn mtu(&self) -> u32 {
        NetworkEndian::read_u32(&self.0[field::MTU])
    }

    /// Return the prefix length of a prefix information option.
    pub fn prefix_len(&self) -> u8 {
        self.0[field::PREFIX_LEN]
    }

    /// Return the flags of a prefix information option.
    pub fn prefix_flags(&self) -> PrefixInfoFlags {
        PrefixInfoFlags::from_bits_retain(self.0[field::FLAGS])
    }

    /// Return the valid lifetime of a prefix information option.
    pub fn valid_lifetime(&self) -> u64 {
        NetworkEndian::read_uint(&self.0[field::VALID_LT], 6)
    }

    /// Return the preferred lifetime of a prefix information option.
    pub fn preferred_lifetime(&self) -> u64 {
        NetworkEndian::read_uint(&self.0[field::PREF_LT], 6)
    }

    /// Return the prefix of a prefix information option.
    pub fn prefix(&self) -> Ipv6Address {
        Ipv6Address::from_bytes(&self.0[field::PREFIX])
    }

    /// Set the option type field.
    pub fn set_option_type(&mut self, value: Type) {
        self.0[field::TYPE] = value.into();
    }

    /// Set the option length field, in units of 8 octets.
    pub fn set_data_len(&mut self, value: u8) {
        self.0[field::LENGTH] = value;
    }

    pub fn set_link_layer_addr(&mut self, addr: EthernetAddress) {
        self.0[field::LL_ADDR].copy_from_slice(addr.as_bytes())
    }

    pub fn set_mtu(&mut self, value: u32) {
        NetworkEndian::write_u16(&mut self.0[2..4], 0);
        NetworkEndian::write_u32(&mut self.0[field::MTU], value);
    }

    pub fn set_prefix_len(&mut self, value: u8) {
        self.0[field::PREFIX_LEN] = value;
    }

    pub fn set_prefix_flags(&mut self, flags: PrefixInfoFlags) {
        self.0[field::FLAGS] = flags.bits();
    }

    /// Set the valid lifetime, saturating at [`MAX_PREFIX_LIFETIME`].
    ///
    /// [`MAX_PREFIX_LIFETIME`]: constant.MAX_PREFIX_LIFETIME.html
    pub fn set_valid_lifetime(&mut self, value: u64) {
        let value = value.min(MAX_PREFIX_LIFETIME);
        NetworkEndian::write_uint(&mut self.0[field::VALID_LT], value, 6);
    }

    /// Set the preferred lifetime, saturating at [`MAX_PREFIX_LIFETIME`].
    ///
    /// [`MAX_PREFIX_LIFETIME`]: constant.MAX_PREFIX_LIFETIME.html
    pub fn set_preferred_lifetime(&mut self, value: u64) {
        let value = value.min(MAX_PREFIX_LIFETIME);
        NetworkEndian::write_uint(&mut self.0[field::PREF_LT], value, 6);
    }

    pub fn set_prefix(&mut self, addr: Ipv6Address) {
        self.0[field::PREFIX].copy_from_slice(addr.as_bytes());
    }
}

/// The content of a prefix information option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PrefixInformation {
    pub prefix_len: u8,
    pub flags: PrefixInfoFlags,
    /// Seconds the prefix is valid for on-link determination, 48 bits wide.
    pub valid_lifetime: u64,
    /// Seconds addresses generated from the prefix remain preferred, 48 bits wide.
    pub preferred_lifetime: u64,
    pub prefix: Ipv6Address,
}

impl PrefixInformation {
    /// The advertised network.
    pub fn subnet(&self) -> Ipv6Subnet {
        Ipv6Cidr::new(self.prefix, self.prefix_len).subnet()
    }
}

/// A high-level representation of an NDISC Option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Repr {
    SourceLinkLayerAddr(EthernetAddress),
    TargetLinkLayerAddr(EthernetAddress),
    PrefixInformation(PrefixInformation),
    Mtu(u32),
    /// An option that is skipped when encountered, only its framing is retained.
    Unknown {
        type_: u8,
        length: u8,
    },
}

impl Repr {
    /// Parse an NDISC Option and return a high-level representation.
    pub fn parse(opt: &ndisc_option) -> Result<Repr> {
        opt.check_len()?;
        match opt.option_type() {
            Type::SourceLinkLayerAddr => {
                if opt.data_len() == 1 {
                    Ok(Repr::SourceLinkLayerAddr(opt.link_layer_addr()))
                } else {
                    Err(Error::Malformed)
                }
            },
            Type::TargetLinkLayerAddr => {
                if opt.data_len() == 1 {
                    Ok(Repr::TargetLinkLayerAddr(opt.link_layer_addr()))
                } else {
                    Err(Error::Malformed)
                }
            },
            Type::PrefixInformation => {
                if opt.data_len() != 4 {
                    return Err(Error::Malformed);
                }
                if opt.prefix_len() > 128 {
                    return Err(Error::Malformed);
                }
                Ok(Repr::PrefixInformation(PrefixInformation {
                    prefix_len: opt.prefix_len(),
                    flags: opt.prefix_flags(),
                    valid_lifetime: opt.valid_lifetime(),
                    preferred_lifetime: opt.preferred_lifetime(),
                    prefix: opt.prefix(),
                }))
            },
            Type::Mtu => {
                if opt.data_len() == 1 {
                    Ok(Repr::Mtu(opt.mtu()))
                } else {
                    Err(Error::Malformed)
                }
            },
            other => Ok(Repr::Unknown {
                type_: other.into(),
                length: opt.data_len(),
            }),
        }
    }

    /// Return the length of a header that will be emitted from this high-level representation.
    pub fn buffer_len(&self) -> usize {
        match self {
            Repr::SourceLinkLayerAddr(_) | Repr::TargetLinkLayerAddr(_) => field::LL_ADDR.end,
            Repr::PrefixInformation(_) => field::PREFIX.end,
            Repr::Mtu(_) => field::MTU.end,
            Repr::Unknown { length, .. } => usize::from(*length) * 8,
        }
    }

    /// Emit a high-level representation into an NDISC Option.
    ///
    /// The payload of an unknown option is zeroed.
    pub fn emit(&self, opt: &mut ndisc_option) {
        match *self {
            Repr::SourceLinkLayerAddr(addr) => {
                opt.set_option_type(Type::SourceLinkLayerAddr);
                opt.set_data_len(1);
                opt.set_link_layer_addr(addr);
            },
            Repr::TargetLinkLayerAddr(addr) => {
                opt.set_option_type(Type::TargetLinkLayerAddr);
                opt.set_data_len(1);
                opt.set_link_layer_addr(addr);
            },
            Repr::PrefixInformation(info) => {
                opt.set_option_type(Type::PrefixInformation);
                opt.set_data_len(4);
                opt.set_prefix_len(info.prefix_len);
                opt.set_prefix_flags(info.flags);
                opt.set_valid_lifetime(info.valid_lifetime);
                opt.set_preferred_lifetime(info.preferred_lifetime);
                opt.set_prefix(info.prefix);
            },
            Repr::Mtu(mtu) => {
                opt.set_option_type(Type::Mtu);
                opt.set_data_len(1);
                opt.set_mtu(mtu);
            },
            Repr::Unknown { type_, length } => {
                opt.set_option_type(Type::from(type_));
                opt.set_data_len(length);
                let end = (usize::from(length) * 8).max(2);
                for byte in &mut opt.0[2..end] {
                    *byte = 0;
                }
            },
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NDISC Option: ")?;
        match self {
            Repr::SourceLinkLayerAddr(addr) => write!(f, "SourceLinkLayer addr={}", addr),
            Repr::TargetLinkLayerAddr(addr) => write!(f, "TargetLinkLayer addr={}", addr),
            Repr::PrefixInformation(info) => write!(f, "PrefixInformation prefix={}/{}",
                info.prefix, info.prefix_len),
            Repr::Mtu(mtu) => write!(f, "MTU mtu={}", mtu),
            Repr::Unknown { type_, length } => write!(f, "Unknown({}) length={}", type_, length),
        }
    }
}

/// Iterate over the options in a buffer.
///
/// Each item is the raw view of one option whose framing was checked. Iteration ends at the first
/// error, which is returned as the last item.
pub(crate) struct Options<'a> {
    remaining: &'a [u8],
}

impl<'a> Options<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Options { remaining: data }
    }
}

impl<'a> Iterator for Options<'a> {
    type Item = Result<&'a ndisc_option>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }

        let data = self.remaining;
        match ndisc_option::new_checked(data) {
            Ok(opt) => {
                let len = usize::from(opt.data_len()) * 8;
                self.remaining = &data[len..];
                Some(Ok(ndisc_option::new_unchecked(&data[..len])))
            },
            Err(err) => {
                self.remaining = &[];
                Some(Err(err))
            },
        }
    }
}
