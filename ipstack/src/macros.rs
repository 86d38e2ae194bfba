/// Define an enumeration with known variants and an unknown representation.
///
/// Most network protocols define fields where not all bit-patterns are standardized values. In
/// some cases these are invalid while others allocate them through some registrar (such as IANA).
/// This macro makes it more ergonomic to define a representation for such fields by providing
/// converters to and from an underlying representation derived from the definition.
///
/// # Example
///
/// ```
/// # use ipstack::enum_with_unknown;
/// # fn main() { }
/// enum_with_unknown! {
///     /// ARP hardware type.
///     pub enum Hardware(u16) {
///         Ethernet = 1,
///     }
/// }
/// ```
// Copyright (C) 2016 whitequark@whitequark.org
#[macro_export]
macro_rules! enum_with_unknown {
    (
        $( #[$enum_attr:meta] )*
        pub enum $name:ident($ty:ty) {
            $( $variant:ident = $value:expr ),+ $(,)*
        }
    ) => {
        $crate::enum_with_unknown! {
            $( #[$enum_attr] )*
            pub doc enum $name($ty) {
                $( $variant = $value ),+
            }
        }
    };
    (
        $( #[$enum_attr:meta] )*
        pub doc enum $name:ident($ty:ty) {
            $(
              $( #[$variant_attr:meta] )*
              $variant:ident = $value:expr $(,)*
            ),+
        }
    ) => {
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
        $( #[$enum_attr] )*
        pub enum $name {
            $(
              $( #[$variant_attr] )*
              $variant
            ),*,
            /// A value whose interpretation was not determined.
            ///
            /// Either parsed from a source using a value we do not know, or an arbitrary user
            /// supplied value for a field with extensions we do not implement.
            Unknown($ty)
        }

        impl ::core::convert::From<$ty> for $name {
            fn from(value: $ty) -> Self {
                match value {
                    $( $value => $name::$variant ),*,
                    other => $name::Unknown(other)
                }
            }
        }

        impl ::core::convert::From<$name> for $ty {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $value ),*,
                    $name::Unknown(other) => other
                }
            }
        }
    }
}

/// Declare a dynamically sized byte wrapper.
///
/// Use this to create byte slices with inner invariants. This macro performs two basic actions:
/// * Define a type with the indicated structure, documentation, attributes. The type can not have
///   any generic arguments and can only wrap a simple byte slice.
/// * Define two new private methods for conversion from a byte slice:
///   - `fn __from_macro_new_unchecked(&[u8]) -> &Self`
///   - `fn __from_macro_new_unchecked_mut(&mut [u8]) -> &mut Self`
///
/// ## Usage
///
/// ```
/// # use ipstack::byte_wrapper;
/// byte_wrapper! {
///     /// An ICMPv6 message.
///     pub struct icmpv6([u8]);
/// }
///
/// impl icmpv6 {
///     pub fn from_slice(slice: &[u8]) -> &Self {
///         Self::__from_macro_new_unchecked(slice)
///     }
/// }
///
/// let data = [0x85, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
/// let _ = icmpv6::from_slice(&data);
/// ```
#[macro_export]
macro_rules! byte_wrapper {
    (
        $( #[$attr:meta] )*
        pub struct $name:ident([u8])$(;)*
    ) => {
        #[allow(non_camel_case_types)]
        #[repr(transparent)]
        $( #[$attr] )*
        pub struct $name([u8]);

        impl $name {
            #[allow(dead_code)]
            fn __from_macro_new_unchecked(data: &[u8]) -> &Self {
                // SAFETY: this is safe due to repr(transparent)
                unsafe { &*(data as *const _ as *const Self) }
            }

            #[allow(dead_code)]
            fn __from_macro_new_unchecked_mut(data: &mut [u8]) -> &mut Self {
                // SAFETY: this is safe due to repr(transparent)
                unsafe { &mut *(data as *mut _ as *mut Self) }
            }
        }
    }
}

macro_rules! net_log {
    (trace, $($arg:tt)*) => { ::log::trace!(target: "ipstack", $($arg)*) };
    (debug, $($arg:tt)*) => { ::log::debug!(target: "ipstack", $($arg)*) };
    (warn, $($arg:tt)*) => { ::log::warn!(target: "ipstack", $($arg)*) };
    (error, $($arg:tt)*) => { ::log::error!(target: "ipstack", $($arg)*) };
}

macro_rules! net_trace {
    ($($arg:tt)*) => (net_log!(trace, $($arg)*));
}

macro_rules! net_debug {
    ($($arg:tt)*) => (net_log!(debug, $($arg)*));
}

macro_rules! net_warn {
    ($($arg:tt)*) => (net_log!(warn, $($arg)*));
}

macro_rules! net_error {
    ($($arg:tt)*) => (net_log!(error, $($arg)*));
}
