//! Wire datastructures as defined by IEEE 802.1AS-2011 / IEEE 1588-2019.

pub mod common;
pub mod messages;

/// Error produced while parsing or building a PTP wire message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum WireFormatError {
    #[cfg_attr(feature = "std", error("buffer too short for this field"))]
    BufferTooShort,
    #[cfg_attr(feature = "std", error("messageLength disagreed with the frame size"))]
    LengthMismatch,
    #[cfg_attr(feature = "std", error("unrecognized value for an enumerated field"))]
    EnumConversionError,
}

/// Common (de)serialization surface implemented by every wire type in
/// [`common`] and [`messages`].
pub(crate) trait WireFormat: Sized {
    /// The byte size this value occupies on the wire.
    fn wire_size(&self) -> usize;

    /// Serialize `self` into the front of `buffer`, which must be at least
    /// [`wire_size`](Self::wire_size) bytes.
    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError>;

    /// Parse a value from the front of `buffer`.
    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError>;
}
