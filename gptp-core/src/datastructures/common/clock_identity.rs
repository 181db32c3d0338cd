use crate::datastructures::{WireFormat, WireFormatError};

/// The identity of a PTP clock: 8 octets, typically derived from the
/// interface MAC address by inserting `FF:FE` in the middle (the EUI-64
/// rule, IEEE 1588-2019 §7.5.2.2.2).
///
/// Orderable lexicographically; used as the final tiebreaker in BMCA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Derive a [`ClockIdentity`] from a MAC address using the EUI-64 rule:
    /// the top three bytes, `FF:FE`, then the bottom three bytes.
    ///
    /// # Example
    /// ```
    /// # use gptp_core::datastructures::common::ClockIdentity;
    /// let id = ClockIdentity::from_mac_address([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    /// assert_eq!(id.0, [0x00, 0x11, 0x22, 0xFF, 0xFE, 0x33, 0x44, 0x55]);
    /// ```
    pub fn from_mac_address(addr: [u8; 6]) -> Self {
        let mut out = [0u8; 8];
        out[0..3].copy_from_slice(&addr[0..3]);
        out[3] = 0xFF;
        out[4] = 0xFE;
        out[5..8].copy_from_slice(&addr[3..6]);
        ClockIdentity(out)
    }
}

impl WireFormat for ClockIdentity {
    fn wire_size(&self) -> usize {
        8
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer.get_mut(0..8).ok_or(WireFormatError::BufferTooShort)?;
        slice.copy_from_slice(&self.0);
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer.get(0..8).ok_or(WireFormatError::BufferTooShort)?;
        Ok(Self(slice.try_into().unwrap()))
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i != 0 {
                write!(f, ":")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eui64_insertion() {
        let id = ClockIdentity::from_mac_address([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert_eq!(id.0, [0xaa, 0xbb, 0xcc, 0xff, 0xfe, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn lexicographic_order() {
        let a = ClockIdentity([0, 0, 0, 0, 0, 0, 0, 1]);
        let b = ClockIdentity([0, 0, 0, 0, 0, 0, 0, 2]);
        assert!(a < b);
    }

    #[test]
    fn wire_round_trip() {
        let id = ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]);
        let mut buf = [0u8; 8];
        id.serialize(&mut buf).unwrap();
        assert_eq!(ClockIdentity::deserialize(&buf).unwrap(), id);
    }
}
