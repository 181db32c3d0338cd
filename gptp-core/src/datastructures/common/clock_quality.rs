use crate::datastructures::{WireFormat, WireFormatError};

/// `clockClass` field of a grandmaster's quality, IEEE 1588-2019 Table 5.
pub type ClockClass = u8;

/// `clockAccuracy` field, IEEE 1588-2019 Table 6. `0xFE` means "unknown".
pub type ClockAccuracy = u8;

/// The `(clockClass, clockAccuracy, offsetScaledLogVariance)` triple used in
/// BMCA comparisons and carried in Announce messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct ClockQuality {
    pub clock_class: ClockClass,
    pub clock_accuracy: ClockAccuracy,
    pub offset_scaled_log_variance: u16,
}

impl WireFormat for ClockQuality {
    fn wire_size(&self) -> usize {
        4
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer.get_mut(0..4).ok_or(WireFormatError::BufferTooShort)?;
        slice[0] = self.clock_class;
        slice[1] = self.clock_accuracy;
        slice[2..4].copy_from_slice(&self.offset_scaled_log_variance.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer.get(0..4).ok_or(WireFormatError::BufferTooShort)?;
        Ok(ClockQuality {
            clock_class: slice[0],
            clock_accuracy: slice[1],
            offset_scaled_log_variance: u16::from_be_bytes(slice[2..4].try_into().unwrap()),
        })
    }
}
