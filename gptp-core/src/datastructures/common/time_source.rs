/// `timeSource` field of `TimePropertiesDS`, IEEE 1588-2019 Table 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimeSource {
    Atomic = 0x10,
    Gps = 0x20,
    TerrestrialRadio = 0x30,
    Ptp = 0x40,
    Ntp = 0x50,
    HandSet = 0x60,
    Other = 0x90,
    InternalOscillator = 0xA0,
}

impl TryFrom<u8> for TimeSource {
    type Error = crate::datastructures::WireFormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use TimeSource::*;
        Ok(match value {
            0x10 => Atomic,
            0x20 => Gps,
            0x30 => TerrestrialRadio,
            0x40 => Ptp,
            0x50 => Ntp,
            0x60 => HandSet,
            0x90 => Other,
            0xA0 => InternalOscillator,
            _ => return Err(crate::datastructures::WireFormatError::EnumConversionError),
        })
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        TimeSource::InternalOscillator
    }
}
