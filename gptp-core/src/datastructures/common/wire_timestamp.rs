use crate::{
    datastructures::{WireFormat, WireFormatError},
    time::Time,
};

/// The 80-bit PTP `Timestamp` structure: 48-bit seconds (split into a
/// 16-bit "most significant" half and a 32-bit "least significant" half on
/// the wire) plus 32-bit nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WireTimestamp {
    pub seconds_ms: u16,
    pub seconds_ls: u32,
    pub nanoseconds: u32,
}

impl WireTimestamp {
    pub fn to_time(self) -> Time {
        Time::from_wire(self.seconds_ms, self.seconds_ls, self.nanoseconds)
    }

    pub fn from_time(time: Time) -> Self {
        let (seconds_ms, seconds_ls, nanoseconds) = time.to_wire();
        WireTimestamp {
            seconds_ms,
            seconds_ls,
            nanoseconds,
        }
    }
}

impl From<Time> for WireTimestamp {
    fn from(value: Time) -> Self {
        WireTimestamp::from_time(value)
    }
}

impl From<WireTimestamp> for Time {
    fn from(value: WireTimestamp) -> Self {
        value.to_time()
    }
}

impl WireFormat for WireTimestamp {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer
            .get_mut(0..10)
            .ok_or(WireFormatError::BufferTooShort)?;
        slice[0..2].copy_from_slice(&self.seconds_ms.to_be_bytes());
        slice[2..6].copy_from_slice(&self.seconds_ls.to_be_bytes());
        slice[6..10].copy_from_slice(&self.nanoseconds.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer.get(0..10).ok_or(WireFormatError::BufferTooShort)?;
        Ok(WireTimestamp {
            seconds_ms: u16::from_be_bytes(slice[0..2].try_into().unwrap()),
            seconds_ls: u32::from_be_bytes(slice[2..6].try_into().unwrap()),
            nanoseconds: u32::from_be_bytes(slice[6..10].try_into().unwrap()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let ts = WireTimestamp {
            seconds_ms: 0x0001,
            seconds_ls: 0x7fffffff,
            nanoseconds: 999_999_999,
        };
        let mut buf = [0u8; 10];
        ts.serialize(&mut buf).unwrap();
        assert_eq!(WireTimestamp::deserialize(&buf).unwrap(), ts);
    }

    #[test]
    fn time_round_trip() {
        let ts = WireTimestamp {
            seconds_ms: 2,
            seconds_ls: 12345,
            nanoseconds: 6789,
        };
        assert_eq!(WireTimestamp::from_time(ts.to_time()), ts);
    }
}
