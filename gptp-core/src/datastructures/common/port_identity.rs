use super::ClockIdentity;
use crate::datastructures::{WireFormat, WireFormatError};

/// Identifies a single port of a PTP clock: the clock's identity plus a
/// 1-based port number, network-byte-order on the wire.
///
/// Ordered lexicographically on `(clock_identity, port_number)`, as IEEE 1588
/// requires for BMCA tie-breaking on `senderIdentity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, PartialOrd, Ord, Hash)]
pub struct PortIdentity {
    pub clock_identity: ClockIdentity,
    pub port_number: u16,
}

impl WireFormat for PortIdentity {
    fn wire_size(&self) -> usize {
        10
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer
            .get_mut(0..10)
            .ok_or(WireFormatError::BufferTooShort)?;
        self.clock_identity.serialize(&mut slice[0..8])?;
        slice[8..10].copy_from_slice(&self.port_number.to_be_bytes());
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer.get(0..10).ok_or(WireFormatError::BufferTooShort)?;
        Ok(PortIdentity {
            clock_identity: ClockIdentity::deserialize(&slice[0..8])?,
            port_number: u16::from_be_bytes(slice[8..10].try_into().unwrap()),
        })
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for PortIdentity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}-{}", self.clock_identity, self.port_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let pid = PortIdentity {
            clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
            port_number: 1,
        };
        let mut buf = [0u8; 10];
        pid.serialize(&mut buf).unwrap();
        assert_eq!(buf[8..10], [0x00, 0x01]);
        assert_eq!(PortIdentity::deserialize(&buf).unwrap(), pid);
    }
}
