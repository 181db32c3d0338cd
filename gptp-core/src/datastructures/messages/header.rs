use super::MessageType;
use crate::{
    datastructures::{common::PortIdentity, WireFormat, WireFormatError},
    time::Duration,
};

/// Size in octets of the common PTP header (IEEE 1588-2019 Table 35).
pub const HEADER_LEN: usize = 34;

/// The 34-octet header shared by every PTP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub transport_specific: u8,
    pub message_type: MessageType,
    pub version_ptp: u8,
    /// Total length of the message (header + body + suffix) in octets.
    pub message_length: u16,
    pub domain_number: u8,
    pub flag_field: u16,
    pub correction_field: Duration,
    pub source_port_identity: PortIdentity,
    pub sequence_id: u16,
    pub control_field: u8,
    /// Log2 of the seconds between repetitions of this message type.
    /// `-127` means "not applicable"/disabled.
    pub log_message_interval: i8,
}

impl Header {
    pub fn two_step_flag(&self) -> bool {
        self.flag_field & 0x0002 != 0
    }

    pub fn set_two_step_flag(&mut self, two_step: bool) {
        if two_step {
            self.flag_field |= 0x0002;
        } else {
            self.flag_field &= !0x0002;
        }
    }
}

impl WireFormat for Header {
    fn wire_size(&self) -> usize {
        HEADER_LEN
    }

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer
            .get_mut(0..HEADER_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;

        slice[0] = (self.transport_specific << 4) | (self.message_type as u8 & 0x0F);
        slice[1] = self.version_ptp & 0x0F;
        slice[2..4].copy_from_slice(&self.message_length.to_be_bytes());
        slice[4] = self.domain_number;
        slice[5] = 0;
        slice[6..8].copy_from_slice(&self.flag_field.to_be_bytes());
        slice[8..16].copy_from_slice(&self.correction_field.to_correction_field().to_be_bytes());
        slice[16..20].fill(0);
        self.source_port_identity.serialize(&mut slice[20..30])?;
        slice[30..32].copy_from_slice(&self.sequence_id.to_be_bytes());
        slice[32] = self.control_field;
        slice[33] = self.log_message_interval as u8;

        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..HEADER_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;

        let message_type = MessageType::try_from(slice[0] & 0x0F)?;

        Ok(Header {
            transport_specific: slice[0] >> 4,
            message_type,
            version_ptp: slice[1] & 0x0F,
            message_length: u16::from_be_bytes(slice[2..4].try_into().unwrap()),
            domain_number: slice[4],
            flag_field: u16::from_be_bytes(slice[6..8].try_into().unwrap()),
            correction_field: Duration::from_correction_field(i64::from_be_bytes(
                slice[8..16].try_into().unwrap(),
            )),
            source_port_identity: PortIdentity::deserialize(&slice[20..30])?,
            sequence_id: u16::from_be_bytes(slice[30..32].try_into().unwrap()),
            control_field: slice[32],
            log_message_interval: slice[33] as i8,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    fn sample() -> Header {
        Header {
            transport_specific: 1,
            message_type: MessageType::Sync,
            version_ptp: 2,
            message_length: 44,
            domain_number: 0,
            flag_field: 0x0002,
            correction_field: Duration::from_nanos(1234),
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
            sequence_id: 42,
            control_field: 0,
            log_message_interval: 0,
        }
    }

    #[test]
    fn wire_round_trip() {
        let header = sample();
        let mut buf = [0u8; HEADER_LEN];
        header.serialize(&mut buf).unwrap();
        assert_eq!(Header::deserialize(&buf).unwrap(), header);
    }

    #[test]
    fn two_step_flag_roundtrip() {
        let mut header = sample();
        header.set_two_step_flag(false);
        assert!(!header.two_step_flag());
        header.set_two_step_flag(true);
        assert!(header.two_step_flag());
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = [0u8; HEADER_LEN - 1];
        assert_eq!(
            Header::deserialize(&buf).unwrap_err(),
            WireFormatError::BufferTooShort
        );
    }
}
