use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Body of a Pdelay-Req message. The origin timestamp is conventionally
/// zero; only its hardware-captured TX timestamp (`t1`) matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PDelayReqMessage {
    pub origin_timestamp: WireTimestamp,
}

impl PDelayReqMessage {
    pub const CONTENT_LEN: usize = 20;

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..20].fill(0);
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(PDelayReqMessage {
            origin_timestamp: WireTimestamp::deserialize(slice)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let msg = PDelayReqMessage {
            origin_timestamp: WireTimestamp {
                seconds_ms: 0,
                seconds_ls: 1_169_232_218,
                nanoseconds: 174_389_936,
            },
        };
        let mut buf = [0u8; PDelayReqMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(PDelayReqMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
