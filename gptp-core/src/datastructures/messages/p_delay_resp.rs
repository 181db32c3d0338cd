use crate::datastructures::{
    common::{PortIdentity, WireTimestamp},
    WireFormat, WireFormatError,
};

/// Body of a Pdelay-Resp message: the peer's receipt timestamp of the
/// originating Pdelay-Req (`t2`) plus the identity of the requestor it is
/// answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PDelayRespMessage {
    pub request_receipt_timestamp: WireTimestamp,
    pub requesting_port_identity: PortIdentity,
}

impl PDelayRespMessage {
    pub const CONTENT_LEN: usize = 20;

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BufferTooShort);
        }
        self.request_receipt_timestamp
            .serialize(&mut buffer[0..10])?;
        self.requesting_port_identity
            .serialize(&mut buffer[10..20])?;
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(PDelayRespMessage {
            request_receipt_timestamp: WireTimestamp::deserialize(&slice[0..10])?,
            requesting_port_identity: PortIdentity::deserialize(&slice[10..20])?,
        })
    }
}
