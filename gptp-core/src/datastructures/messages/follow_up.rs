use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Body of a Follow-Up message: the precise transmit timestamp of the Sync
/// it is paired with (matched by sequence id, see [`super::Header`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FollowUpMessage {
    pub precise_origin_timestamp: WireTimestamp,
}

impl FollowUpMessage {
    pub const CONTENT_LEN: usize = 10;

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.precise_origin_timestamp.serialize(buffer)
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(FollowUpMessage {
            precise_origin_timestamp: WireTimestamp::deserialize(buffer)?,
        })
    }
}
