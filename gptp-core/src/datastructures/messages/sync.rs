use crate::datastructures::{common::WireTimestamp, WireFormat, WireFormatError};

/// Body of a Sync message.
///
/// For a one-step port the `origin_timestamp` is the precise time of
/// transmission. For a two-step port (the only kind gPTP actually uses) it
/// is a coarse estimate and the precise value follows in the paired
/// Follow-Up message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncMessage {
    pub origin_timestamp: WireTimestamp,
}

impl SyncMessage {
    pub const CONTENT_LEN: usize = 10;

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        self.origin_timestamp.serialize(buffer)
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        Ok(SyncMessage {
            origin_timestamp: WireTimestamp::deserialize(buffer)?,
        })
    }
}
