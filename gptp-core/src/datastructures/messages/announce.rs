use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, TimeSource, WireTimestamp},
    WireFormat, WireFormatError,
};

/// Body of an Announce message: the sender's grandmaster attributes, used
/// as input to BMCA (IEEE 1588-2019 §9.3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceMessage {
    pub origin_timestamp: WireTimestamp,
    pub current_utc_offset: i16,
    pub grandmaster_priority1: u8,
    pub grandmaster_clock_quality: ClockQuality,
    pub grandmaster_priority2: u8,
    pub grandmaster_identity: ClockIdentity,
    pub steps_removed: u16,
    pub time_source: TimeSource,
}

impl Default for AnnounceMessage {
    fn default() -> Self {
        AnnounceMessage {
            origin_timestamp: WireTimestamp::default(),
            current_utc_offset: 37,
            grandmaster_priority1: 128,
            grandmaster_clock_quality: ClockQuality::default(),
            grandmaster_priority2: 128,
            grandmaster_identity: ClockIdentity::default(),
            steps_removed: 0,
            time_source: TimeSource::default(),
        }
    }
}

impl AnnounceMessage {
    pub const CONTENT_LEN: usize = 30;

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < Self::CONTENT_LEN {
            return Err(WireFormatError::BufferTooShort);
        }
        self.origin_timestamp.serialize(&mut buffer[0..10])?;
        buffer[10..12].copy_from_slice(&self.current_utc_offset.to_be_bytes());
        buffer[12] = 0;
        buffer[13] = self.grandmaster_priority1;
        self.grandmaster_clock_quality
            .serialize(&mut buffer[14..18])?;
        buffer[18] = self.grandmaster_priority2;
        self.grandmaster_identity.serialize(&mut buffer[19..27])?;
        buffer[27..29].copy_from_slice(&self.steps_removed.to_be_bytes());
        buffer[29] = self.time_source as u8;
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::CONTENT_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;
        Ok(AnnounceMessage {
            origin_timestamp: WireTimestamp::deserialize(&slice[0..10])?,
            current_utc_offset: i16::from_be_bytes(slice[10..12].try_into().unwrap()),
            grandmaster_priority1: slice[13],
            grandmaster_clock_quality: ClockQuality::deserialize(&slice[14..18])?,
            grandmaster_priority2: slice[18],
            grandmaster_identity: ClockIdentity::deserialize(&slice[19..27])?,
            steps_removed: u16::from_be_bytes(slice[27..29].try_into().unwrap()),
            time_source: TimeSource::try_from(slice[29])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_round_trip() {
        let msg = AnnounceMessage {
            grandmaster_identity: ClockIdentity([9, 8, 7, 6, 5, 4, 3, 2]),
            steps_removed: 3,
            ..Default::default()
        };
        let mut buf = [0u8; AnnounceMessage::CONTENT_LEN];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(AnnounceMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
