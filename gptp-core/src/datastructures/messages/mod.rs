//! The six PTP message types gPTP exchanges, plus Signalling, and the
//! [`Message`] envelope that ties a [`Header`] to its body.

mod announce;
mod follow_up;
mod header;
mod p_delay_req;
mod p_delay_resp;
mod p_delay_resp_follow_up;
mod signaling;
mod sync;

pub use announce::AnnounceMessage;
pub use follow_up::FollowUpMessage;
pub use header::{Header, HEADER_LEN};
pub use p_delay_req::PDelayReqMessage;
pub use p_delay_resp::PDelayRespMessage;
pub use p_delay_resp_follow_up::PDelayRespFollowUpMessage;
pub use signaling::{IntervalRequestTlv, SignalingMessage};
pub use sync::SyncMessage;

use super::WireFormatError;

/// The `messageType` nibble of the common header (IEEE 1588-2019 Table 34).
/// Only the variants gPTP actually uses carry a body in [`MessageBody`];
/// `Management` is recognized so the codec does not reject a frame it
/// receives, but is never constructed or forwarded (spec's Non-goals
/// exclude the management protocol).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Sync = 0x0,
    DelayReq = 0x1,
    PDelayReq = 0x2,
    PDelayResp = 0x3,
    FollowUp = 0x8,
    DelayResp = 0x9,
    PDelayRespFollowUp = 0xA,
    Announce = 0xB,
    Signaling = 0xC,
    Management = 0xD,
}

impl TryFrom<u8> for MessageType {
    type Error = WireFormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value & 0x0F {
            0x0 => Sync,
            0x1 => DelayReq,
            0x2 => PDelayReq,
            0x3 => PDelayResp,
            0x8 => FollowUp,
            0x9 => DelayResp,
            0xA => PDelayRespFollowUp,
            0xB => Announce,
            0xC => Signaling,
            0xD => Management,
            _ => return Err(WireFormatError::EnumConversionError),
        })
    }
}

/// The body of a parsed message, tagged by the variant the codec
/// recognized. Carries no [`Header`] — callers match on this together with
/// the header they already have from [`Message::deserialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageBody {
    Sync(SyncMessage),
    FollowUp(FollowUpMessage),
    PDelayReq(PDelayReqMessage),
    PDelayResp(PDelayRespMessage),
    PDelayRespFollowUp(PDelayRespFollowUpMessage),
    Announce(AnnounceMessage),
    Signaling(SignalingMessage),
}

impl MessageBody {
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::Sync(_) => MessageType::Sync,
            MessageBody::FollowUp(_) => MessageType::FollowUp,
            MessageBody::PDelayReq(_) => MessageType::PDelayReq,
            MessageBody::PDelayResp(_) => MessageType::PDelayResp,
            MessageBody::PDelayRespFollowUp(_) => MessageType::PDelayRespFollowUp,
            MessageBody::Announce(_) => MessageType::Announce,
            MessageBody::Signaling(_) => MessageType::Signaling,
        }
    }

    fn content_len(&self) -> usize {
        match self {
            MessageBody::Sync(_) => SyncMessage::CONTENT_LEN,
            MessageBody::FollowUp(_) => FollowUpMessage::CONTENT_LEN,
            MessageBody::PDelayReq(_) => PDelayReqMessage::CONTENT_LEN,
            MessageBody::PDelayResp(_) => PDelayRespMessage::CONTENT_LEN,
            MessageBody::PDelayRespFollowUp(_) => PDelayRespFollowUpMessage::CONTENT_LEN,
            MessageBody::Announce(_) => AnnounceMessage::CONTENT_LEN,
            MessageBody::Signaling(msg) => msg.content_len(),
        }
    }

    fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        match self {
            MessageBody::Sync(msg) => msg.serialize_content(buffer),
            MessageBody::FollowUp(msg) => msg.serialize_content(buffer),
            MessageBody::PDelayReq(msg) => msg.serialize_content(buffer),
            MessageBody::PDelayResp(msg) => msg.serialize_content(buffer),
            MessageBody::PDelayRespFollowUp(msg) => msg.serialize_content(buffer),
            MessageBody::Announce(msg) => msg.serialize_content(buffer),
            MessageBody::Signaling(msg) => msg.serialize_content(buffer),
        }
    }

    fn deserialize_content(
        message_type: MessageType,
        buffer: &[u8],
    ) -> Result<Self, WireFormatError> {
        Ok(match message_type {
            MessageType::Sync => MessageBody::Sync(SyncMessage::deserialize_content(buffer)?),
            MessageType::FollowUp => {
                MessageBody::FollowUp(FollowUpMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayReq => {
                MessageBody::PDelayReq(PDelayReqMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayResp => {
                MessageBody::PDelayResp(PDelayRespMessage::deserialize_content(buffer)?)
            }
            MessageType::PDelayRespFollowUp => MessageBody::PDelayRespFollowUp(
                PDelayRespFollowUpMessage::deserialize_content(buffer)?,
            ),
            MessageType::Announce => {
                MessageBody::Announce(AnnounceMessage::deserialize_content(buffer)?)
            }
            MessageType::Signaling => {
                MessageBody::Signaling(SignalingMessage::deserialize_content(buffer)?)
            }
            MessageType::DelayReq | MessageType::DelayResp | MessageType::Management => {
                return Err(WireFormatError::EnumConversionError)
            }
        })
    }
}

/// A complete PTP message: header plus body, as received or about to be
/// transmitted on one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: MessageBody,
}

impl Message {
    /// Serialize into `buffer`, writing the header's `message_length` to
    /// match the actual encoded size.
    pub fn serialize(&self, buffer: &mut [u8]) -> Result<usize, WireFormatError> {
        use super::WireFormat;

        let total_len = HEADER_LEN + self.body.content_len();
        if buffer.len() < total_len {
            return Err(WireFormatError::BufferTooShort);
        }

        let mut header = self.header;
        header.message_length = total_len as u16;
        header.serialize(&mut buffer[0..HEADER_LEN])?;
        self.body
            .serialize_content(&mut buffer[HEADER_LEN..total_len])?;

        Ok(total_len)
    }

    /// Parse a message from a received frame. Rejects a frame whose
    /// `messageLength` field disagrees with the number of bytes actually
    /// received: the caller increments `RxPTPPacketDiscard` on
    /// [`WireFormatError::LengthMismatch`].
    pub fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        use super::WireFormat;

        let header = Header::deserialize(buffer)?;
        if header.message_length as usize != buffer.len() {
            return Err(WireFormatError::LengthMismatch);
        }

        let body =
            MessageBody::deserialize_content(header.message_type, &buffer[HEADER_LEN..])?;
        Ok(Message { header, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        datastructures::common::{ClockIdentity, PortIdentity, WireTimestamp},
        time::Duration,
    };

    fn header(message_type: MessageType) -> Header {
        Header {
            transport_specific: 1,
            message_type,
            version_ptp: 2,
            message_length: 0,
            domain_number: 0,
            flag_field: 0x0002,
            correction_field: Duration::ZERO,
            source_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: 1,
            },
            sequence_id: 7,
            control_field: 0,
            log_message_interval: 0,
        }
    }

    #[test]
    fn round_trip_sync() {
        let msg = Message {
            header: header(MessageType::Sync),
            body: MessageBody::Sync(SyncMessage {
                origin_timestamp: WireTimestamp::default(),
            }),
        };
        let mut buf = [0u8; 64];
        let len = msg.serialize(&mut buf).unwrap();
        let parsed = Message::deserialize(&buf[..len]).unwrap();
        assert_eq!(parsed.body, msg.body);
        assert_eq!(parsed.header.message_length as usize, len);
    }

    #[test]
    fn rejects_length_mismatch() {
        let msg = Message {
            header: header(MessageType::Announce),
            body: MessageBody::Announce(AnnounceMessage::default()),
        };
        let mut buf = [0u8; 64];
        let len = msg.serialize(&mut buf).unwrap();
        let err = Message::deserialize(&buf[..len - 1]).unwrap_err();
        assert_eq!(err, WireFormatError::LengthMismatch);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert_eq!(
            MessageType::try_from(0xF).unwrap_err(),
            WireFormatError::EnumConversionError
        );
    }
}
