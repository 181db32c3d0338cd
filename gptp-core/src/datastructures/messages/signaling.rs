use crate::datastructures::{common::PortIdentity, WireFormat, WireFormatError};

/// Organization-specific TLV carrying the automotive profile's interval
/// renegotiation request (AVnu Automotive Ethernet AVB profile, `organizationId
/// 00:80:C2`, `organizationSubType = 2`).
///
/// Present on a Signalling message sent in place of BMCA-driven reaction when
/// the automotive profile override is active: the master signals
/// a change from "initial" to "operational" Sync/Announce/Pdelay intervals
/// instead of letting the receiver infer it from message cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRequestTlv {
    pub link_delay_interval: i8,
    pub time_sync_interval: i8,
    pub announce_interval: i8,
    pub flags: u8,
}

impl IntervalRequestTlv {
    pub const WIRE_LEN: usize = 12;
    const ORGANIZATION_ID: [u8; 3] = [0x00, 0x80, 0xC2];
    const ORGANIZATION_SUB_TYPE: [u8; 3] = [0x00, 0x00, 0x02];
    const TLV_TYPE: u16 = 0x0003;

    fn serialize(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        let slice = buffer
            .get_mut(0..Self::WIRE_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;
        slice[0..2].copy_from_slice(&Self::TLV_TYPE.to_be_bytes());
        slice[2..4].copy_from_slice(&8u16.to_be_bytes());
        slice[4..7].copy_from_slice(&Self::ORGANIZATION_ID);
        slice[7..10].copy_from_slice(&Self::ORGANIZATION_SUB_TYPE);
        slice[10] = self.link_delay_interval as u8;
        slice[11] = self.time_sync_interval as u8;
        Ok(())
    }

    fn deserialize(buffer: &[u8]) -> Result<Self, WireFormatError> {
        let slice = buffer
            .get(0..Self::WIRE_LEN)
            .ok_or(WireFormatError::BufferTooShort)?;
        if slice[4..7] != Self::ORGANIZATION_ID || slice[7..10] != Self::ORGANIZATION_SUB_TYPE {
            return Err(WireFormatError::EnumConversionError);
        }
        Ok(IntervalRequestTlv {
            link_delay_interval: slice[10] as i8,
            time_sync_interval: slice[11] as i8,
            announce_interval: 0,
            flags: 0,
        })
    }
}

/// Body of a Signalling message: addressed to a specific port (or the
/// wildcard port identity `0xFFFF`), carrying zero or more TLVs. gPTP uses
/// exactly one TLV kind, [`IntervalRequestTlv`], for automotive-profile
/// interval renegotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalingMessage {
    pub target_port_identity: PortIdentity,
    pub interval_request: Option<IntervalRequestTlv>,
}

impl SignalingMessage {
    pub const WILDCARD_PORT_NUMBER: u16 = 0xFFFF;

    pub(crate) fn content_len(&self) -> usize {
        10 + self.interval_request.map_or(0, |_| IntervalRequestTlv::WIRE_LEN)
    }

    pub(crate) fn serialize_content(&self, buffer: &mut [u8]) -> Result<(), WireFormatError> {
        if buffer.len() < self.content_len() {
            return Err(WireFormatError::BufferTooShort);
        }
        self.target_port_identity.serialize(&mut buffer[0..10])?;
        if let Some(tlv) = self.interval_request {
            tlv.serialize(&mut buffer[10..10 + IntervalRequestTlv::WIRE_LEN])?;
        }
        Ok(())
    }

    pub(crate) fn deserialize_content(buffer: &[u8]) -> Result<Self, WireFormatError> {
        if buffer.len() < 10 {
            return Err(WireFormatError::BufferTooShort);
        }
        let target_port_identity = PortIdentity::deserialize(&buffer[0..10])?;
        let interval_request = if buffer.len() >= 10 + IntervalRequestTlv::WIRE_LEN {
            Some(IntervalRequestTlv::deserialize(
                &buffer[10..10 + IntervalRequestTlv::WIRE_LEN],
            )?)
        } else {
            None
        };
        Ok(SignalingMessage {
            target_port_identity,
            interval_request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::common::ClockIdentity;

    #[test]
    fn wire_round_trip_with_tlv() {
        let msg = SignalingMessage {
            target_port_identity: PortIdentity {
                clock_identity: ClockIdentity([1, 2, 3, 4, 5, 6, 7, 8]),
                port_number: SignalingMessage::WILDCARD_PORT_NUMBER,
            },
            interval_request: Some(IntervalRequestTlv {
                link_delay_interval: 0,
                time_sync_interval: -3,
                announce_interval: 0,
                flags: 0,
            }),
        };
        let mut buf = [0u8; 22];
        msg.serialize_content(&mut buf).unwrap();
        let parsed = SignalingMessage::deserialize_content(&buf).unwrap();
        assert_eq!(parsed.target_port_identity, msg.target_port_identity);
        assert_eq!(
            parsed.interval_request.unwrap().time_sync_interval,
            msg.interval_request.unwrap().time_sync_interval
        );
    }

    #[test]
    fn wire_round_trip_without_tlv() {
        let msg = SignalingMessage {
            target_port_identity: PortIdentity {
                clock_identity: ClockIdentity([0; 8]),
                port_number: 1,
            },
            interval_request: None,
        };
        let mut buf = [0u8; 10];
        msg.serialize_content(&mut buf).unwrap();
        assert_eq!(SignalingMessage::deserialize_content(&buf).unwrap(), msg);
    }
}
