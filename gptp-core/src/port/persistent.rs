//! Opaque byte-stream representation of the fields a port must survive a
//! restart with (a persistence file, reloaded on startup and
//! refreshed on `SIGHUP`).

use crate::time::Duration;

/// Wire length of [`PersistentState::to_bytes`]'s output.
pub const PERSISTENT_STATE_LEN: usize = 18;

/// The handful of fields worth carrying across a restart: re-acquiring them
/// from scratch would otherwise cost a full `asCapable` qualification cycle
/// and servo convergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistentState {
    pub as_capable: bool,
    /// Discriminant of the [`super::PortState`] this was saved from, per
    /// [`super::PortState::persistent_kind`].
    pub port_state_kind: u8,
    pub one_way_delay: Duration,
    pub neighbor_rate_ratio: f64,
}

impl PersistentState {
    pub fn to_bytes(self) -> [u8; PERSISTENT_STATE_LEN] {
        let mut buf = [0u8; PERSISTENT_STATE_LEN];
        buf[0] = self.as_capable as u8;
        buf[1] = self.port_state_kind;
        buf[2..10].copy_from_slice(
            &(self.one_way_delay.nanos().clamp(i64::MIN as i128, i64::MAX as i128) as i64)
                .to_be_bytes(),
        );
        buf[10..18].copy_from_slice(&self.neighbor_rate_ratio.to_be_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; PERSISTENT_STATE_LEN]) -> Self {
        PersistentState {
            as_capable: buf[0] != 0,
            port_state_kind: buf[1],
            one_way_delay: Duration::from_nanos(i64::from_be_bytes(
                buf[2..10].try_into().unwrap(),
            ) as i128),
            neighbor_rate_ratio: f64::from_be_bytes(buf[10..18].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let state = PersistentState {
            as_capable: true,
            port_state_kind: 8,
            one_way_delay: Duration::from_nanos(123_456),
            neighbor_rate_ratio: 1.000_002_3,
        };
        let bytes = state.to_bytes();
        assert_eq!(PersistentState::from_bytes(&bytes), state);
    }
}
