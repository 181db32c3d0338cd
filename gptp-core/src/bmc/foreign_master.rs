//! Tracks other clocks this port has heard Announce from, and qualifies
//! them for BMCA consideration.

use arrayvec::ArrayVec;

use crate::{
    datastructures::{
        common::PortIdentity,
        messages::{AnnounceMessage, Header},
    },
    time::{Duration, Interval},
};

/// Width, in announce intervals, of the window an Announce must keep
/// arriving within to stay qualified.
const FOREIGN_MASTER_TIME_WINDOW: u32 = 4;

/// Minimum Announce count within the window for a foreign master to
/// qualify for selection.
const FOREIGN_MASTER_THRESHOLD: usize = 2;

const MAX_ANNOUNCE_MESSAGES: usize = 8;
const MAX_FOREIGN_MASTERS: usize = 8;

#[derive(Debug)]
struct RecordedAnnounce {
    message: AnnounceMessage,
    sequence_id: u16,
    age: Duration,
}

#[derive(Debug)]
struct ForeignMaster {
    port_identity: PortIdentity,
    announces: ArrayVec<RecordedAnnounce, MAX_ANNOUNCE_MESSAGES>,
}

impl ForeignMaster {
    fn new(header: &Header, message: AnnounceMessage) -> Self {
        let mut announces = ArrayVec::new();
        announces.push(RecordedAnnounce {
            message,
            sequence_id: header.sequence_id,
            age: Duration::ZERO,
        });
        ForeignMaster {
            port_identity: header.source_port_identity,
            announces,
        }
    }

    fn purge_old(&mut self, cutoff: Duration) -> bool {
        self.announces.retain(|a| a.age < cutoff);
        self.announces.is_empty()
    }

    fn register(&mut self, header: &Header, message: AnnounceMessage, cutoff: Duration) {
        self.purge_old(cutoff);
        let record = RecordedAnnounce {
            message,
            sequence_id: header.sequence_id,
            age: Duration::ZERO,
        };
        if self.announces.try_push(record).is_err() {
            self.announces.remove(0);
            self.announces.push(RecordedAnnounce {
                message,
                sequence_id: header.sequence_id,
                age: Duration::ZERO,
            });
        }
    }

    fn step_age(&mut self, step: Duration, cutoff: Duration) -> bool {
        for a in &mut self.announces {
            a.age += step;
        }
        self.purge_old(cutoff)
    }
}

/// The set of candidate grandmasters this port currently considers, keyed
/// by the source port identity of their Announce messages.
#[derive(Debug)]
pub(crate) struct ForeignMasterList {
    foreign_masters: ArrayVec<ForeignMaster, MAX_FOREIGN_MASTERS>,
    own_port_identity: PortIdentity,
}

impl ForeignMasterList {
    pub(crate) fn new(own_port_identity: PortIdentity) -> Self {
        ForeignMasterList {
            foreign_masters: ArrayVec::new(),
            own_port_identity,
        }
    }

    fn cutoff(announce_interval: Interval) -> Duration {
        announce_interval.as_duration() * FOREIGN_MASTER_TIME_WINDOW as i32
    }

    pub(crate) fn step_age(&mut self, step: Duration, announce_interval: Interval) {
        let cutoff = Self::cutoff(announce_interval);
        for i in (0..self.foreign_masters.len()).rev() {
            if self.foreign_masters[i].step_age(step, cutoff) {
                self.foreign_masters.remove(i);
            }
        }
    }

    /// Register a newly received, already-validated Announce. Drops it
    /// silently if it is not qualified (own instance, stale sequence, or
    /// `stepsRemoved >= 255`).
    pub(crate) fn register_announce(
        &mut self,
        header: &Header,
        message: &AnnounceMessage,
        announce_interval: Interval,
    ) {
        if !self.is_qualified(header, message) {
            return;
        }
        let cutoff = Self::cutoff(announce_interval);
        if let Some(fm) = self
            .foreign_masters
            .iter_mut()
            .find(|fm| fm.port_identity == header.source_port_identity)
        {
            fm.register(header, *message, cutoff);
        } else if self.foreign_masters.len() < MAX_FOREIGN_MASTERS {
            self.foreign_masters.push(ForeignMaster::new(header, *message));
        }
    }

    /// Yields the most recent Announce of every foreign master that has
    /// accumulated at least [`FOREIGN_MASTER_THRESHOLD`] messages within
    /// the time window, consuming them from the list's history.
    pub(crate) fn take_qualified_announces(
        &mut self,
    ) -> impl Iterator<Item = (PortIdentity, AnnounceMessage)> + '_ {
        self.foreign_masters.iter_mut().filter_map(|fm| {
            if fm.announces.len() >= FOREIGN_MASTER_THRESHOLD {
                fm.announces.last().map(|a| (fm.port_identity, a.message))
            } else {
                None
            }
        })
    }

    fn is_qualified(&self, header: &Header, message: &AnnounceMessage) -> bool {
        let source = header.source_port_identity;

        if source.clock_identity == self.own_port_identity.clock_identity {
            return false;
        }

        if let Some(fm) = self
            .foreign_masters
            .iter()
            .find(|fm| fm.port_identity == source)
        {
            if let Some(last) = fm.announces.last() {
                if header.sequence_id.wrapping_sub(last.sequence_id) >= u16::MAX / 2 {
                    return false;
                }
            }
        }

        message.steps_removed < 255
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastructures::{common::ClockIdentity, messages::MessageType};

    fn header(sender: ClockIdentity, sequence_id: u16) -> Header {
        Header {
            transport_specific: 1,
            message_type: MessageType::Announce,
            version_ptp: 2,
            message_length: 64,
            domain_number: 0,
            flag_field: 0,
            correction_field: Duration::ZERO,
            source_port_identity: PortIdentity {
                clock_identity: sender,
                port_number: 1,
            },
            sequence_id,
            control_field: 0,
            log_message_interval: 0,
        }
    }

    #[test]
    fn does_not_qualify_until_threshold_reached() {
        let own = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 1,
        };
        let mut list = ForeignMasterList::new(own);
        let sender = ClockIdentity([1; 8]);
        let msg = AnnounceMessage::default();

        list.register_announce(&header(sender, 1), &msg, Interval::ONE_SECOND);
        assert_eq!(list.take_qualified_announces().count(), 0);

        list.register_announce(&header(sender, 2), &msg, Interval::ONE_SECOND);
        assert_eq!(list.take_qualified_announces().count(), 1);
    }

    #[test]
    fn rejects_own_clock_identity() {
        let own = PortIdentity {
            clock_identity: ClockIdentity([1; 8]),
            port_number: 1,
        };
        let mut list = ForeignMasterList::new(own);
        list.register_announce(
            &header(ClockIdentity([1; 8]), 1),
            &AnnounceMessage::default(),
            Interval::ONE_SECOND,
        );
        assert!(list.foreign_masters.is_empty());
    }

    #[test]
    fn aging_out_drops_foreign_master() {
        let own = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 1,
        };
        let mut list = ForeignMasterList::new(own);
        let sender = ClockIdentity([1; 8]);
        list.register_announce(&header(sender, 1), &AnnounceMessage::default(), Interval::ONE_SECOND);
        list.step_age(Duration::from_secs(10), Interval::ONE_SECOND);
        assert!(list.foreign_masters.is_empty());
    }
}
