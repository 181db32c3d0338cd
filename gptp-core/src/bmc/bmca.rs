//! Best Master Clock Algorithm, run for a single port against its own
//! synthetic dataset and the foreign masters it has heard Announce from
//! best master clock algorithm.

use super::{
    dataset_comparison::{ComparisonDataset, DatasetOrdering, LocalClockDataset},
    foreign_master::ForeignMasterList,
};
use crate::{
    datastructures::{
        common::PortIdentity,
        messages::{AnnounceMessage, Header},
    },
    time::{Duration, Interval},
};

/// The outcome of running BMCA: whether this port should be master of its
/// own grandmaster dataset, or slave to a foreign one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendedState {
    Master,
    Slave {
        master_port_identity: PortIdentity,
        announce: AnnounceMessage,
    },
}

#[derive(Debug)]
pub(crate) struct Bmca {
    foreign_masters: ForeignMasterList,
    own_port_identity: PortIdentity,
}

impl Bmca {
    pub(crate) fn new(own_port_identity: PortIdentity) -> Self {
        Bmca {
            foreign_masters: ForeignMasterList::new(own_port_identity),
            own_port_identity,
        }
    }

    pub(crate) fn step_age(&mut self, step: Duration, announce_interval: Interval) {
        self.foreign_masters.step_age(step, announce_interval);
    }

    pub(crate) fn register_announce(
        &mut self,
        header: &Header,
        announce: &AnnounceMessage,
        announce_interval: Interval,
    ) {
        self.foreign_masters
            .register_announce(header, announce, announce_interval);
    }

    /// Find the best qualified foreign Announce (called Erbest by the
    /// spec), if any.
    fn best_foreign(&mut self) -> Option<(PortIdentity, AnnounceMessage)> {
        self.foreign_masters
            .take_qualified_announces()
            .max_by(|(_, a), (_, b)| {
                let sender_a = PortIdentity {
                    clock_identity: a.grandmaster_identity,
                    port_number: 0,
                };
                let sender_b = PortIdentity {
                    clock_identity: b.grandmaster_identity,
                    port_number: 0,
                };
                ComparisonDataset::from_announce(a, sender_a.clock_identity, sender_a)
                    .compare(&ComparisonDataset::from_announce(
                        b,
                        sender_b.clock_identity,
                        sender_b,
                    ))
                    .as_ordering()
            })
    }

    /// The state decision algorithm, specialized to a single port with no
    /// boundary-clock topology: compare our own dataset (D0) against the
    /// best qualified foreign Announce and recommend the winner.
    pub(crate) fn recommended_state(&mut self, own_data: &LocalClockDataset) -> RecommendedState {
        let d0 = ComparisonDataset::from_local(own_data);

        match self.best_foreign() {
            None => RecommendedState::Master,
            Some((master_port_identity, announce)) => {
                let sender = master_port_identity;
                let candidate = ComparisonDataset::from_announce(
                    &announce,
                    sender.clock_identity,
                    self.own_port_identity,
                );

                match d0.compare(&candidate) {
                    DatasetOrdering::Better | DatasetOrdering::BetterByTopology => {
                        RecommendedState::Master
                    }
                    _ => RecommendedState::Slave {
                        master_port_identity,
                        announce,
                    },
                }
            }
        }
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
    fn no_foreign_masters_recommends_master() {
        let own = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 1,
        };
        let mut bmca = Bmca::new(own);
        let recommendation = bmca.recommended_state(&LocalClockDataset {
            priority1: 128,
            ..Default::default()
        });
        assert_eq!(recommendation, RecommendedState::Master);
    }

    #[test]
    fn better_foreign_master_recommends_slave() {
        let own = PortIdentity {
            clock_identity: ClockIdentity([0; 8]),
            port_number: 1,
        };
        let mut bmca = Bmca::new(own);
        let better = AnnounceMessage {
            grandmaster_priority1: 1,
            grandmaster_identity: ClockIdentity([9; 8]),
            ..Default::default()
        };
        let sender = ClockIdentity([9; 8]);
        bmca.register_announce(&header(sender, 1), &better, Interval::ONE_SECOND);
        bmca.register_announce(&header(sender, 2), &better, Interval::ONE_SECOND);

        let recommendation = bmca.recommended_state(&LocalClockDataset {
            priority1: 128,
            clock_identity: ClockIdentity([0; 8]),
            ..Default::default()
        });
        assert!(matches!(recommendation, RecommendedState::Slave { .. }));
    }
}
