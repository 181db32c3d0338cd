//! IEEE 1588-2019 §9.3.4 data set comparison algorithm.

use core::cmp::Ordering;

use crate::datastructures::{
    common::{ClockIdentity, ClockQuality, PortIdentity},
    messages::AnnounceMessage,
};

/// The attributes a grandmaster candidate is judged on, gathered either
/// from a received Announce or from this instance's own clock dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocalClockDataset {
    pub priority1: u8,
    pub clock_quality: ClockQuality,
    pub priority2: u8,
    pub clock_identity: ClockIdentity,
}

/// The full comparison record used by [`ComparisonDataset::compare`],
/// combining the grandmaster attributes with the sender/receiver identities
/// the topology-tiebreak rules (Figure 35) need.
#[derive(Debug, Eq, PartialEq, Default)]
pub(crate) struct ComparisonDataset {
    gm_priority1: u8,
    gm_identity: ClockIdentity,
    gm_clock_quality: ClockQuality,
    gm_priority2: u8,
    steps_removed: u16,
    identity_of_sender: ClockIdentity,
    identity_of_receiver: PortIdentity,
}

impl ComparisonDataset {
    pub(crate) fn from_announce(
        message: &AnnounceMessage,
        sender_clock_identity: ClockIdentity,
        receiver_port_identity: PortIdentity,
    ) -> Self {
        ComparisonDataset {
            gm_priority1: message.grandmaster_priority1,
            gm_identity: message.grandmaster_identity,
            gm_clock_quality: message.grandmaster_clock_quality,
            gm_priority2: message.grandmaster_priority2,
            steps_removed: message.steps_removed,
            identity_of_sender: sender_clock_identity,
            identity_of_receiver: receiver_port_identity,
        }
    }

    pub(crate) fn from_local(data: &LocalClockDataset) -> Self {
        ComparisonDataset {
            gm_priority1: data.priority1,
            gm_identity: data.clock_identity,
            gm_clock_quality: data.clock_quality,
            gm_priority2: data.priority2,
            steps_removed: 0,
            identity_of_sender: data.clock_identity,
            identity_of_receiver: PortIdentity {
                clock_identity: data.clock_identity,
                port_number: 0,
            },
        }
    }

    /// Ordering of `self` relative to `other`: [`DatasetOrdering::Better`]
    /// means `self` should be preferred as grandmaster.
    pub(crate) fn compare(&self, other: &Self) -> DatasetOrdering {
        if self.gm_identity == other.gm_identity {
            self.compare_same_identity(other)
        } else {
            self.compare_different_identity(other)
        }
    }

    /// Figure 34: candidates advertise different grandmasters.
    fn compare_different_identity(&self, other: &Self) -> DatasetOrdering {
        let ordering = self
            .gm_priority1
            .cmp(&other.gm_priority1)
            .then_with(|| {
                self.gm_clock_quality
                    .clock_class
                    .cmp(&other.gm_clock_quality.clock_class)
            })
            .then_with(|| {
                self.gm_clock_quality
                    .clock_accuracy
                    .cmp(&other.gm_clock_quality.clock_accuracy)
            })
            .then_with(|| {
                self.gm_clock_quality
                    .offset_scaled_log_variance
                    .cmp(&other.gm_clock_quality.offset_scaled_log_variance)
            })
            .then_with(|| self.gm_priority2.cmp(&other.gm_priority2))
            .then_with(|| self.gm_identity.cmp(&other.gm_identity));

        match ordering {
            Ordering::Equal => unreachable!("gm_identity is guaranteed to differ here"),
            Ordering::Less => DatasetOrdering::Better,
            Ordering::Greater => DatasetOrdering::Worse,
        }
    }

    /// Figure 35: candidates advertise the same grandmaster, so topology
    /// (steps removed, sender/receiver identity) breaks the tie.
    fn compare_same_identity(&self, other: &Self) -> DatasetOrdering {
        let steps_removed_difference = self.steps_removed as i32 - other.steps_removed as i32;

        match steps_removed_difference {
            2..=i32::MAX => DatasetOrdering::Worse,
            i32::MIN..=-2 => DatasetOrdering::Better,
            1 => match self
                .identity_of_receiver
                .clock_identity
                .cmp(&self.identity_of_sender)
            {
                Ordering::Less => DatasetOrdering::Worse,
                Ordering::Equal => DatasetOrdering::Error1,
                Ordering::Greater => DatasetOrdering::WorseByTopology,
            },
            -1 => match other
                .identity_of_receiver
                .clock_identity
                .cmp(&other.identity_of_sender)
            {
                Ordering::Less => DatasetOrdering::Better,
                Ordering::Equal => DatasetOrdering::Error1,
                Ordering::Greater => DatasetOrdering::BetterByTopology,
            },
            0 => {
                let senders = self.identity_of_sender.cmp(&other.identity_of_sender);
                let receivers = self
                    .identity_of_receiver
                    .port_number
                    .cmp(&other.identity_of_receiver.port_number);

                match senders.then(receivers) {
                    Ordering::Less => DatasetOrdering::BetterByTopology,
                    Ordering::Equal => DatasetOrdering::Error2,
                    Ordering::Greater => DatasetOrdering::WorseByTopology,
                }
            }
            _ => unreachable!(),
        }
    }
}

/// Result of comparing two [`ComparisonDataset`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetOrdering {
    Better,
    BetterByTopology,
    /// Equal quality and topology; the algorithm offers no preference.
    Error1,
    /// Likely the same underlying data reaching the receiver twice.
    Error2,
    WorseByTopology,
    Worse,
}

impl DatasetOrdering {
    pub const fn as_ordering(self) -> Ordering {
        match self {
            DatasetOrdering::Better | DatasetOrdering::BetterByTopology => Ordering::Greater,
            DatasetOrdering::Error1 | DatasetOrdering::Error2 => Ordering::Equal,
            DatasetOrdering::WorseByTopology | DatasetOrdering::Worse => Ordering::Less,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_A: ClockIdentity = ClockIdentity([1, 1, 1, 1, 1, 1, 1, 1]);
    const IDENTITY_B: ClockIdentity = ClockIdentity([2, 2, 2, 2, 2, 2, 2, 2]);
    const IDENTITY_C: ClockIdentity = ClockIdentity([3, 3, 3, 3, 3, 3, 3, 3]);

    fn pair() -> (ComparisonDataset, ComparisonDataset) {
        Default::default()
    }

    #[test]
    fn different_identity_priority1_decides() {
        let (mut a, mut b) = pair();
        a.gm_identity = IDENTITY_A;
        b.gm_identity = IDENTITY_B;
        a.gm_priority1 = 1;
        b.gm_priority1 = 0;

        assert_eq!(a.compare(&b), DatasetOrdering::Worse);
        assert_eq!(b.compare(&a), DatasetOrdering::Better);
    }

    #[test]
    fn different_identity_falls_through_to_clock_quality() {
        let (mut a, mut b) = pair();
        a.gm_identity = IDENTITY_A;
        b.gm_identity = IDENTITY_B;
        a.gm_clock_quality.clock_class = 0;
        b.gm_clock_quality.clock_class = 1;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);
    }

    #[test]
    fn same_identity_topology_tiebreak() {
        let (mut a, mut b) = pair();
        assert_eq!(a.compare(&b), DatasetOrdering::Error2);

        a.identity_of_sender = IDENTITY_A;
        b.identity_of_sender = IDENTITY_B;
        a.identity_of_receiver.clock_identity = IDENTITY_B;
        b.identity_of_receiver.clock_identity = IDENTITY_A;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);
    }

    #[test]
    fn steps_removed_difference_of_two_or_more_always_decides() {
        let (mut a, mut b) = pair();
        a.steps_removed = 0;
        b.steps_removed = 2;

        assert_eq!(a.compare(&b), DatasetOrdering::Better);
        assert_eq!(b.compare(&a), DatasetOrdering::Worse);
        let _ = IDENTITY_C;
    }
}
