//! Best Master Clock Algorithm (IEEE 1588-2019 §9.3), implemented at
//! single-port scope (no boundary-clock topology).

mod acceptable_master;
mod bmca;
mod dataset_comparison;
mod foreign_master;

pub use acceptable_master::{AcceptAnyMaster, AcceptableMasterList};
pub(crate) use bmca::Bmca;
pub use bmca::RecommendedState;
pub use dataset_comparison::LocalClockDataset;
