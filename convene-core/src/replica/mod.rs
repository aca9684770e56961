//! Client-side replica of one meeting event.
//!
//! The replica is owned by the sync worker. Change events and snapshots go
//! in through [`Replica`]; only [`ReplicaSnapshot`]s come out, and those
//! never carry a fuzzy participant's true location.

mod apply;
mod store;
mod view;

pub use apply::{ApplyOutcome, IgnoreReason, Replica};
pub use store::ReplicaStore;
pub use view::{ParticipantView, ReplicaSnapshot};
