// Domain stores: ordered, keyed collections fed by live deltas and bulk resyncs

mod collection;
mod engine;

pub use collection::{AppliedAction, DomainCollection};
pub use engine::{AppliedChange, LiveStore, ResyncSummary};
