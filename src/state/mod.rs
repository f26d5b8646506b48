//! Hub state: entity records plus the referrer indices that keep them alive.
//!
//! Every mutation produces a new [`HubState`] from the previous one, so a
//! reader holding a snapshot never observes a half-applied write.

mod referrers;
mod snapshot;

pub use referrers::ReferrerIndex;
pub use snapshot::{HubState, Record};
