//! Navigation-scoped referrers.

use crate::gc::GcReport;
use crate::store::DataHub;
use crate::types::Referrer;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter shared by every scope so minted tokens never repeat.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Owns the referrer of the navigation currently being served.
///
/// Each new navigation renews the scope, which releases the previous
/// referrer and everything only it held.
#[derive(Debug)]
pub struct ReferrerScope {
    prefix: String,
    current: Referrer,
}

impl ReferrerScope {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let current = mint(&prefix);
        Self { prefix, current }
    }

    pub fn current(&self) -> &Referrer {
        &self.current
    }

    /// Release the current referrer and start a fresh one.
    pub fn renew(&mut self, hub: &DataHub) -> GcReport {
        let report = hub.release(&self.current);
        self.current = mint(&self.prefix);
        report
    }

    /// Release the current referrer for good.
    pub fn finish(self, hub: &DataHub) -> GcReport {
        hub.release(&self.current)
    }
}

fn mint(prefix: &str) -> Referrer {
    let n = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    Referrer::scoped(format!("{prefix}{n}"))
}
