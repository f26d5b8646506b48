//! Referrer-scoped garbage collection.
//!
//! Releasing a referrer is a reference-count decrement over every entity it
//! held. An entity whose last referrer goes away is deleted immediately.

use crate::state::HubState;
use crate::types::{EntityKey, Referrer};

/// Outcome of releasing one referrer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GcReport {
    /// The referrer was live before the release.
    pub released: bool,
    /// Entities deleted because no referrer holds them anymore.
    pub evicted: Vec<EntityKey>,
}

/// Release `referrer` from `state`, deleting entities it alone kept alive.
///
/// The persistent referrer and unknown referrers are no-ops.
pub fn collect(state: &mut HubState, referrer: &Referrer) -> GcReport {
    if referrer.is_persistent() || state.referrers().entities_of(referrer).is_none() {
        return GcReport::default();
    }

    // Tags can outlive or precede their record; only report real deletions.
    let evicted = state
        .referrers_mut()
        .detach(referrer)
        .into_iter()
        .filter(|key| state.remove_record(key).is_some())
        .collect();

    GcReport {
        released: true,
        evicted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Record;

    fn held(state: &mut HubState, key: &EntityKey, referrers: &[&str]) {
        state.put_record(key.clone(), Record::new());
        let referrers = referrers.iter().map(|r| Referrer::from(*r)).collect();
        state.referrers_mut().link(key, &referrers);
    }

    #[test]
    fn test_collect_evicts_at_zero() {
        let mut state = HubState::new();
        let place = EntityKey::new("Place", 1);
        let country = EntityKey::new("Country", 9);
        held(&mut state, &place, &["nav-A"]);
        held(&mut state, &country, &["nav-A", "nav-B"]);

        let report = collect(&mut state, &Referrer::from("nav-A"));
        assert!(report.released);
        assert_eq!(report.evicted, vec![place.clone()]);
        assert!(!state.contains(&place));
        assert!(state.contains(&country));

        let report = collect(&mut state, &Referrer::from("nav-B"));
        assert_eq!(report.evicted, vec![country.clone()]);
        assert_eq!(state.entity_count(), 0);
    }

    #[test]
    fn test_collect_reports_only_deleted_records() {
        let mut state = HubState::new();
        let stored = EntityKey::new("Place", 1);
        let tagged_only = EntityKey::new("Place", 2);
        held(&mut state, &stored, &["nav-A"]);
        state
            .referrers_mut()
            .link(&tagged_only, &im::HashSet::unit(Referrer::from("nav-A")));

        let report = collect(&mut state, &Referrer::from("nav-A"));
        assert!(report.released);
        assert_eq!(report.evicted, vec![stored]);
        assert!(state.referrers().referrers_of(&tagged_only).is_none());
    }

    #[test]
    fn test_collect_noops() {
        let mut state = HubState::new();
        let key = EntityKey::new("Country", 9);
        held(&mut state, &key, &[""]);

        assert_eq!(collect(&mut state, &Referrer::Persistent), GcReport::default());
        assert_eq!(collect(&mut state, &Referrer::from("nav-X")), GcReport::default());
        assert!(state.contains(&key));
    }
}
