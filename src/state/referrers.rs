//! Forward and reverse referrer indices.

use crate::types::{EntityKey, Referrer};
use serde::{Deserialize, Serialize};

/// Which referrers keep which entities alive.
///
/// `forward` maps an entity to its referrers, `reverse` maps a navigation
/// referrer to the entities it holds. The persistent referrer appears only
/// in `forward` since it is never released.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReferrerIndex {
    forward: im::HashMap<EntityKey, im::HashSet<Referrer>>,
    reverse: im::HashMap<Referrer, im::HashSet<EntityKey>>,
}

impl ReferrerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Union `referrers` into the bindings of `key`.
    pub fn link(&mut self, key: &EntityKey, referrers: &im::HashSet<Referrer>) {
        let mut holders = self.forward.get(key).cloned().unwrap_or_default();

        for referrer in referrers {
            holders.insert(referrer.clone());

            if !referrer.is_persistent() {
                let mut held = self.reverse.get(referrer).cloned().unwrap_or_default();
                if held.insert(key.clone()).is_none() {
                    self.reverse.insert(referrer.clone(), held);
                }
            }
        }

        self.forward.insert(key.clone(), holders);
    }

    /// Drop `referrer` entirely. Returns the entities left with no referrer.
    pub fn detach(&mut self, referrer: &Referrer) -> Vec<EntityKey> {
        let Some(held) = self.reverse.remove(referrer) else {
            return Vec::new();
        };

        let mut orphaned = Vec::new();
        for key in held {
            let Some(mut holders) = self.forward.get(&key).cloned() else {
                continue;
            };

            holders.remove(referrer);
            if holders.is_empty() {
                self.forward.remove(&key);
                orphaned.push(key);
            } else {
                self.forward.insert(key, holders);
            }
        }

        orphaned
    }

    /// Referrers currently holding `key`.
    pub fn referrers_of(&self, key: &EntityKey) -> Option<&im::HashSet<Referrer>> {
        self.forward.get(key)
    }

    /// Entities currently held by `referrer`.
    pub fn entities_of(&self, referrer: &Referrer) -> Option<&im::HashSet<EntityKey>> {
        self.reverse.get(referrer)
    }

    pub fn is_held(&self, key: &EntityKey) -> bool {
        self.forward.contains_key(key)
    }

    /// Number of live navigation referrers.
    pub fn referrer_count(&self) -> usize {
        self.reverse.len()
    }

    /// Check that both directions describe the same bindings.
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(key, holders)| {
            !holders.is_empty()
                && holders.iter().all(|referrer| {
                    referrer.is_persistent()
                        || self
                            .reverse
                            .get(referrer)
                            .is_some_and(|held| held.contains(key))
                })
        });

        let reverse_ok = self.reverse.iter().all(|(referrer, held)| {
            !referrer.is_persistent()
                && held.iter().all(|key| {
                    self.forward
                        .get(key)
                        .is_some_and(|holders| holders.contains(referrer))
                })
        });

        forward_ok && reverse_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(referrers: &[&str]) -> im::HashSet<Referrer> {
        referrers.iter().map(|r| Referrer::from(*r)).collect()
    }

    #[test]
    fn test_link_is_union() {
        let mut index = ReferrerIndex::new();
        let key = EntityKey::new("Place", 1);

        index.link(&key, &set(&["nav-A"]));
        index.link(&key, &set(&["nav-B"]));

        let holders = index.referrers_of(&key).unwrap();
        assert_eq!(holders.len(), 2);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_detach_orphans_only_unheld() {
        let mut index = ReferrerIndex::new();
        let shared = EntityKey::new("Place", 1);
        let single = EntityKey::new("Place", 2);

        index.link(&shared, &set(&["nav-A", "nav-B"]));
        index.link(&single, &set(&["nav-A"]));

        let orphaned = index.detach(&Referrer::from("nav-A"));
        assert_eq!(orphaned, vec![single.clone()]);
        assert!(index.is_held(&shared));
        assert!(!index.is_held(&single));
        assert!(index.entities_of(&Referrer::from("nav-A")).is_none());
        assert!(index.is_consistent());
    }

    #[test]
    fn test_persistent_not_in_reverse() {
        let mut index = ReferrerIndex::new();
        let key = EntityKey::new("Country", "FR");

        index.link(&key, &im::HashSet::unit(Referrer::Persistent));

        assert_eq!(index.referrer_count(), 0);
        assert!(index.detach(&Referrer::Persistent).is_empty());
        assert!(index.is_held(&key));
        assert!(index.is_consistent());
    }
}
