//! Core types for the data hub.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Wire name of the persistent referrer.
pub const PERSISTENT_REFERRER: &str = "PERSISTENT_REFERRER";

/// Separator between type name and id in a serialized [`EntityKey`].
pub(crate) const KEY_SEPARATOR: char = '#';

/// Canonical identity of an entity within its type.
///
/// String and numeric ids share one key space: `9` and `"9"` name the
/// same entity.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Canonicalize a raw id value. Only strings and numbers are ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(EntityId(s.clone())),
            Value::Number(n) => Some(EntityId(canonical_number(n))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Integral floats such as `9.0` name the same id as the integer `9`.
fn canonical_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

/// Largest magnitude below which every integral `f64` is exact.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId(s)
    }
}

impl From<&String> for EntityId {
    fn from(s: &String) -> Self {
        EntityId(s.clone())
    }
}

macro_rules! entity_id_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for EntityId {
            fn from(n: $t) -> Self {
                EntityId(n.to_string())
            }
        })*
    };
}

entity_id_from_int!(i32, i64, u32, u64, usize);

/// Storage key of an entity record: `(type, id)`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub entity_type: String,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity_type: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({}{}{})", self.entity_type, KEY_SEPARATOR, self.id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.entity_type, KEY_SEPARATOR, self.id)
    }
}

// Keys serialize as strings so snapshots can be JSON maps.
impl Serialize for EntityKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let (entity_type, id) = raw
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| serde::de::Error::custom(format!("malformed entity key: {raw}")))?;
        Ok(EntityKey::new(entity_type, id))
    }
}

/// A scope that keeps cached entities alive.
///
/// Navigation referrers are released when their navigation ends; the
/// persistent referrer is never released.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Referrer {
    Persistent,
    Scoped(ScopedToken),
}

/// Token of a navigation referrer.
///
/// Only built through [`Referrer::scoped`] or the `From` conversions, so it
/// is never empty and never the persistent wire name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedToken(String);

impl ScopedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Referrer {
    pub fn scoped(token: impl Into<String>) -> Self {
        Referrer::from(token.into())
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Referrer::Persistent)
    }
}

impl fmt::Debug for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referrer::Persistent => write!(f, "Referrer::Persistent"),
            Referrer::Scoped(token) => write!(f, "Referrer({token})"),
        }
    }
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Referrer::Persistent => f.write_str(PERSISTENT_REFERRER),
            Referrer::Scoped(token) => f.write_str(token.as_str()),
        }
    }
}

impl From<String> for Referrer {
    fn from(token: String) -> Self {
        if token.is_empty() || token == PERSISTENT_REFERRER {
            Referrer::Persistent
        } else {
            Referrer::Scoped(ScopedToken(token))
        }
    }
}

impl From<&str> for Referrer {
    fn from(token: &str) -> Self {
        Referrer::from(token.to_string())
    }
}

impl From<Referrer> for String {
    fn from(referrer: Referrer) -> Self {
        referrer.to_string()
    }
}

/// A set of referrers passed to a write or tag operation.
///
/// An empty set means the persistent referrer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Referrers(im::HashSet<Referrer>);

impl Referrers {
    pub fn persistent() -> Self {
        Referrers(im::HashSet::unit(Referrer::Persistent))
    }

    /// The effective set: empty becomes persistent.
    pub(crate) fn effective(&self) -> im::HashSet<Referrer> {
        if self.0.is_empty() {
            im::HashSet::unit(Referrer::Persistent)
        } else {
            self.0.clone()
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Referrer> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Referrer> for Referrers {
    fn from(referrer: Referrer) -> Self {
        Referrers(im::HashSet::unit(referrer))
    }
}

impl From<&Referrer> for Referrers {
    fn from(referrer: &Referrer) -> Self {
        Referrers(im::HashSet::unit(referrer.clone()))
    }
}

impl From<&str> for Referrers {
    fn from(token: &str) -> Self {
        Referrers::from(Referrer::from(token))
    }
}

impl From<Vec<Referrer>> for Referrers {
    fn from(referrers: Vec<Referrer>) -> Self {
        Referrers(referrers.into_iter().collect())
    }
}

impl From<&[Referrer]> for Referrers {
    fn from(referrers: &[Referrer]) -> Self {
        Referrers(referrers.iter().cloned().collect())
    }
}

impl From<im::HashSet<Referrer>> for Referrers {
    fn from(referrers: im::HashSet<Referrer>) -> Self {
        Referrers(referrers)
    }
}

impl FromIterator<Referrer> for Referrers {
    fn from_iter<I: IntoIterator<Item = Referrer>>(iter: I) -> Self {
        Referrers(iter.into_iter().collect())
    }
}

/// Hub statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Number of stored entity records.
    pub entities: usize,
    /// Number of live navigation referrers.
    pub referrers: usize,
    /// Stamp of the current snapshot.
    pub stamp: u64,
}
