//! Ordered request parameters and the dimension group micro-format.
//!
//! DHIS2 encodes analytical dimensions as `subtype:id1;id2;...`, for example
//! `dx:fbfJHSPpUQD;cYeuwXTCPkU` or `pe:LAST_12_MONTHS`. Several groups can be
//! sent under the same grouping key (`dimension`, `filter`), one query pair
//! per group. Inside a [`ParameterSet`] those groups are stored as a single
//! value joined with `,`, which keeps the set a flat name → value mapping.

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parameter names whose values are lists of dimension groups.
pub const GROUPING_KEYS: [&str; 2] = ["dimension", "filter"];

/// Dimension subtype for time periods.
pub const PERIOD_DIMENSION: &str = "pe";
/// Dimension subtype for data items.
pub const DATA_DIMENSION: &str = "dx";
/// Dimension subtype for organisation units.
pub const ORG_UNIT_DIMENSION: &str = "ou";

const GROUP_SEPARATOR: char = ',';
const ITEM_SEPARATOR: char = ';';

pub fn is_grouping_key(key: &str) -> bool {
    GROUPING_KEYS.contains(&key)
}

/// One `subtype:id1;id2` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionGroup {
    pub subtype: String,
    pub items: Vec<String>,
}

impl DimensionGroup {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (subtype, items) = match raw.split_once(':') {
            Some((subtype, items)) => (subtype.trim(), items),
            None => (raw, ""),
        };
        if subtype.is_empty() {
            return None;
        }
        let items = items
            .split(ITEM_SEPARATOR)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self {
            subtype: subtype.to_string(),
            items,
        })
    }

    /// Add items not already present, keeping first-seen order.
    fn absorb(&mut self, other: DimensionGroup) {
        for item in other.items {
            if !self.items.contains(&item) {
                self.items.push(item);
            }
        }
    }
}

impl fmt::Display for DimensionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            write!(f, "{}", self.subtype)
        } else {
            write!(f, "{}:{}", self.subtype, self.items.join(";"))
        }
    }
}

/// Parse a stored grouping value (`dx:a;b,pe:2024`) into its groups.
pub fn parse_groups(value: &str) -> Vec<DimensionGroup> {
    value
        .split(GROUP_SEPARATOR)
        .filter_map(DimensionGroup::parse)
        .collect()
}

fn join_groups(groups: &[DimensionGroup]) -> String {
    groups
        .iter()
        .map(|g| g.to_string())
        .collect::<Vec<_>>()
        .join(&GROUP_SEPARATOR.to_string())
}

/// An ordered mapping from parameter name to string value.
///
/// Re-setting an existing name replaces its value in place, so the position
/// of a parameter is the position where it was first introduced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    entries: Vec<(String, String)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set `key` and move it to the end of the ordering.
    pub fn set_last(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.remove(&key);
        self.entries.push((key, value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Overlay every entry of `other` onto `self`; `other` wins per key.
    pub fn overlay(&mut self, other: &ParameterSet) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Add a dimension group under a grouping key.
    ///
    /// A group whose subtype is already present is unioned with the existing
    /// one instead of replacing it.
    pub fn add_group(&mut self, key: &str, group: DimensionGroup) {
        let mut groups = self.get(key).map(parse_groups).unwrap_or_default();
        match groups.iter_mut().find(|g| g.subtype == group.subtype) {
            Some(existing) => existing.absorb(group),
            None => groups.push(group),
        }
        self.set(key, join_groups(&groups));
    }

    /// Groups stored under a grouping key, in insertion order.
    pub fn groups(&self, key: &str) -> Vec<DimensionGroup> {
        self.get(key).map(parse_groups).unwrap_or_default()
    }

    /// Whether any grouping key carries a group of the given subtype.
    pub fn has_group(&self, subtype: &str) -> bool {
        GROUPING_KEYS
            .iter()
            .any(|key| self.groups(key).iter().any(|g| g.subtype == subtype))
    }

    /// Expand into wire query pairs; grouping keys become one pair per group.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.entries.len());
        for (k, v) in &self.entries {
            if is_grouping_key(k) {
                for group in parse_groups(v) {
                    pairs.push((k.clone(), group.to_string()));
                }
            } else {
                pairs.push((k.clone(), v.clone()));
            }
        }
        pairs
    }

    /// Stable textual form, used to identify identical requests.
    pub fn canonical(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

impl Serialize for ParameterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ParameterSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ParameterSetVisitor;

        impl<'de> Visitor<'de> for ParameterSetVisitor {
            type Value = ParameterSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of parameter names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ParameterSet, A::Error> {
                let mut set = ParameterSet::new();
                while let Some((key, value)) = access.next_entry::<String, ParamScalar>()? {
                    set.set(key, value.0);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(ParameterSetVisitor)
    }
}

/// Config files may write `pageSize: 100` or `skipMeta: true`; both become strings.
struct ParamScalar(String);

impl<'de> Deserialize<'de> for ParamScalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(ParamScalar(s)),
            serde_json::Value::Number(n) => Ok(ParamScalar(n.to_string())),
            serde_json::Value::Bool(b) => Ok(ParamScalar(b.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "parameter values must be scalars, got {}",
                other
            ))),
        }
    }
}
