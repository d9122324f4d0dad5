//! Data models for the catalog served to the display
//!
//! The catalog server publishes a single JSON document:
//!
//! ```json
//! {
//!   "videos": {
//!     "1": { "url": "clips/a.mp4", "author": "Ada", "created": "2017-05-01T12:00:00" },
//!     "2": { "url": "clips/b.mp4" }
//!   },
//!   "config": { "timeout_enabled": true, "timeout_delay": 30 }
//! }
//! ```
//!
//! Every poll yields a complete [`CatalogSnapshot`]; snapshots are never patched.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// Stable key of an item inside the catalog
///
/// Keys that parse as unsigned integers sort numerically and before every
/// other key; the remaining keys sort lexicographically. Refill sampling
/// relies on this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for ItemId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            // "01" and "1" are distinct keys with the same value
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ItemId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ItemId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// A playable catalog entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: ItemId,
    /// URL handed to the player
    pub url: String,
    /// Every other field published for the item (`author`, `created`, ...)
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            metadata: Map::new(),
        }
    }

    /// Adds a metadata field
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Name of the person who submitted the clip, when published
    pub fn author(&self) -> Option<&str> {
        self.metadata.get("author").and_then(Value::as_str)
    }
}

/// Automatic advance settings published with the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeoutConfig {
    pub enabled: bool,
    pub delay: Duration,
}

impl TimeoutConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Advance automatically after `delay`
    pub fn after(delay: Duration) -> Self {
        Self {
            enabled: true,
            delay,
        }
    }
}

impl fmt::Display for TimeoutConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled {
            write!(f, "{}s timeout", self.delay.as_secs())
        } else {
            f.write_str("Timeout disabled")
        }
    }
}

/// One poll result: the full item mapping plus the timeout settings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    items: BTreeMap<ItemId, Item>,
    config: TimeoutConfig,
}

impl CatalogSnapshot {
    /// Builds a snapshot; a later item replaces an earlier one with the same id
    pub fn new(items: impl IntoIterator<Item = Item>, config: TimeoutConfig) -> Self {
        let items = items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        Self { items, config }
    }

    /// Snapshot held before the first successful poll
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses the wire document
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        let wire: CatalogWire = serde_json::from_slice(bytes)?;
        wire.into_snapshot()
    }

    /// Parses an already decoded wire document
    pub fn from_value(value: Value) -> Result<Self> {
        let wire: CatalogWire = serde_json::from_value(value)?;
        wire.into_snapshot()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Identifiers in their defined order
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.keys()
    }

    /// Items in identifier order
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn config(&self) -> TimeoutConfig {
        self.config
    }

    /// Identifiers present here and absent from `previous`, in order
    pub fn new_ids_since(&self, previous: &CatalogSnapshot) -> Vec<ItemId> {
        self.ids()
            .filter(|id| !previous.contains(id))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogWire {
    #[serde(default)]
    videos: Option<HashMap<String, ItemWire>>,
    #[serde(default)]
    config: Option<ConfigWire>,
}

#[derive(Debug, Deserialize)]
struct ItemWire {
    url: String,
    #[serde(flatten)]
    metadata: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigWire {
    #[serde(default)]
    timeout_enabled: bool,
    #[serde(default, deserialize_with = "deserialize_seconds")]
    timeout_delay: Duration,
}

impl CatalogWire {
    fn into_snapshot(self) -> Result<CatalogSnapshot> {
        let mut items = BTreeMap::new();
        for (key, wire) in self.videos.unwrap_or_default() {
            if wire.url.trim().is_empty() {
                return Err(Error::InvalidCatalog(format!("item {} has an empty url", key)));
            }
            let id = ItemId::new(key);
            items.insert(
                id.clone(),
                Item {
                    id,
                    url: wire.url,
                    metadata: wire.metadata,
                },
            );
        }

        let config = self.config.unwrap_or_default();
        Ok(CatalogSnapshot {
            items,
            config: TimeoutConfig {
                enabled: config.timeout_enabled,
                delay: config.timeout_delay,
            },
        })
    }
}

/// Accepts `30`, `2.5` or `"30"`; rejects negative values and values no
/// `Duration` can hold
fn deserialize_seconds<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        Number(f64),
        String(String),
        Null(()),
    }

    let seconds = match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(n) => n,
        StringOrNumber::String(s) => s.trim().parse::<f64>().map_err(Error::custom)?,
        StringOrNumber::Null(()) => 0.0,
    };

    Duration::try_from_secs_f64(seconds)
        .map_err(|e| Error::custom(format!("invalid timeout_delay {}: {}", seconds, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_id_order_is_numeric_first() {
        let mut ids: Vec<ItemId> = ["10", "b", "2", "a", "1"].into_iter().map(ItemId::from).collect();
        ids.sort();
        let keys: Vec<&str> = ids.iter().map(ItemId::as_str).collect();
        assert_eq!(keys, vec!["1", "2", "10", "a", "b"]);
    }

    #[test]
    fn test_parse_wire_document() {
        let snapshot = CatalogSnapshot::from_value(json!({
            "videos": {
                "2": {"url": "b.mp4"},
                "1": {"url": "a.mp4", "author": "Ada", "created": "2017-05-01T12:00:00"}
            },
            "config": {"timeout_enabled": true, "timeout_delay": 5}
        }))
        .unwrap();

        assert_eq!(snapshot.len(), 2);
        let ids: Vec<&str> = snapshot.ids().map(ItemId::as_str).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let first = snapshot.get(&ItemId::from("1")).unwrap();
        assert_eq!(first.url, "a.mp4");
        assert_eq!(first.author(), Some("Ada"));
        assert!(first.metadata.contains_key("created"));
        assert!(!first.metadata.contains_key("url"));

        assert_eq!(snapshot.config(), TimeoutConfig::after(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_sections_default() {
        let snapshot = CatalogSnapshot::from_value(json!({})).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.config(), TimeoutConfig::disabled());

        let snapshot =
            CatalogSnapshot::from_value(json!({"videos": {}, "config": {"timeout_enabled": true}}))
                .unwrap();
        assert_eq!(snapshot.config(), TimeoutConfig::after(Duration::ZERO));
    }

    #[test]
    fn test_timeout_delay_as_string() {
        let snapshot = CatalogSnapshot::from_value(json!({
            "config": {"timeout_enabled": true, "timeout_delay": "12"}
        }))
        .unwrap();
        assert_eq!(snapshot.config().delay, Duration::from_secs(12));
    }

    #[test]
    fn test_invalid_documents_are_rejected() {
        let negative = CatalogSnapshot::from_value(json!({
            "config": {"timeout_enabled": true, "timeout_delay": -3}
        }));
        assert!(matches!(negative, Err(Error::Json(_))));

        let overflowing = CatalogSnapshot::from_json_slice(
            br#"{"videos":{},"config":{"timeout_enabled":true,"timeout_delay":1e30}}"#,
        );
        assert!(matches!(overflowing, Err(Error::Json(_))));

        let no_url = CatalogSnapshot::from_value(json!({"videos": {"1": {"author": "x"}}}));
        assert!(matches!(no_url, Err(Error::Json(_))));

        let empty_url = CatalogSnapshot::from_value(json!({"videos": {"1": {"url": " "}}}));
        assert!(matches!(empty_url, Err(Error::InvalidCatalog(_))));
    }

    #[test]
    fn test_new_ids_since_is_a_set_difference() {
        let old = CatalogSnapshot::new(
            vec![Item::new("1", "a.mp4"), Item::new("2", "b.mp4")],
            TimeoutConfig::disabled(),
        );
        let new = CatalogSnapshot::new(
            vec![Item::new("2", "b.mp4"), Item::new("3", "c.mp4"), Item::new("x", "x.mp4")],
            TimeoutConfig::disabled(),
        );

        assert_eq!(new.new_ids_since(&old), vec![ItemId::from("3"), ItemId::from("x")]);
        assert!(old.new_ids_since(&old).is_empty());
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(TimeoutConfig::after(Duration::from_secs(30)).to_string(), "30s timeout");
        assert_eq!(TimeoutConfig::disabled().to_string(), "Timeout disabled");
    }
}
