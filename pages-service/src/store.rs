//! Key-value store interface used by the repositories.
//!
//! Tables are addressed by name and hold JSON items under a composite
//! `(partition, sort)` key. [`MemoryStore`] keeps everything in process and
//! orders items by key so scans are deterministic.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;

pub type Item = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("item already exists")]
    AlreadyExists,
    #[error("item not found")]
    NotFound,
    #[error("attribute '{0}' is not numeric")]
    NotNumeric(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyAttr {
    Num(i64),
    Str(String),
}

impl From<i64> for KeyAttr {
    fn from(value: i64) -> Self {
        KeyAttr::Num(value)
    }
}

impl From<i32> for KeyAttr {
    fn from(value: i32) -> Self {
        KeyAttr::Num(value.into())
    }
}

impl From<&str> for KeyAttr {
    fn from(value: &str) -> Self {
        KeyAttr::Str(value.to_string())
    }
}

impl From<String> for KeyAttr {
    fn from(value: String) -> Self {
        KeyAttr::Str(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub partition: KeyAttr,
    pub sort: KeyAttr,
}

impl ItemKey {
    pub fn new(partition: impl Into<KeyAttr>, sort: impl Into<KeyAttr>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }
}

/// Predicate evaluated against each item during a scan.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanFilter {
    All,
    Eq(String, Value),
    /// Substring match on strings, membership on arrays.
    Contains(String, String),
    Gte(String, i64),
    And(Vec<ScanFilter>),
    Or(Vec<ScanFilter>),
}

impl ScanFilter {
    pub fn eq(attribute: &str, value: impl Into<Value>) -> Self {
        ScanFilter::Eq(attribute.to_string(), value.into())
    }

    pub fn contains(attribute: &str, needle: impl Into<String>) -> Self {
        ScanFilter::Contains(attribute.to_string(), needle.into())
    }

    pub fn gte(attribute: &str, bound: i64) -> Self {
        ScanFilter::Gte(attribute.to_string(), bound)
    }

    /// Conjunction of the given filters; `All` when empty.
    pub fn all_of(filters: Vec<ScanFilter>) -> Self {
        let mut filters: Vec<_> = filters
            .into_iter()
            .filter(|filter| *filter != ScanFilter::All)
            .collect();
        match filters.len() {
            0 => ScanFilter::All,
            1 => filters.remove(0),
            _ => ScanFilter::And(filters),
        }
    }

    pub fn matches(&self, item: &Item) -> bool {
        match self {
            ScanFilter::All => true,
            ScanFilter::Eq(attribute, expected) => item.get(attribute) == Some(expected),
            ScanFilter::Contains(attribute, needle) => match item.get(attribute) {
                Some(Value::String(haystack)) => haystack.contains(needle.as_str()),
                Some(Value::Array(values)) => values
                    .iter()
                    .any(|value| value.as_str() == Some(needle.as_str())),
                _ => false,
            },
            ScanFilter::Gte(attribute, bound) => item
                .get(attribute)
                .and_then(Value::as_i64)
                .is_some_and(|value| value >= *bound),
            ScanFilter::And(filters) => filters.iter().all(|filter| filter.matches(item)),
            ScanFilter::Or(filters) => filters.iter().any(|filter| filter.matches(item)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub filter: ScanFilter,
    pub limit: Option<usize>,
    pub start_after: Option<ItemKey>,
}

impl ScanRequest {
    pub fn new(filter: ScanFilter) -> Self {
        Self {
            filter,
            limit: None,
            start_after: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, key: Option<ItemKey>) -> Self {
        self.start_after = key;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    pub items: Vec<Item>,
    pub count: usize,
    /// Set when the scan stopped at the limit with matching items left.
    pub last_evaluated_key: Option<ItemKey>,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, table: &str, key: &ItemKey) -> StoreResult<Option<Item>>;

    /// Fails with `AlreadyExists` when the key is taken.
    async fn put_new(&self, table: &str, key: ItemKey, item: Item) -> StoreResult<()>;

    /// Sets `changes` on an existing item and returns the updated item.
    async fn update_existing(&self, table: &str, key: &ItemKey, changes: Item)
        -> StoreResult<Item>;

    async fn delete_existing(&self, table: &str, key: &ItemKey) -> StoreResult<()>;

    async fn scan(&self, table: &str, request: ScanRequest) -> StoreResult<ScanPage>;

    async fn count(&self, table: &str) -> StoreResult<usize>;

    /// Adds `delta` to a numeric attribute, creating the item from `seed`
    /// when absent. Returns the new value.
    async fn increment(
        &self,
        table: &str,
        key: ItemKey,
        seed: Item,
        attribute: &str,
        delta: i64,
    ) -> StoreResult<i64>;
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, BTreeMap<ItemKey, Item>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, table: &str, key: &ItemKey) -> StoreResult<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).and_then(|items| items.get(key)).cloned())
    }

    async fn put_new(&self, table: &str, key: ItemKey, item: Item) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let items = tables.entry(table.to_string()).or_default();
        if items.contains_key(&key) {
            return Err(StoreError::AlreadyExists);
        }
        items.insert(key, item);
        Ok(())
    }

    async fn update_existing(
        &self,
        table: &str,
        key: &ItemKey,
        changes: Item,
    ) -> StoreResult<Item> {
        let mut tables = self.tables.write().await;
        let item = tables
            .get_mut(table)
            .and_then(|items| items.get_mut(key))
            .ok_or(StoreError::NotFound)?;
        item.extend(changes);
        Ok(item.clone())
    }

    async fn delete_existing(&self, table: &str, key: &ItemKey) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .get_mut(table)
            .and_then(|items| items.remove(key))
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn scan(&self, table: &str, request: ScanRequest) -> StoreResult<ScanPage> {
        let tables = self.tables.read().await;
        let Some(items) = tables.get(table) else {
            return Ok(ScanPage::default());
        };

        let lower = match request.start_after.as_ref() {
            Some(key) => Bound::Excluded(key),
            None => Bound::Unbounded,
        };
        let limit = request.limit.unwrap_or(usize::MAX);
        let mut matching = items
            .range((lower, Bound::Unbounded))
            .filter(|(_, item)| request.filter.matches(item));

        let mut page = ScanPage::default();
        let mut last_key = None;
        for (key, item) in matching.by_ref().take(limit) {
            page.items.push(item.clone());
            last_key = Some(key.clone());
        }
        page.count = page.items.len();
        if matching.next().is_some() {
            page.last_evaluated_key = last_key;
        }
        Ok(page)
    }

    async fn count(&self, table: &str) -> StoreResult<usize> {
        let tables = self.tables.read().await;
        Ok(tables.get(table).map_or(0, BTreeMap::len))
    }

    async fn increment(
        &self,
        table: &str,
        key: ItemKey,
        seed: Item,
        attribute: &str,
        delta: i64,
    ) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let item = tables
            .entry(table.to_string())
            .or_default()
            .entry(key)
            .or_insert(seed);
        let current = match item.get(attribute) {
            None => 0,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| StoreError::NotNumeric(attribute.to_string()))?,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Backend(format!("counter '{attribute}' overflowed")))?;
        item.insert(attribute.to_string(), Value::from(next));
        Ok(next)
    }
}
