//! Page records and the repository that stores them.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::store::{Item, ItemKey, KeyAttr, KeyValueStore, ScanFilter, ScanRequest, StoreError};

pub const MAX_PAGE_ID: i64 = 200;
pub const MAX_TITLE_LEN: usize = 1000;
pub const MAX_UPDATED_TITLE_LEN: usize = 200;
pub const MAX_CITY_LEN: usize = 100;
pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct PageCreate {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, rename = "pageContent")]
    pub page_content: Option<String>,
    #[serde(default, rename = "type")]
    pub page_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl PageCreate {
    pub fn validate(&self) -> Result<(), PageError> {
        if !(1..=MAX_PAGE_ID).contains(&self.id) {
            return Err(PageError::Invalid(format!(
                "id must be between 1 and {MAX_PAGE_ID}"
            )));
        }
        check_len("title", &self.title, 1, MAX_TITLE_LEN)?;
        if let Some(city) = &self.city {
            check_len("city", city, 0, MAX_CITY_LEN)?;
        }
        Ok(())
    }
}

/// Partial update; absent and null fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, rename = "pageContent")]
    pub page_content: Option<String>,
    #[serde(default, rename = "type")]
    pub page_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl PageUpdate {
    pub fn validate(&self) -> Result<(), PageError> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, MAX_UPDATED_TITLE_LEN)?;
        }
        if let Some(city) = &self.city {
            check_len("city", city, 0, MAX_CITY_LEN)?;
        }
        Ok(())
    }

    fn into_changes(self) -> Item {
        // The title is part of the key and cannot be rewritten in place.
        let PageUpdate {
            title: _,
            city,
            page_content,
            page_type,
            tags,
            data,
        } = self;
        let mut changes = Item::new();
        if let Some(city) = city {
            changes.insert("city".into(), Value::String(city));
        }
        if let Some(content) = page_content {
            changes.insert("pageContent".into(), Value::String(content));
        }
        if let Some(kind) = page_type {
            changes.insert("type".into(), Value::String(kind));
        }
        if let Some(tags) = tags {
            changes.insert(
                "tags".into(),
                Value::Array(tags.into_iter().map(Value::String).collect()),
            );
        }
        if let Some(data) = data {
            changes.insert("data".into(), Value::Object(data));
        }
        changes
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), PageError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(PageError::Invalid(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(
        default,
        rename = "pageContent",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_content: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub page_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Page {
    fn from_item(item: Item) -> Result<Self, PageError> {
        serde_json::from_value(Value::Object(item))
            .map_err(|err| PageError::Store(format!("corrupt page record: {err}")))
    }

    fn into_item(self) -> Result<Item, PageError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(PageError::Store("page did not serialize to an object".into())),
            Err(err) => Err(PageError::Store(err.to_string())),
        }
    }
}

/// Resume point for paginated listings, in the page's own key terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub id: i64,
    pub title: String,
}

impl From<ItemKey> for PageCursor {
    fn from(key: ItemKey) -> Self {
        let id = match key.partition {
            KeyAttr::Num(id) => id,
            KeyAttr::Str(raw) => raw.parse().unwrap_or_default(),
        };
        let title = match key.sort {
            KeyAttr::Str(title) => title,
            KeyAttr::Num(n) => n.to_string(),
        };
        Self { id, title }
    }
}

impl From<PageCursor> for ItemKey {
    fn from(cursor: PageCursor) -> Self {
        ItemKey::new(cursor.id, cursor.title)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageListing {
    pub pages: Vec<Page>,
    pub count: usize,
    pub last_evaluated_key: Option<PageCursor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default, rename = "type")]
    pub page_type: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchQuery {
    fn filter(&self) -> ScanFilter {
        let term = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
        let has_selector =
            term.is_some() || self.city.is_some() || self.page_type.is_some() || self.tag.is_some();

        let mut filters = Vec::new();
        if let Some(term) = term {
            filters.push(ScanFilter::Or(vec![
                ScanFilter::contains("title", term),
                ScanFilter::contains("pageContent", term),
            ]));
        }
        // A city on its own is a partial match; combined with a term or a
        // type it must match exactly.
        if let Some(city) = &self.city {
            if term.is_none() && self.page_type.is_none() {
                filters.push(ScanFilter::contains("city", city.as_str()));
            } else {
                filters.push(ScanFilter::eq("city", city.as_str()));
            }
        }
        if let Some(kind) = &self.page_type {
            filters.push(ScanFilter::eq("type", kind.as_str()));
        }
        if let Some(tag) = &self.tag {
            filters.push(ScanFilter::contains("tags", tag.as_str()));
        }
        if self.published == Some(true) || !has_selector {
            filters.push(ScanFilter::eq("published", true));
        }
        ScanFilter::all_of(filters)
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid page: {0}")]
    Invalid(String),
    #[error("page already exists")]
    AlreadyExists,
    #[error("page not found")]
    NotFound,
    #[error("no valid fields to update")]
    NoValidFields,
    #[error("page store failure: {0}")]
    Store(String),
}

impl From<StoreError> for PageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists => PageError::AlreadyExists,
            StoreError::NotFound => PageError::NotFound,
            other => PageError::Store(other.to_string()),
        }
    }
}

impl From<PageError> for ApiError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Invalid(message) => ApiError::bad_request("invalid_page", message),
            PageError::AlreadyExists => ApiError::Conflict {
                code: "page_exists",
                message: Some("a page with this id and title already exists".into()),
            },
            PageError::NotFound => ApiError::not_found("page_not_found"),
            PageError::NoValidFields => {
                ApiError::bad_request("no_valid_fields", "no valid fields to update")
            }
            PageError::Store(detail) => ApiError::internal(detail),
        }
    }
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT)
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Clone)]
pub struct PageRepository {
    store: Arc<dyn KeyValueStore>,
    table: String,
}

impl PageRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn create_page(&self, input: PageCreate) -> Result<Page, PageError> {
        input.validate()?;
        let now = timestamp();
        let page = Page {
            id: input.id,
            title: input.title,
            city: input.city,
            page_content: input.page_content,
            page_type: input.page_type,
            tags: input.tags.unwrap_or_default(),
            data: input.data,
            published: false,
            published_at: None,
            created_at: now.clone(),
            updated_at: now,
        };
        let key = ItemKey::new(page.id, page.title.as_str());
        self.store
            .put_new(&self.table, key, page.clone().into_item()?)
            .await?;
        info!(page_id = page.id, title = %page.title, "page created");
        Ok(page)
    }

    /// Unpublished pages are only visible to authorized callers.
    pub async fn get_page(&self, id: i64, title: &str, authorized: bool) -> Result<Page, PageError> {
        let item = self
            .store
            .get(&self.table, &ItemKey::new(id, title))
            .await?
            .ok_or(PageError::NotFound)?;
        let page = Page::from_item(item)?;
        if !page.published && !authorized {
            debug!(page_id = id, "hiding unpublished page from anonymous caller");
            return Err(PageError::NotFound);
        }
        Ok(page)
    }

    pub async fn count_pages(&self) -> Result<usize, PageError> {
        Ok(self.store.count(&self.table).await?)
    }

    pub async fn list_pages(
        &self,
        limit: usize,
        start_after: Option<ItemKey>,
    ) -> Result<PageListing, PageError> {
        self.listing(ScanFilter::All, limit, start_after).await
    }

    pub async fn list_published_pages(
        &self,
        limit: usize,
        start_after: Option<ItemKey>,
    ) -> Result<PageListing, PageError> {
        self.listing(ScanFilter::eq("published", true), limit, start_after)
            .await
    }

    pub async fn update_page(
        &self,
        id: i64,
        title: &str,
        update: PageUpdate,
    ) -> Result<Page, PageError> {
        update.validate()?;
        let mut changes = update.into_changes();
        if changes.is_empty() {
            return Err(PageError::NoValidFields);
        }
        changes.insert("updated_at".into(), Value::String(timestamp()));
        let item = self
            .store
            .update_existing(&self.table, &ItemKey::new(id, title), changes)
            .await?;
        info!(page_id = id, %title, "page updated");
        Page::from_item(item)
    }

    pub async fn publish_page(&self, id: i64, title: &str) -> Result<Page, PageError> {
        let now = Value::String(timestamp());
        let mut changes = Item::new();
        changes.insert("published".into(), Value::Bool(true));
        changes.insert("published_at".into(), now.clone());
        changes.insert("updated_at".into(), now);
        let item = self
            .store
            .update_existing(&self.table, &ItemKey::new(id, title), changes)
            .await?;
        info!(page_id = id, %title, "page published");
        Page::from_item(item)
    }

    pub async fn delete_page(&self, id: i64, title: &str) -> Result<(), PageError> {
        self.store
            .delete_existing(&self.table, &ItemKey::new(id, title))
            .await?;
        info!(page_id = id, %title, "page deleted");
        Ok(())
    }

    pub async fn search_pages(&self, query: &SearchQuery) -> Result<Vec<Page>, PageError> {
        self.scan_pages(query.filter(), clamp_limit(query.limit))
            .await
    }

    async fn listing(
        &self,
        filter: ScanFilter,
        limit: usize,
        start_after: Option<ItemKey>,
    ) -> Result<PageListing, PageError> {
        let request = ScanRequest::new(filter)
            .limit(limit)
            .start_after(start_after);
        let scanned = self.store.scan(&self.table, request).await?;
        let pages = scanned
            .items
            .into_iter()
            .map(Page::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageListing {
            count: pages.len(),
            pages,
            last_evaluated_key: scanned.last_evaluated_key.map(PageCursor::from),
        })
    }

    async fn scan_pages(&self, filter: ScanFilter, limit: usize) -> Result<Vec<Page>, PageError> {
        Ok(self.listing(filter, limit, None).await?.pages)
    }
}
