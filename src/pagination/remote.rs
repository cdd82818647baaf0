//! Page fetches against a paged Voyager collection
//!
//! Voyager collections take `start`/`count` query parameters and answer with
//! `{"elements": [...], "paging": {"total": N, ...}}`.

use super::engine::PaginationEngine;
use super::types::{CollectionResult, PageRequest, PageResult};
use crate::error::{Error, Result};
use crate::session::SessionManager;
use crate::types::{JsonValue, Method};
use tracing::debug;

/// Page source for one collection path, requests go through the session
#[derive(Debug, Clone)]
pub struct RemoteCollection<'a> {
    session: &'a SessionManager,
    path: String,
    params: Vec<(String, String)>,
    start_param: String,
    count_param: String,
    elements_path: String,
    total_path: String,
}

impl<'a> RemoteCollection<'a> {
    /// Collection at `path` (relative to the API prefix)
    pub fn new(session: &'a SessionManager, path: impl Into<String>) -> Self {
        Self {
            session,
            path: path.into(),
            params: Vec::new(),
            start_param: "start".to_string(),
            count_param: "count".to_string(),
            elements_path: "elements".to_string(),
            total_path: "paging.total".to_string(),
        }
    }

    /// Add a fixed query parameter
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Rename the offset and page size parameters
    #[must_use]
    pub fn cursor_params(mut self, start: impl Into<String>, count: impl Into<String>) -> Self {
        self.start_param = start.into();
        self.count_param = count.into();
        self
    }

    /// Dotted path of the element array
    #[must_use]
    pub fn elements_path(mut self, path: impl Into<String>) -> Self {
        self.elements_path = path.into();
        self
    }

    /// Dotted path of the reported total
    #[must_use]
    pub fn total_path(mut self, path: impl Into<String>) -> Self {
        self.total_path = path.into();
        self
    }

    /// Path plus query for one page
    pub fn page_path(&self, request: PageRequest) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.params {
            query.append_pair(key, value);
        }
        query.append_pair(&self.start_param, &request.cursor.to_string());
        query.append_pair(&self.count_param, &request.page_size.to_string());

        let separator = if self.path.contains('?') { '&' } else { '?' };
        format!("{}{separator}{}", self.path, query.finish())
    }

    /// Fetch one page
    pub async fn fetch_page(&self, request: PageRequest) -> Result<PageResult<JsonValue>> {
        let response = self
            .session
            .request_with_reauth(Method::GET, &self.page_path(request), None)
            .await?;
        let body: JsonValue = response.json()?;
        let page = self.parse_page(&body)?;

        debug!(
            path = %self.path,
            cursor = request.cursor,
            elements = page.elements.len(),
            reported_total = ?page.reported_total,
            "page received"
        );
        Ok(page)
    }

    /// Split a page body into elements and reported total
    pub fn parse_page(&self, body: &JsonValue) -> Result<PageResult<JsonValue>> {
        if !body.is_object() {
            return Err(Error::decode(format!(
                "Expected a JSON object for collection '{}'",
                self.path
            )));
        }

        let elements = match lookup(body, &self.elements_path) {
            Some(JsonValue::Array(items)) => items.clone(),
            None | Some(JsonValue::Null) => Vec::new(),
            Some(other) => {
                return Err(Error::decode(format!(
                    "'{}' is not an array (got {})",
                    self.elements_path,
                    type_name(other)
                )))
            }
        };

        let reported_total = lookup(body, &self.total_path)
            .and_then(JsonValue::as_u64)
            .map(|total| total as usize);

        Ok(PageResult::new(elements, reported_total))
    }

    /// Fetch up to `limit` elements, or everything when `limit` is `None`
    pub async fn collect(
        &self,
        engine: &PaginationEngine,
        page_size: usize,
        limit: Option<usize>,
    ) -> CollectionResult<JsonValue> {
        let fetch = move |request: PageRequest| self.fetch_page(request);
        match limit {
            Some(limit) => engine.fetch_collection(fetch, page_size, limit).await,
            None => engine.fetch_all(fetch, page_size).await,
        }
    }
}

/// Follow a dotted path (`$.` prefix optional) through nested objects
pub(crate) fn lookup<'v>(value: &'v JsonValue, path: &str) -> Option<&'v JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            JsonValue::Object(map) => current = map.get(part)?,
            _ => return None,
        }
    }
    Some(current)
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
