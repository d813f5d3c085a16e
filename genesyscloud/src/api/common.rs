//! Common types and utilities for the Genesys Cloud platform API

use serde::{Deserialize, Serialize};
use tflifecycle::Page;

/// Error body returned by the platform on non-2xx responses
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub message: Option<String>,
    pub code: Option<String>,
    pub context_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("API error details: code={code:?}, context_id={context_id:?}")]
pub struct ApiErrorDetails {
    pub code: Option<String>,
    pub context_id: Option<String>,
}

/// Reference to another platform object by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEntityRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl DomainEntityRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: None,
        }
    }

    /// Builds a reference only when `id` is present.
    pub fn from_id(id: Option<String>) -> Option<Self> {
        id.map(Self::id)
    }
}

/// Standard paged listing envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityListing<T> {
    #[serde(default = "Vec::new")]
    pub entities: Vec<T>,
    pub page_number: Option<u32>,
    pub page_size: Option<u32>,
    pub total: Option<u64>,
    pub page_count: Option<u32>,
}

impl<T> EntityListing<T> {
    pub fn into_page(self) -> Page<T> {
        let page = Page::new(self.entities);
        match self.page_count {
            Some(count) => page.with_page_count(count),
            None => page,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    pub fn add_optional<K: Into<String>, V: ToString>(mut self, key: K, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.params.push((key.into(), v.to_string()));
        }
        self
    }

    pub fn extend(mut self, other: ApiQueryParams) -> Self {
        self.params.extend(other.params);
        self
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

/// 1-based page selection
#[derive(Debug, Clone, Copy)]
pub struct PaginationParams {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 100,
        }
    }
}

impl PaginationParams {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    pub fn to_query_params(&self) -> ApiQueryParams {
        ApiQueryParams::new()
            .add("pageSize", self.page_size)
            .add("pageNumber", self.page_number)
    }
}
