use std::collections::BTreeMap;
use std::fmt;

use shared::protocol::{PageQuery, SortOrder};
use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: u32 = 25;

/// Rejected intent parameters. The offending intent is a no-op; nothing is
/// dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IntentError {
    #[error("page limit must be greater than zero")]
    InvalidPage,
}

/// One active filter: the constraint value sent to the server plus the
/// label a filter chip displays for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue {
    pub value: String,
    pub display: Option<String>,
}

impl FilterValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: None,
        }
    }

    pub fn with_display(value: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: Some(display.into()),
        }
    }
}

/// Current filter constraints, keyed by filter name.
///
/// An absent key means "no constraint". Setting a key to an empty value
/// removes it, so `active_count` stays an accurate badge count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterValue>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: FilterValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: FilterValue) {
        let key = key.into();
        if value.value.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.entries.get(key)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn wire_values(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<String>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub offset: u32,
    pub limit: u32,
}

impl PageState {
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_LIMIT)
    }
}

/// Serialized identity of one composed query. Two fetches with equal
/// signatures request the same data; staleness rejection and deduplication
/// both key off this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySignature(String);

impl QuerySignature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuerySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The filter/sort/page triple a collection is currently showing.
///
/// Every update constructor returns a new state; a filter or sort change
/// restarts pagination from the first page, `with_page` alone may land on
/// any offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    pub filters: FilterSet,
    pub sort: SortState,
    pub page: PageState,
}

impl QueryState {
    pub fn new(limit: u32) -> Self {
        Self {
            filters: FilterSet::new(),
            sort: SortState::default(),
            page: PageState::first(limit),
        }
    }

    pub fn with_filters(&self, filters: FilterSet) -> Self {
        Self {
            filters,
            sort: self.sort.clone(),
            page: PageState::first(self.page.limit),
        }
    }

    pub fn with_sort(&self, key: Option<String>, order: Option<SortOrder>) -> Self {
        Self {
            filters: self.filters.clone(),
            sort: SortState { key, order },
            page: PageState::first(self.page.limit),
        }
    }

    pub fn with_page(&self, offset: u32, limit: u32) -> Result<Self, IntentError> {
        if limit == 0 {
            return Err(IntentError::InvalidPage);
        }
        Ok(Self {
            filters: self.filters.clone(),
            sort: self.sort.clone(),
            page: PageState { offset, limit },
        })
    }

    pub fn to_page_query(&self) -> PageQuery {
        PageQuery {
            filters: self.filters.wire_values(),
            sort_by: self.sort.key.clone(),
            order: self.sort.order,
            offset: self.page.offset,
            limit: self.page.limit,
        }
    }

    pub fn signature(&self) -> QuerySignature {
        let mut parts = Vec::with_capacity(self.filters.active_count() + 2);
        for (key, filter) in self.filters.iter() {
            parts.push(format!("f:{key}={}", filter.value));
        }
        if let Some(key) = &self.sort.key {
            let order = self.sort.order.unwrap_or(SortOrder::Asc);
            parts.push(format!("s:{key}:{}", order.as_str()));
        }
        parts.push(format!("p:{}:{}", self.page.offset, self.page.limit));
        QuerySignature(parts.join("&"))
    }
}

#[cfg(test)]
#[path = "tests/query_tests.rs"]
mod tests;
