use std::collections::HashMap;

use shared::domain::Entity;
use shared::error::ApiError;

/// One cached entity plus its per-record fetch status.
///
/// `is_fetching` and `is_loaded` are never both true; `did_fail` implies
/// `!is_fetching`. `data` survives refetches and failures so a list row can
/// keep showing the last known value.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord<T> {
    pub data: Option<T>,
    pub is_fetching: bool,
    pub is_loaded: bool,
    pub did_fail: bool,
    pub error: Option<ApiError>,
}

impl<T> Default for EntityRecord<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_fetching: false,
            is_loaded: false,
            did_fail: false,
            error: None,
        }
    }
}

/// Single source of truth for one entity kind, keyed by identity.
///
/// Merge-only: records absent from an incoming page are left untouched.
/// Eviction is the explicit whole-store `clear`, nothing else. All merge
/// operations are total and cannot fail.
#[derive(Debug)]
pub struct NormalizedStore<T: Entity> {
    records: HashMap<T::Id, EntityRecord<T>>,
}

impl<T: Entity> NormalizedStore<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, id: T::Id) -> Option<&EntityRecord<T>> {
        self.records.get(&id)
    }

    pub fn data(&self, id: T::Id) -> Option<&T> {
        self.records.get(&id).and_then(|record| record.data.as_ref())
    }

    /// Sets or creates the record in the fetching state. Domain data is
    /// preserved; status flags are normalized so the record invariants hold
    /// while the fetch is outstanding.
    pub fn mark_fetching(&mut self, id: T::Id) {
        let record = self.records.entry(id).or_default();
        record.is_fetching = true;
        record.is_loaded = false;
        record.did_fail = false;
    }

    /// Full replace of the domain fields, keyed by the record's own
    /// identifier. Later merges win whole-record; there is no field-level
    /// reconciliation.
    pub fn merge_record(&mut self, data: T) {
        let record = self.records.entry(data.id()).or_default();
        record.data = Some(data);
        record.is_fetching = false;
        record.is_loaded = true;
        record.did_fail = false;
        record.error = None;
    }

    pub fn mark_failed(&mut self, id: T::Id, error: ApiError) {
        let record = self.records.entry(id).or_default();
        record.is_fetching = false;
        record.did_fail = true;
        record.error = Some(error);
    }

    /// Applies `merge_record` for every row of a received page.
    pub fn merge_list(&mut self, rows: impl IntoIterator<Item = T>) {
        for row in rows {
            self.merge_record(row);
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<T: Entity> Default for NormalizedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
