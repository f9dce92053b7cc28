//! Filter, sort and pagination state for the record table.
//!
//! [`QueryState`] turns input events (typing, Enter, Escape, blur, sort
//! clicks, page changes) into [`FetchPlan`]s. Column filters and the global
//! search term are merged by [`build_combined_filters`] into one map with one
//! value per column, which is what the listing and count endpoints receive.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::Column;

mod debounce;
mod state;

pub use debounce::Debouncer;
pub use state::{FetchPlan, QueryEvent, QueryState, Transition, COLUMN_DEBOUNCE, GLOBAL_DEBOUNCE};

/// Marks a filter value as a whole-value match for the backend.
pub const EXACT_PREFIX: &str = "__EXACT__";

/// Column -> filter value, as sent to the backend.
pub type Filters = BTreeMap<Column, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Partial,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// The single active sort column. Persisted between table sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortConfig {
    pub key: Column,
    pub direction: SortDirection,
}

impl SortConfig {
    /// Sort after a click on `column`: toggle when it is already the key,
    /// otherwise start ascending.
    pub fn clicked(current: Option<SortConfig>, column: Column) -> SortConfig {
        match current {
            Some(sort) if sort.key == column => SortConfig {
                key: column,
                direction: sort.direction.toggled(),
            },
            _ => SortConfig {
                key: column,
                direction: SortDirection::Asc,
            },
        }
    }
}

/// Prefix a value with the exact-match sentinel.
pub fn exact(value: &str) -> String {
    format!("{}{}", EXACT_PREFIX, value)
}

/// Split a filter value into its match mode and the bare value.
pub fn split_exact(value: &str) -> (FilterMode, &str) {
    match value.strip_prefix(EXACT_PREFIX) {
        Some(rest) => (FilterMode::Exact, rest),
        None => (FilterMode::Partial, value),
    }
}

/// Merge column filters and the global term into one filter map.
///
/// Exact columns get the sentinel prefix. The global term fills every column
/// that has no value of its own; it never overwrites an explicit column
/// filter. Empty values are dropped.
pub fn build_combined_filters(
    column_filters: &BTreeMap<Column, String>,
    filter_mode: &BTreeMap<Column, FilterMode>,
    global_term: &str,
    global_mode: FilterMode,
) -> Filters {
    let mut filters = Filters::new();

    for (column, value) in column_filters {
        if value.is_empty() {
            continue;
        }
        let mode = filter_mode.get(column).copied().unwrap_or_default();
        let composed = match mode {
            FilterMode::Exact => exact(value),
            FilterMode::Partial => value.clone(),
        };
        filters.insert(*column, composed);
    }

    if !global_term.is_empty() {
        let composed = match global_mode {
            FilterMode::Exact => exact(global_term),
            FilterMode::Partial => global_term.to_string(),
        };
        for column in Column::ALL {
            filters.entry(column).or_insert_with(|| composed.clone());
        }
    }

    filters
}

/// Number of pages needed for `total` records.
pub fn total_pages(total: u64, per_page: u32) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(u64::from(per_page))
}

/// Offset of the first record on a 1-based page.
pub fn page_offset(page: u32, per_page: u32) -> u64 {
    u64::from(page.max(1) - 1) * u64::from(per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modes(entries: &[(Column, FilterMode)]) -> BTreeMap<Column, FilterMode> {
        entries.iter().copied().collect()
    }

    #[test]
    fn pagination_helpers() {
        assert_eq!(total_pages(45, 20), 3);
        assert_eq!(total_pages(40, 20), 2);
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(1, 20), 0);
    }

    #[test]
    fn global_term_does_not_overwrite_column_filter() {
        let columns = BTreeMap::from([(Column::Status, "activo".to_string())]);
        let filters = build_combined_filters(&columns, &BTreeMap::new(), "x", FilterMode::Partial);

        assert_eq!(filters.len(), Column::ALL.len());
        assert_eq!(filters[&Column::Status], "activo");
        for column in Column::ALL.into_iter().filter(|c| *c != Column::Status) {
            assert_eq!(filters[&column], "x", "column {}", column);
        }
    }

    #[test]
    fn exact_mode_is_distinguishable() {
        let columns = BTreeMap::from([(Column::Status, "activo".to_string())]);

        let partial = build_combined_filters(&columns, &BTreeMap::new(), "", FilterMode::Partial);
        let exact_filters = build_combined_filters(
            &columns,
            &modes(&[(Column::Status, FilterMode::Exact)]),
            "",
            FilterMode::Partial,
        );

        assert_eq!(partial[&Column::Status], "activo");
        assert_eq!(exact_filters[&Column::Status], "__EXACT__activo");
        assert_ne!(partial[&Column::Status], exact_filters[&Column::Status]);
        assert_eq!(split_exact(&exact_filters[&Column::Status]), (FilterMode::Exact, "activo"));
    }

    #[test]
    fn exact_global_term_is_prefixed() {
        let filters =
            build_combined_filters(&BTreeMap::new(), &BTreeMap::new(), "1001", FilterMode::Exact);
        assert!(filters.values().all(|v| v == "__EXACT__1001"));
    }

    #[test]
    fn empty_column_value_lets_global_term_through() {
        let columns = BTreeMap::from([(Column::Ciudad, String::new())]);
        let filters = build_combined_filters(
            &columns,
            &modes(&[(Column::Ciudad, FilterMode::Exact)]),
            "cali",
            FilterMode::Partial,
        );
        assert_eq!(filters[&Column::Ciudad], "cali");
    }

    #[test]
    fn no_filters_without_input() {
        let filters =
            build_combined_filters(&BTreeMap::new(), &BTreeMap::new(), "", FilterMode::Exact);
        assert!(filters.is_empty());
    }

    #[test]
    fn sort_click_toggles_or_resets() {
        let first = SortConfig::clicked(None, Column::Nombre);
        assert_eq!(first.direction, SortDirection::Asc);

        let again = SortConfig::clicked(Some(first), Column::Nombre);
        assert_eq!(again.direction, SortDirection::Desc);

        let other = SortConfig::clicked(Some(again), Column::Ciudad);
        assert_eq!(other, SortConfig { key: Column::Ciudad, direction: SortDirection::Asc });
    }
}
