//! Row to provider grouping

use dashmap::DashMap;
use fundflow_core::domain::dataset::Row;
use fundflow_core::domain::provider::IdentifierFieldType;
use rayon::prelude::*;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::index::ProviderIndex;

#[derive(Debug, Default)]
pub struct GroupedRows {
    /// Rows per provider id, in source order
    pub rows_by_provider: BTreeMap<String, Vec<Row>>,
    /// Rows whose identifier matched no provider
    pub unmatched: usize,
}

/// Groups rows by the providers their identifier field resolves to.
///
/// Runs on the rayon pool. A row whose identifier is shared by several
/// providers is copied to each of them.
pub fn group_rows_by_provider(
    rows: &[Row],
    field_name: &str,
    kind: IdentifierFieldType,
    index: &ProviderIndex,
) -> GroupedRows {
    let grouped: DashMap<String, Vec<(usize, Row)>> = DashMap::new();
    let unmatched = AtomicUsize::new(0);

    rows.par_iter().enumerate().for_each(|(position, row)| {
        let value = identifier_value(row, field_name);
        let providers = value
            .as_deref()
            .map(|value| index.lookup(kind, value))
            .unwrap_or(&[]);

        if providers.is_empty() {
            debug!(row = position, identifier = ?value, "No provider found for row");
            unmatched.fetch_add(1, Ordering::Relaxed);
            return;
        }

        for provider_id in providers {
            grouped
                .entry(provider_id.clone())
                .or_default()
                .push((position, row.clone()));
        }
    });

    let rows_by_provider = grouped
        .into_iter()
        .map(|(provider_id, mut rows)| {
            rows.sort_by_key(|(position, _)| *position);
            (provider_id, rows.into_iter().map(|(_, row)| row).collect())
        })
        .collect();

    GroupedRows {
        rows_by_provider,
        unmatched: unmatched.into_inner(),
    }
}

fn identifier_value(row: &Row, field_name: &str) -> Option<String> {
    match row.get(field_name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
