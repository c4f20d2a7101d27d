//! Provider result assembly
//!
//! Merges raw model output against the calculation catalog and derives the
//! allocation line totals.

use chrono::{DateTime, Utc};
use fundflow_core::domain::calculation::{
    AllocationLineResult, Calculation, CalculationResult, CalculationType, ProviderResult,
};
use fundflow_core::domain::provider::ProviderSummary;
use std::collections::HashMap;
use tracing::debug;

/// Builds the result for one provider.
///
/// The output holds exactly one calculation result per catalog entry, in
/// catalog order. Catalog metadata (name, type, allocation line) wins over
/// whatever the model reported; model results for unknown calculations are
/// dropped.
pub fn build_provider_result(
    provider: ProviderSummary,
    specification_id: &str,
    catalog: &[Calculation],
    raw: Vec<CalculationResult>,
    created_at: DateTime<Utc>,
) -> ProviderResult {
    let mut produced: HashMap<String, CalculationResult> = raw
        .into_iter()
        .map(|result| (result.calculation.id.clone(), result))
        .collect();

    let calculation_results: Vec<CalculationResult> = catalog
        .iter()
        .map(|calculation| match produced.remove(&calculation.id) {
            Some(result) => CalculationResult {
                calculation: calculation.reference(),
                calculation_type: calculation.calculation_type,
                allocation_line: calculation.funding_line(),
                ..result
            },
            None => CalculationResult::unset(calculation),
        })
        .collect();

    if !produced.is_empty() {
        debug!(
            provider_id = %provider.id,
            "Dropped {} result(s) for calculations outside the catalog",
            produced.len()
        );
    }

    let allocation_line_results = sum_allocation_lines(&calculation_results);

    ProviderResult {
        id: ProviderResult::id_for(&provider.id, specification_id),
        provider,
        specification_id: specification_id.to_string(),
        calculation_results,
        allocation_line_results,
        created_at,
    }
}

/// Totals Funding results per allocation line; unset values count as zero
fn sum_allocation_lines(results: &[CalculationResult]) -> Vec<AllocationLineResult> {
    let mut lines: Vec<AllocationLineResult> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for result in results {
        if result.calculation_type != CalculationType::Funding {
            continue;
        }
        let Some(line) = &result.allocation_line else {
            continue;
        };

        let index = *positions.entry(line.id.clone()).or_insert_with(|| {
            lines.push(AllocationLineResult {
                allocation_line: line.clone(),
                value: Some(0.0),
            });
            lines.len() - 1
        });

        let total = lines[index].value.unwrap_or(0.0) + result.value.unwrap_or(0.0);
        lines[index].value = Some(total);
    }

    lines
}
