//! Calculation catalog and result types

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::provider::ProviderSummary;

/// Lightweight id + name pointer to another entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub id: String,
    pub name: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationType {
    Number,
    Funding,
}

/// A calculation defined on a specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub id: String,
    pub name: String,
    pub calculation_type: CalculationType,
    pub allocation_line: Option<Reference>,
}

impl Calculation {
    pub fn reference(&self) -> Reference {
        Reference::new(&self.id, &self.name)
    }

    /// Allocation line a result contributes to; only Funding calculations have one
    pub fn funding_line(&self) -> Option<Reference> {
        match self.calculation_type {
            CalculationType::Funding => self.allocation_line.clone(),
            CalculationType::Number => None,
        }
    }
}

/// Output of one calculation for one provider
///
/// A failing calculation records its exception here instead of failing
/// the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub calculation: Reference,
    pub calculation_type: CalculationType,
    pub value: Option<f64>,
    pub exception_type: Option<String>,
    pub exception_message: Option<String>,
    pub allocation_line: Option<Reference>,
}

impl CalculationResult {
    /// Placeholder for a catalog calculation the model produced nothing for
    pub fn unset(calculation: &Calculation) -> Self {
        Self {
            calculation: calculation.reference(),
            calculation_type: calculation.calculation_type,
            value: None,
            exception_type: None,
            exception_message: None,
            allocation_line: calculation.funding_line(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLineResult {
    pub allocation_line: Reference,
    pub value: Option<f64>,
}

/// All calculation results for one provider under one specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub id: String,
    pub provider: ProviderSummary,
    pub specification_id: String,
    pub calculation_results: Vec<CalculationResult>,
    pub allocation_line_results: Vec<AllocationLineResult>,
    pub created_at: DateTime<Utc>,
}

impl ProviderResult {
    /// Deterministic id: base64 of `"{provider_id}-{specification_id}"`
    pub fn id_for(provider_id: &str, specification_id: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(format!(
            "{}-{}",
            provider_id, specification_id
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_result_id_is_deterministic() {
        let a = ProviderResult::id_for("10001234", "spec-1");
        let b = ProviderResult::id_for("10001234", "spec-1");
        assert_eq!(a, b);
        assert_eq!(a, "MTAwMDEyMzQtc3BlYy0x");
    }

    #[test]
    fn test_provider_result_id_differs_per_pair() {
        let ids = [
            ProviderResult::id_for("p1", "s1"),
            ProviderResult::id_for("p1", "s2"),
            ProviderResult::id_for("p2", "s1"),
        ];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn test_unset_result_keeps_allocation_line_for_funding_only() {
        let funding = Calculation {
            id: "c1".to_string(),
            name: "Pupil Led".to_string(),
            calculation_type: CalculationType::Funding,
            allocation_line: Some(Reference::new("al1", "Basic Entitlement")),
        };
        let number = Calculation {
            calculation_type: CalculationType::Number,
            ..funding.clone()
        };

        assert!(CalculationResult::unset(&funding).allocation_line.is_some());
        assert!(CalculationResult::unset(&number).allocation_line.is_none());
        assert_eq!(CalculationResult::unset(&funding).value, None);
    }
}
