//! Allocation models
//!
//! An allocation model is the compiled form of a specification's
//! calculations. The engine treats it as a black box: given one provider and
//! that provider's source datasets, it returns raw calculation results.

use anyhow::Context;
use async_trait::async_trait;
use fundflow_core::domain::calculation::{CalculationResult, CalculationType, Reference};
use fundflow_core::domain::dataset::{BuildProject, ProviderSourceDataset};
use fundflow_core::domain::provider::ProviderSummary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no allocation model for specification {0}")]
    NotFound(String),

    #[error("allocation model failed: {0}")]
    Execution(String),
}

/// Compiled calculation logic for one specification
///
/// `execute` is CPU-bound and synchronous; the engine runs it on the
/// blocking pool.
pub trait AllocationModel: Send + Sync {
    fn execute(
        &self,
        provider: &ProviderSummary,
        datasets: &[ProviderSourceDataset],
    ) -> Result<Vec<CalculationResult>, ModelError>;
}

/// Produces the allocation model of a build project
#[async_trait]
pub trait AllocationModelLoader: Send + Sync {
    async fn load(
        &self,
        build_project: &BuildProject,
    ) -> Result<Arc<dyn AllocationModel>, ModelError>;
}

/// Loader over models registered up front, keyed by specification id
#[derive(Default, Clone)]
pub struct StaticModelLoader {
    models: HashMap<String, Arc<dyn AllocationModel>>,
}

impl StaticModelLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(
        mut self,
        specification_id: impl Into<String>,
        model: Arc<dyn AllocationModel>,
    ) -> Self {
        self.models.insert(specification_id.into(), model);
        self
    }

    /// Loads field-sum models from a JSON object of
    /// `{ "<specification id>": [ <FieldSumRule>, ... ] }`
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allocation models from {}", path.display()))?;
        let specs: HashMap<String, Vec<FieldSumRule>> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse allocation models in {}", path.display()))?;

        Ok(specs
            .into_iter()
            .fold(Self::new(), |loader, (specification_id, rules)| {
                loader.with_model(specification_id, Arc::new(FieldSumModel::new(rules)))
            }))
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[async_trait]
impl AllocationModelLoader for StaticModelLoader {
    async fn load(
        &self,
        build_project: &BuildProject,
    ) -> Result<Arc<dyn AllocationModel>, ModelError> {
        self.models
            .get(&build_project.specification_id)
            .cloned()
            .ok_or_else(|| ModelError::NotFound(build_project.specification_id.clone()))
    }
}

/// One calculation computed as the sum of a dataset field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSumRule {
    pub calculation_id: String,
    /// Name of the dataset relationship to read
    pub relationship: String,
    pub field: String,
}

/// Model whose calculations each sum one numeric field over a provider's rows
///
/// A non-numeric value is recorded as an exception on that calculation's
/// result; the other calculations still run.
#[derive(Debug, Clone)]
pub struct FieldSumModel {
    rules: Vec<FieldSumRule>,
}

impl FieldSumModel {
    pub fn new(rules: Vec<FieldSumRule>) -> Self {
        Self { rules }
    }

    fn evaluate(rule: &FieldSumRule, datasets: &[ProviderSourceDataset]) -> CalculationResult {
        let mut result = CalculationResult {
            calculation: Reference::new(&rule.calculation_id, &rule.calculation_id),
            calculation_type: CalculationType::Number,
            value: None,
            exception_type: None,
            exception_message: None,
            allocation_line: None,
        };

        let rows = datasets
            .iter()
            .filter(|d| d.data_relationship.name == rule.relationship)
            .flat_map(|d| d.current.rows.iter());

        let mut total: Option<f64> = None;
        for row in rows {
            let Some(value) = row.get(&rule.field) else {
                continue;
            };

            let number = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };

            match number {
                Some(n) => total = Some(total.unwrap_or(0.0) + n),
                None => {
                    result.exception_type = Some("InvalidFieldValue".to_string());
                    result.exception_message = Some(format!(
                        "Field '{}' holds a non-numeric value: {}",
                        rule.field, value
                    ));
                    return result;
                }
            }
        }

        result.value = total;
        result
    }
}

impl AllocationModel for FieldSumModel {
    fn execute(
        &self,
        _provider: &ProviderSummary,
        datasets: &[ProviderSourceDataset],
    ) -> Result<Vec<CalculationResult>, ModelError> {
        Ok(self
            .rules
            .iter()
            .map(|rule| Self::evaluate(rule, datasets))
            .collect())
    }
}
