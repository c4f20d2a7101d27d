//! Dataset domain types
//!
//! Covers the uploaded dataset metadata, its schema, the specification's
//! build project that binds datasets to calculations, and the per-provider
//! source data that calculations read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::calculation::Reference;
use crate::domain::provider::IdentifierFieldType;

/// One tabular row, keyed by field name
///
/// Ordered map so serialized rows compare byte-for-byte.
pub type Row = BTreeMap<String, serde_json::Value>;

/// Uploaded dataset with its version history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub definition: Reference,
    pub history: Vec<DatasetVersion>,
}

impl Dataset {
    pub fn version(&self, version: i32) -> Option<&DatasetVersion> {
        self.history.iter().find(|v| v.version == version)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetVersion {
    pub version: i32,
    pub blob_name: String,
    pub author: Reference,
    pub date: DateTime<Utc>,
}

/// Schema of a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDefinition {
    pub id: String,
    pub name: String,
    pub table_definitions: Vec<TableDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub id: String,
    pub name: String,
    pub field_definitions: Vec<FieldDefinition>,
}

impl TableDefinition {
    /// The field rows are matched to providers by, if any
    pub fn identifier_field(&self) -> Option<(&FieldDefinition, IdentifierFieldType)> {
        self.field_definitions
            .iter()
            .find_map(|f| f.identifier_field_type.map(|kind| (f, kind)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub identifier_field_type: Option<IdentifierFieldType>,
}

/// Raw rows of one table read from storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableLoadResult {
    pub table_definition_id: String,
    pub rows: Vec<Row>,
}

/// A specification's compiled calculation unit plus its dataset bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildProject {
    pub id: String,
    pub specification_id: String,
    #[serde(default)]
    pub dataset_relationships: Vec<DatasetRelationship>,
}

impl BuildProject {
    pub fn relationship(&self, relationship_id: &str) -> Option<&DatasetRelationship> {
        self.dataset_relationships
            .iter()
            .find(|r| r.id == relationship_id)
    }
}

/// Binding between a dataset definition and a specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRelationship {
    pub id: String,
    pub name: String,
    pub definition_id: String,
    /// When set, the providers found in this dataset scope the calculation run
    #[serde(default)]
    pub defines_scope: bool,
}

/// Source data of one provider for one dataset relationship
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSourceDataset {
    pub id: String,
    pub specification_id: String,
    pub provider_id: String,
    pub data_relationship: Reference,
    pub data_definition: Reference,
    pub dataset_id: String,
    pub current: ProviderSourceDatasetVersion,
}

impl ProviderSourceDataset {
    pub fn id_for(specification_id: &str, relationship_id: &str, provider_id: &str) -> String {
        format!("{}_{}_{}", specification_id, relationship_id, provider_id)
    }
}

/// Immutable snapshot of a provider's rows at one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSourceDatasetVersion {
    pub id: String,
    /// Id of the owning [`ProviderSourceDataset`]
    pub entity_id: String,
    pub provider_id: String,
    pub version: i32,
    pub rows: Vec<Row>,
    pub author: Reference,
    pub date: DateTime<Utc>,
}

impl ProviderSourceDatasetVersion {
    /// Version 1 for a provider that has no source data yet
    pub fn initial(
        entity_id: impl Into<String>,
        provider_id: impl Into<String>,
        rows: Vec<Row>,
        author: Reference,
        date: DateTime<Utc>,
    ) -> Self {
        let entity_id = entity_id.into();
        Self {
            id: format!("{}_version_1", entity_id),
            entity_id,
            provider_id: provider_id.into(),
            version: 1,
            rows,
            author,
            date,
        }
    }

    /// Builds the version that follows this one, carrying the new rows.
    pub fn next(&self, rows: Vec<Row>, author: Reference, date: DateTime<Utc>) -> Self {
        let version = self.version + 1;
        Self {
            id: format!("{}_version_{}", self.entity_id, version),
            entity_id: self.entity_id.clone(),
            provider_id: self.provider_id.clone(),
            version,
            rows,
            author,
            date,
        }
    }

    /// Exact comparison of serialized row content
    pub fn has_same_rows(&self, rows: &[Row]) -> Result<bool, serde_json::Error> {
        Ok(serde_json::to_string(&self.rows)? == serde_json::to_string(rows)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(urn: &str, pupils: i64) -> Row {
        let mut row = Row::new();
        row.insert("URN".to_string(), json!(urn));
        row.insert("Pupils".to_string(), json!(pupils));
        row
    }

    fn author() -> Reference {
        Reference::new("user-1", "Test User")
    }

    #[test]
    fn test_next_increments_version_and_keeps_identity() {
        let v1 = ProviderSourceDatasetVersion::initial(
            "s1_r1_p1",
            "p1",
            vec![row("100", 10)],
            author(),
            Utc::now(),
        );
        let v2 = v1.next(vec![row("100", 12)], author(), Utc::now());

        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert_eq!(v2.entity_id, v1.entity_id);
        assert_eq!(v2.provider_id, "p1");
        assert_eq!(v2.id, "s1_r1_p1_version_2");
        assert_eq!(v1.rows, vec![row("100", 10)]);
    }

    #[test]
    fn test_has_same_rows_is_exact() {
        let v1 = ProviderSourceDatasetVersion::initial(
            "e",
            "p1",
            vec![row("100", 10), row("100", 11)],
            author(),
            Utc::now(),
        );

        assert!(v1.has_same_rows(&[row("100", 10), row("100", 11)]).unwrap());
        assert!(!v1.has_same_rows(&[row("100", 11), row("100", 10)]).unwrap());
        assert!(!v1.has_same_rows(&[row("100", 10)]).unwrap());
    }

    #[test]
    fn test_identifier_field_lookup() {
        let table = TableDefinition {
            id: "t1".to_string(),
            name: "Pupil Numbers".to_string(),
            field_definitions: vec![
                FieldDefinition {
                    id: "f1".to_string(),
                    name: "Pupils".to_string(),
                    identifier_field_type: None,
                },
                FieldDefinition {
                    id: "f2".to_string(),
                    name: "URN".to_string(),
                    identifier_field_type: Some(IdentifierFieldType::Urn),
                },
            ],
        };

        let (field, kind) = table.identifier_field().unwrap();
        assert_eq!(field.name, "URN");
        assert_eq!(kind, IdentifierFieldType::Urn);
    }
}
