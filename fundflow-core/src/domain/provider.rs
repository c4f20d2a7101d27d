//! Provider domain types
//!
//! Providers are funding recipients known under several external
//! identifier schemes. Dataset rows carry one of those identifiers and are
//! mapped back onto providers through [`IdentifierFieldType`].

use serde::{Deserialize, Serialize};

/// Summary record of a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub urn: Option<String>,
    pub ukprn: Option<String>,
    pub upin: Option<String>,
    pub authority: Option<String>,
    pub establishment_number: Option<String>,
    pub provider_type: Option<String>,
}

/// External identifier scheme a dataset field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentifierFieldType {
    #[serde(rename = "URN")]
    Urn,
    #[serde(rename = "UKPRN")]
    Ukprn,
    #[serde(rename = "UPIN")]
    Upin,
    Authority,
    EstablishmentNumber,
}

impl IdentifierFieldType {
    pub const ALL: [IdentifierFieldType; 5] = [
        IdentifierFieldType::Urn,
        IdentifierFieldType::Ukprn,
        IdentifierFieldType::Upin,
        IdentifierFieldType::Authority,
        IdentifierFieldType::EstablishmentNumber,
    ];

    /// Reads this identifier off a provider
    pub fn value_of(self, provider: &ProviderSummary) -> Option<&str> {
        let value = match self {
            IdentifierFieldType::Urn => provider.urn.as_deref(),
            IdentifierFieldType::Ukprn => provider.ukprn.as_deref(),
            IdentifierFieldType::Upin => provider.upin.as_deref(),
            IdentifierFieldType::Authority => provider.authority.as_deref(),
            IdentifierFieldType::EstablishmentNumber => provider.establishment_number.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_of_reads_each_scheme() {
        let provider = ProviderSummary {
            id: "p1".to_string(),
            name: "Little Oak Primary".to_string(),
            urn: Some("100001".to_string()),
            ukprn: Some("10004321".to_string()),
            upin: Some(" 2001 ".to_string()),
            authority: Some("".to_string()),
            establishment_number: None,
            provider_type: None,
        };

        assert_eq!(IdentifierFieldType::Urn.value_of(&provider), Some("100001"));
        assert_eq!(IdentifierFieldType::Ukprn.value_of(&provider), Some("10004321"));
        assert_eq!(IdentifierFieldType::Upin.value_of(&provider), Some("2001"));
        assert_eq!(IdentifierFieldType::Authority.value_of(&provider), None);
        assert_eq!(IdentifierFieldType::EstablishmentNumber.value_of(&provider), None);
    }

    #[test]
    fn test_identifier_serializes_with_scheme_names() {
        let json = serde_json::to_string(&IdentifierFieldType::Ukprn).unwrap();
        assert_eq!(json, "\"UKPRN\"");
        let parsed: IdentifierFieldType = serde_json::from_str("\"EstablishmentNumber\"").unwrap();
        assert_eq!(parsed, IdentifierFieldType::EstablishmentNumber);
    }
}
