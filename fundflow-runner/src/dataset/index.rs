//! Provider identifier index

use fundflow_core::domain::provider::{IdentifierFieldType, ProviderSummary};
use std::collections::HashMap;

/// Maps (identifier scheme, value) to the providers carrying it
///
/// Several providers can share a value (every school in a local authority
/// shares its Authority code), so lookups return a list.
#[derive(Debug, Default)]
pub struct ProviderIndex {
    entries: HashMap<(IdentifierFieldType, String), Vec<String>>,
    provider_count: usize,
}

impl ProviderIndex {
    pub fn build(providers: &[ProviderSummary]) -> Self {
        let mut entries: HashMap<(IdentifierFieldType, String), Vec<String>> = HashMap::new();

        for provider in providers {
            for kind in IdentifierFieldType::ALL {
                if let Some(value) = kind.value_of(provider) {
                    entries
                        .entry((kind, value.to_string()))
                        .or_default()
                        .push(provider.id.clone());
                }
            }
        }

        Self {
            entries,
            provider_count: providers.len(),
        }
    }

    pub fn lookup(&self, kind: IdentifierFieldType, value: &str) -> &[String] {
        self.entries
            .get(&(kind, value.trim().to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn provider_count(&self) -> usize {
        self.provider_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(id: &str, urn: &str, authority: &str) -> ProviderSummary {
        ProviderSummary {
            id: id.to_string(),
            name: format!("School {}", id),
            urn: Some(urn.to_string()),
            authority: Some(authority.to_string()),
            ..ProviderSummary::default()
        }
    }

    #[test]
    fn test_lookup_by_each_scheme() {
        let index = ProviderIndex::build(&[
            provider("p1", "100001", "202"),
            provider("p2", "100002", "202"),
        ]);

        assert_eq!(index.lookup(IdentifierFieldType::Urn, "100002"), ["p2"]);
        assert_eq!(index.lookup(IdentifierFieldType::Urn, " 100001 "), ["p1"]);
        assert_eq!(index.lookup(IdentifierFieldType::Authority, "202"), ["p1", "p2"]);
        assert!(index.lookup(IdentifierFieldType::Ukprn, "100001").is_empty());
        assert_eq!(index.provider_count(), 2);
    }
}
