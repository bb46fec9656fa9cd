//! Test data fixtures for the mock server.
//!
//! Provides factory functions for creating realistic test data.

use serde_json::{json, Value};

use super::state::Attributes;
use crate::ModelKind;

/// Login accepted by the default scenario.
pub const DEFAULT_EMAIL: &str = "daniel@atomx.com";

/// Password accepted by the default scenario.
pub const DEFAULT_PASSWORD: &str = "password";

/// Timestamp written into fixture records.
const FIXTURE_TIMESTAMP: &str = "2015-06-18 09:20:18";

/// Collection of fixture factories for test data.
pub struct Fixtures;

impl Fixtures {
    /// Build an attribute map from a JSON object literal.
    pub fn attributes(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    // =========================================================================
    // Account Fixtures
    // =========================================================================

    /// Create an advertiser.
    pub fn advertiser(id: u64, name: &str) -> Attributes {
        Self::attributes(json!({
            "id": id,
            "name": name,
            "state": "ACTIVE",
            "created_at": FIXTURE_TIMESTAMP,
        }))
    }

    /// Create a publisher site.
    pub fn site(id: u64, name: &str) -> Attributes {
        Self::attributes(json!({
            "id": id,
            "name": name,
            "domain_id": id,
            "state": "ACTIVE",
        }))
    }

    // =========================================================================
    // Campaign Fixtures
    // =========================================================================

    /// Create a creative owned by an advertiser and running on sites.
    pub fn creative(id: u64, title: &str, advertiser_id: u64, site_ids: &[u64]) -> Attributes {
        Self::attributes(json!({
            "id": id,
            "title": title,
            "advertiser": advertiser_id,
            "advertiser_id": advertiser_id,
            "sites": site_ids,
            "size": "300x250",
            "state": "ACTIVE",
            "created_at": FIXTURE_TIMESTAMP,
            "updated_at": FIXTURE_TIMESTAMP,
        }))
    }

    /// Create a targeting profile.
    pub fn profile(id: u64, name: &str, advertiser_id: u64) -> Attributes {
        Self::attributes(json!({
            "id": id,
            "name": name,
            "advertiser_id": advertiser_id,
            "countries_filter": [],
            "state": "ACTIVE",
        }))
    }

    /// Create the default test scenario.
    pub fn default_scenario() -> DefaultScenario {
        DefaultScenario::new()
    }
}

/// A complete test scenario with related entities.
pub struct DefaultScenario {
    pub users: Vec<(String, String)>,
    pub records: Vec<(ModelKind, Attributes)>,
}

impl DefaultScenario {
    fn new() -> Self {
        let users = vec![(DEFAULT_EMAIL.to_string(), DEFAULT_PASSWORD.to_string())];

        let mut records = vec![
            (ModelKind::Advertiser, Fixtures::advertiser(1, "Test Advertiser")),
            (ModelKind::Site, Fixtures::site(1, "news.example.com")),
            (ModelKind::Site, Fixtures::site(2, "sports.example.com")),
            (ModelKind::Profile, Fixtures::profile(1, "Default profile", 1)),
        ];

        records.extend((1..=8).map(|id| {
            (
                ModelKind::Creative,
                Fixtures::creative(id, &format!("Creative {id}"), 1, &[1, 2]),
            )
        }));

        Self { users, records }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creative_fixture_references_advertiser() {
        let creative = Fixtures::creative(3, "Banner", 7, &[1]);
        assert_eq!(creative.get("advertiser"), Some(&json!(7)));
        assert_eq!(creative.get("sites"), Some(&json!([1])));
    }

    #[test]
    fn test_default_scenario_has_creatives() {
        let scenario = Fixtures::default_scenario();
        let creatives = scenario
            .records
            .iter()
            .filter(|(kind, _)| *kind == ModelKind::Creative)
            .count();
        assert_eq!(creatives, 8);
        assert_eq!(scenario.users.len(), 1);
    }
}
