use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::Duration;
use url::Url;

use crate::{
    constants::{DEFAULT_BOOST, STANDARD_ATTRIBUTES},
    error::{AppError, Result},
    models::{CollectionItem, NftMetadata, TraitEntry, TraitValue},
    services::{
        display::placeholder_name,
        metadata::{convert_ipfs_to_http, Gateways},
    },
};

// Attribute keys that describe the fighter rather than a trainable stat.
const NON_TRAIT_KEYS: [&str; 3] = ["level", "serial_number", "mileage_km"];

/// Off-chain inventory of the fighters a wallet holds.
#[async_trait::async_trait]
pub trait InventorySource: Send + Sync {
    async fn fighters_by_owner(&self, wallet: &str) -> Result<Vec<CollectionItem>>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FighterTokenId {
    Number(u64),
    Text(String),
}

impl FighterTokenId {
    fn as_decimal(&self) -> String {
        match self {
            FighterTokenId::Number(n) => n.to_string(),
            FighterTokenId::Text(s) => s.trim().trim_start_matches('#').to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FighterRecord {
    pub token_id: FighterTokenId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

#[derive(Clone, Debug)]
pub struct FightersApiClient {
    base_url: String,
    client: Client,
    timeout: Duration,
    gateways: Gateways,
    collection_name: String,
}

impl FightersApiClient {
    pub fn new(
        base_url: &str,
        client: Client,
        timeout: Duration,
        gateways: Gateways,
        collection_name: &str,
    ) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
            timeout,
            gateways,
            collection_name: collection_name.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.is_empty()
    }

    pub async fn fetch_records(&self, wallet: &str) -> Result<Vec<FighterRecord>> {
        if !self.is_configured() {
            return Ok(Vec::new());
        }

        let url = Url::parse_with_params(
            &format!("{}/getFighterByOwner", self.base_url),
            &[("owner", wallet)],
        )
        .map_err(|e| AppError::Internal(format!("invalid fighters api url: {}", e)))?;

        let resp = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("fighters api: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AppError::ExternalAPI(format!(
                "fighters api returned {}",
                resp.status()
            )));
        }

        resp.json::<Vec<FighterRecord>>()
            .await
            .map_err(|e| AppError::ExternalAPI(format!("fighters api body: {}", e)))
    }
}

#[async_trait::async_trait]
impl InventorySource for FightersApiClient {
    async fn fighters_by_owner(&self, wallet: &str) -> Result<Vec<CollectionItem>> {
        let records = self.fetch_records(wallet).await?;
        tracing::debug!("fighters api owner={} fighters={}", wallet, records.len());
        Ok(records
            .iter()
            .map(|record| fighter_to_item(record, &self.collection_name, &self.gateways))
            .collect())
    }
}

/// Stat traits in canonical fighter order, then any remaining keys.
fn fighter_traits(attributes: &Map<String, Value>) -> Vec<(String, TraitValue)> {
    let canonical_keys: Vec<String> = STANDARD_ATTRIBUTES
        .iter()
        .map(|(name, _)| name.replace(' ', "_"))
        .collect();

    let ordered = canonical_keys
        .iter()
        .filter(|key| attributes.contains_key(key.as_str()))
        .chain(
            attributes
                .keys()
                .filter(|key| !canonical_keys.contains(*key)),
        );

    ordered
        .filter(|key| !NON_TRAIT_KEYS.contains(&key.as_str()))
        .filter_map(|key| {
            let value = attributes.get(key.as_str()).and_then(TraitValue::from_json)?;
            Some((key.clone(), value))
        })
        .collect()
}

pub fn rarity_for_level(level: f64) -> &'static str {
    if level >= 20.0 {
        "Mythic"
    } else if level >= 15.0 {
        "Legendary"
    } else if level >= 10.0 {
        "Epic"
    } else if level >= 5.0 {
        "Rare"
    } else {
        "Common"
    }
}

fn boost_label(traits: &[(String, TraitValue)]) -> String {
    let mut best: Option<(&str, f64, &TraitValue)> = None;
    for (key, value) in traits {
        let numeric = match value {
            TraitValue::Number(n) => *n,
            TraitValue::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::MIN),
        };
        if best.map_or(true, |(_, max, _)| numeric > max) {
            best = Some((key.as_str(), numeric, value));
        }
    }

    let Some((key, _, value)) = best else {
        return DEFAULT_BOOST.to_string();
    };
    let mut chars = key.chars();
    let label = match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    };
    format!("{} +{}", label.replace('_', " "), value.as_display())
}

pub fn fighter_to_item(
    record: &FighterRecord,
    collection_name: &str,
    gateways: &Gateways,
) -> CollectionItem {
    let token_id = record.token_id.as_decimal();
    let traits = fighter_traits(&record.attributes);
    let attributes: Vec<TraitEntry> = traits
        .iter()
        .map(|(key, value)| TraitEntry::new(key.replace('_', " "), value.clone()))
        .collect();

    let level = record
        .attributes
        .get("level")
        .and_then(TraitValue::from_json)
        .unwrap_or(TraitValue::Number(0.0));
    let level_numeric = match &level {
        TraitValue::Number(n) => *n,
        TraitValue::Text(s) => s.trim().parse::<f64>().unwrap_or(0.0),
    };

    let image = convert_ipfs_to_http(record.image.as_deref().unwrap_or_default(), gateways);

    let name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| placeholder_name(collection_name, &token_id));

    CollectionItem {
        token_id,
        name: name.clone(),
        image,
        level: level.as_display(),
        rarity: rarity_for_level(level_numeric).to_string(),
        boost: boost_label(&traits),
        is_owned: true,
        creator: record.creator.clone(),
        description: record.description.clone(),
        raw_metadata: Some(NftMetadata {
            name: Some(name),
            description: record.description.clone(),
            image: record.image.clone(),
            attributes: attributes.clone(),
            ..NftMetadata::default()
        }),
        attributes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::spawn_server;
    use axum::{extract::Query, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    fn record(value: Value) -> FighterRecord {
        serde_json::from_value(value).expect("fighter record")
    }

    #[test]
    fn converts_fighter_with_canonical_trait_order() {
        let fighter = record(json!({
            "tokenId": 42,
            "name": "SILVAA",
            "image": "ipfs://QmFighter/42.png",
            "creator": "0xcreator",
            "description": "Southpaw",
            "attributes": {
                "luck": 70, "punch": 88, "level": 16, "serial_number": 7,
                "mental_strength": 91, "mileage_km": 12.5, "speed": 60
            }
        }));
        let item = fighter_to_item(&fighter, "Hellraiser", &Gateways::default());

        assert_eq!(item.token_id, "42");
        assert_eq!(item.image, "https://gateway.pinata.cloud/ipfs/QmFighter/42.png");
        assert_eq!(item.level, "16");
        assert_eq!(item.rarity, "Legendary");
        assert_eq!(item.boost, "Mental strength +91");
        assert_eq!(item.creator.as_deref(), Some("0xcreator"));

        let names: Vec<_> = item
            .attributes
            .iter()
            .filter_map(|t| t.trait_type.clone())
            .collect();
        assert_eq!(names, vec!["punch", "speed", "mental strength", "luck"]);
    }

    #[test]
    fn ties_keep_the_first_attribute_and_empty_stats_use_dash() {
        let fighter = record(json!({
            "tokenId": "9",
            "name": "ATHENA",
            "image": "https://cdn.example.com/9.png",
            "attributes": {"level": 3, "punch": 80, "endurance": 80}
        }));
        let item = fighter_to_item(&fighter, "Hellraiser", &Gateways::default());
        assert_eq!(item.boost, "Punch +80");
        assert_eq!(item.rarity, "Common");

        let bare = record(json!({"tokenId": 1, "attributes": {"level": 20}}));
        let item = fighter_to_item(&bare, "Hellraiser", &Gateways::default());
        assert_eq!(item.boost, "\u{2014}");
        assert_eq!(item.rarity, "Mythic");
        assert_eq!(item.name, "Hellraiser #1");
    }

    #[test]
    fn rarity_thresholds() {
        assert_eq!(rarity_for_level(4.0), "Common");
        assert_eq!(rarity_for_level(5.0), "Rare");
        assert_eq!(rarity_for_level(10.0), "Epic");
        assert_eq!(rarity_for_level(19.0), "Legendary");
        assert_eq!(rarity_for_level(25.0), "Mythic");
    }

    #[tokio::test]
    async fn client_queries_owner_and_maps_failures() {
        let app = Router::new().route(
            "/getFighterByOwner",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                match params.get("owner").map(String::as_str) {
                    Some("0xabc") => Ok(Json(json!([
                        {"tokenId": 5, "name": "DASHA", "image": "", "attributes": {"level": 6, "speed": 90}}
                    ]))),
                    _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
                }
            }),
        );
        let base = spawn_server(app).await;
        let client = FightersApiClient::new(
            &base,
            Client::new(),
            Duration::from_secs(2),
            Gateways::default(),
            "Hellraiser",
        );

        let items = client.fighters_by_owner("0xabc").await.expect("fighters");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].token_id, "5");
        assert_eq!(items[0].rarity, "Rare");

        let err = client.fighters_by_owner("0xdef").await.expect_err("upstream 500");
        assert!(matches!(err, AppError::ExternalAPI(_)));
    }

    #[tokio::test]
    async fn unconfigured_client_returns_nothing() {
        let client = FightersApiClient::new(
            "",
            Client::new(),
            Duration::from_secs(1),
            Gateways::default(),
            "Hellraiser",
        );
        assert!(!client.is_configured());
        assert!(client.fighters_by_owner("0xabc").await.expect("empty").is_empty());
    }
}
