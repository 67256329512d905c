use crate::{
    constants::{
        DEFAULT_BOOST, DEFAULT_LEVEL, DEFAULT_NFT_IMAGE, DEFAULT_RARITY,
        IPFS_BARE_HASH_GATEWAY_URL, STANDARD_ATTRIBUTES,
    },
    models::{CollectionItem, NftMetadata, NumericAttribute, TraitEntry},
    services::metadata::{convert_arweave_to_http, convert_ipfs_to_http, Gateways},
};

/// Placeholder display name used when metadata carries none.
pub fn placeholder_name(collection_name: &str, token_id: &str) -> String {
    format!("{} #{}", collection_name, token_id)
}

/// Builds the display-ready item for one owned token. Missing metadata
/// yields an item made entirely of defaults.
pub fn extract_display_data(
    metadata: Option<&NftMetadata>,
    token_id: &str,
    collection_name: &str,
    gateways: &Gateways,
) -> CollectionItem {
    let Some(metadata) = metadata else {
        return CollectionItem {
            token_id: token_id.to_string(),
            name: placeholder_name(collection_name, token_id),
            image: DEFAULT_NFT_IMAGE.to_string(),
            level: DEFAULT_LEVEL.to_string(),
            rarity: DEFAULT_RARITY.to_string(),
            boost: DEFAULT_BOOST.to_string(),
            is_owned: true,
            creator: None,
            description: None,
            attributes: Vec::new(),
            raw_metadata: None,
        };
    };

    let name = metadata
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| placeholder_name(collection_name, token_id));

    CollectionItem {
        token_id: token_id.to_string(),
        name,
        image: normalize_image(metadata.image.as_deref(), gateways),
        level: extract_level(metadata),
        rarity: extract_rarity(metadata),
        boost: extract_boost(metadata),
        is_owned: true,
        creator: None,
        description: metadata.description.clone(),
        attributes: metadata.attributes.clone(),
        raw_metadata: Some(metadata.clone()),
    }
}

/// Turns a metadata image reference into something a browser can load.
pub fn normalize_image(raw: Option<&str>, gateways: &Gateways) -> String {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return DEFAULT_NFT_IMAGE.to_string();
    }

    let mut image = if raw.starts_with("ipfs://") {
        convert_ipfs_to_http(raw, gateways)
    } else if raw.starts_with("ar://") {
        convert_arweave_to_http(raw, gateways)
    } else {
        raw.to_string()
    };

    if !has_loadable_prefix(&image) && !image.starts_with("data:") && image.len() > 10 {
        image = if !image.contains('.') && !image.contains('/') {
            format!("{}{}", IPFS_BARE_HASH_GATEWAY_URL, image)
        } else {
            format!("/{}", image)
        };
    }

    if has_loadable_prefix(&image) || image.starts_with("data:") {
        image
    } else {
        DEFAULT_NFT_IMAGE.to_string()
    }
}

fn has_loadable_prefix(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://") || image.starts_with('/')
}

fn trait_value_lower(entry: &TraitEntry) -> String {
    entry
        .value
        .as_ref()
        .map(|value| value.as_display().to_lowercase())
        .unwrap_or_default()
}

fn trait_value_string(entry: &TraitEntry) -> Option<String> {
    entry.value.as_ref().map(|value| value.as_display())
}

pub fn extract_level(metadata: &NftMetadata) -> String {
    let mut level = metadata
        .attributes
        .iter()
        .find(|entry| {
            let name = entry.trait_type_lower();
            matches!(name.as_str(), "level" | "lv" | "lvl")
                || name.contains("level")
                || trait_value_lower(entry).contains("level")
        })
        .and_then(trait_value_string)
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

    if level == DEFAULT_LEVEL {
        if let Some(from_name) = metadata.name.as_deref().and_then(level_from_name) {
            level = from_name;
        }
    }

    if level == DEFAULT_LEVEL {
        if let Some(from_properties) = metadata.property_string(&["level", "Level", "LVL"]) {
            level = from_properties;
        }
    }

    level
}

/// Finds `level 7`, `Lv-12`, `lvl:3` style markers in a token name.
fn level_from_name(name: &str) -> Option<String> {
    let lower = name.to_lowercase();
    ["level", "lv", "lvl"]
        .iter()
        .find_map(|marker| digits_after_marker(&lower, marker))
}

fn digits_after_marker(text: &str, marker: &str) -> Option<String> {
    text.match_indices(marker).find_map(|(idx, _)| {
        let rest = text[idx + marker.len()..].trim_start();
        let rest = rest
            .strip_prefix(':')
            .or_else(|| rest.strip_prefix('-'))
            .unwrap_or(rest)
            .trim_start();
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        (!digits.is_empty()).then_some(digits)
    })
}

pub fn extract_rarity(metadata: &NftMetadata) -> String {
    let mut rarity = metadata
        .attributes
        .iter()
        .find(|entry| {
            let name = entry.trait_type_lower();
            name.contains("rarity") || name.contains("tier") || name.contains("rank")
        })
        .and_then(trait_value_string)
        .unwrap_or_else(|| DEFAULT_RARITY.to_string());

    if rarity == DEFAULT_RARITY {
        if let Some(from_properties) =
            metadata.property_string(&["rarity", "Rarity", "tier", "Tier"])
        {
            rarity = from_properties;
        }
    }

    rarity
}

pub fn extract_boost(metadata: &NftMetadata) -> String {
    let named = metadata
        .attributes
        .iter()
        .find(|entry| {
            let name = entry.trait_type_lower();
            ["boost", "bonus", "power", "ability"]
                .iter()
                .any(|marker| name.contains(marker))
        })
        .and_then(trait_value_string);
    if let Some(boost) = named {
        return boost;
    }

    metadata
        .attributes
        .iter()
        .find(|entry| {
            let value = trait_value_lower(entry);
            value.contains('+') || value.contains("bonus") || value.contains("boost")
        })
        .and_then(|entry| entry.value.as_ref())
        .filter(|value| value.is_truthy())
        .map(|value| value.as_display())
        .unwrap_or_else(|| DEFAULT_BOOST.to_string())
}

fn canonical_attribute_name(trait_type: &str) -> String {
    let collapsed = trait_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if collapsed.contains("mental strength") {
        collapsed
    } else if collapsed.contains("mentalstrength") {
        collapsed.replacen("mentalstrength", "mental strength", 1)
    } else {
        collapsed.replacen("mental", "mental strength", 1)
    }
}

/// The twelve fighter attributes in display order, read from numeric traits
/// with per-attribute baselines for anything missing.
pub fn numeric_attributes(traits: &[TraitEntry]) -> Vec<NumericAttribute> {
    // Later traits overwrite earlier ones with the same name, keeping first-seen order.
    let mut values: Vec<(String, u32)> = Vec::new();
    for entry in traits {
        let Some(value) = entry.value.as_ref().and_then(|v| v.as_percent()) else {
            continue;
        };
        let name = canonical_attribute_name(entry.trait_type.as_deref().unwrap_or_default());
        if name.is_empty() {
            continue;
        }
        match values.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => values.push((name, value)),
        }
    }

    STANDARD_ATTRIBUTES
        .iter()
        .map(|(name, baseline)| {
            let exact = values
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| *value);
            let partial = || {
                values
                    .iter()
                    .find(|(key, _)| key.contains(name) || name.contains(key.as_str()))
                    .map(|(_, value)| *value)
            };
            NumericAttribute {
                name: name.to_string(),
                value: exact.or_else(partial).unwrap_or(*baseline),
            }
        })
        .collect()
}
