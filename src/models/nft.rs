use serde::Serialize;
use serde_json::{Map, Value};

// ==================== METADATA ====================

/// Trait value as found in token metadata: numeric, or text (often a numeric string).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TraitValue {
    Number(f64),
    Text(String),
}

impl TraitValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64().map(TraitValue::Number),
            Value::String(s) => Some(TraitValue::Text(s.clone())),
            Value::Bool(b) => Some(TraitValue::Text(b.to_string())),
            _ => None,
        }
    }

    pub fn as_display(&self) -> String {
        match self {
            TraitValue::Number(n) => n.to_string(),
            TraitValue::Text(s) => s.clone(),
        }
    }

    /// Value usable as a 0-100 progress indicator, if it is one.
    pub fn as_percent(&self) -> Option<u32> {
        match self {
            TraitValue::Number(n) if n.is_finite() => Some(n.round().clamp(0.0, 100.0) as u32),
            TraitValue::Number(_) => None,
            TraitValue::Text(s) => {
                let parsed = leading_integer(s)?;
                (0..=100).contains(&parsed).then_some(parsed as u32)
            }
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            TraitValue::Number(n) => *n != 0.0 && !n.is_nan(),
            TraitValue::Text(s) => !s.is_empty(),
        }
    }
}

// Parses the integer prefix of a string the way loose numeric inputs are written ("85", " 42pts").
fn leading_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraitEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trait_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<TraitValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_type: Option<String>,
}

impl TraitEntry {
    pub fn new(trait_type: impl Into<String>, value: TraitValue) -> Self {
        Self {
            trait_type: Some(trait_type.into()),
            value: Some(value),
            display_type: None,
        }
    }

    pub fn trait_type_lower(&self) -> String {
        self.trait_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Token metadata document. Built leniently: malformed fields are dropped,
/// unknown fields are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NftMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<TraitEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NftMetadata {
    /// Returns `None` unless the document is a JSON object.
    pub fn from_json(document: Value) -> Option<Self> {
        let Value::Object(mut fields) = document else {
            return None;
        };

        let mut take_string = |key: &str| match fields.remove(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        let name = take_string("name");
        let description = take_string("description");
        let image = take_string("image");

        let attributes = match fields.remove("attributes") {
            Some(Value::Array(entries)) => entries.iter().filter_map(trait_entry_from_json).collect(),
            _ => Vec::new(),
        };
        let properties = match fields.remove("properties") {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };

        Some(Self {
            name,
            description,
            image,
            attributes,
            properties,
            extra: fields,
        })
    }

    /// First non-null property among `keys`, rendered as a display string.
    pub fn property_string(&self, keys: &[&str]) -> Option<String> {
        let properties = self.properties.as_ref()?;
        keys.iter()
            .filter_map(|key| properties.get(*key))
            .find_map(|value| match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
                _ => None,
            })
    }
}

fn trait_entry_from_json(entry: &Value) -> Option<TraitEntry> {
    let object = entry.as_object()?;
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
    Some(TraitEntry {
        trait_type: text("trait_type"),
        value: object.get("value").and_then(TraitValue::from_json),
        display_type: text("display_type"),
    })
}

// ==================== COLLECTION ====================

/// Display-ready view of one owned token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionItem {
    pub token_id: String,
    pub name: String,
    pub image: String,
    pub level: String,
    pub rarity: String,
    pub boost: String,
    pub is_owned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub attributes: Vec<TraitEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_metadata: Option<NftMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericAttribute {
    pub name: String,
    pub value: u32,
}

/// Which source produced the final collection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionSource {
    OnChainOnly,
    ExternalAuthoritative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCollection {
    pub source: CollectionSource,
    pub balance: u64,
    pub token_ids: Vec<String>,
    pub items: Vec<CollectionItem>,
}

impl ResolvedCollection {
    pub fn empty() -> Self {
        Self {
            source: CollectionSource::OnChainOnly,
            balance: 0,
            token_ids: Vec::new(),
            items: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_keeps_unknown_fields_and_drops_malformed_ones() {
        let metadata = NftMetadata::from_json(json!({
            "name": "Hellraiser #1",
            "image": 42,
            "attributes": [
                {"trait_type": "Level", "value": 7},
                "not-an-object",
                {"trait_type": "Rarity", "value": "Epic"}
            ],
            "external_url": "https://example.com/1"
        }))
        .expect("object metadata");

        assert_eq!(metadata.name.as_deref(), Some("Hellraiser #1"));
        assert_eq!(metadata.image, None);
        assert_eq!(metadata.attributes.len(), 2);
        assert_eq!(metadata.extra.get("external_url"), Some(&json!("https://example.com/1")));
    }

    #[test]
    fn metadata_requires_an_object() {
        assert!(NftMetadata::from_json(json!(["a", "b"])).is_none());
        assert!(NftMetadata::from_json(json!("text")).is_none());
    }

    #[test]
    fn trait_value_percent_accepts_bounded_numeric_strings() {
        assert_eq!(TraitValue::Text("85".to_string()).as_percent(), Some(85));
        assert_eq!(TraitValue::Text("42pts".to_string()).as_percent(), Some(42));
        assert_eq!(TraitValue::Text("140".to_string()).as_percent(), None);
        assert_eq!(TraitValue::Text("fast".to_string()).as_percent(), None);
        assert_eq!(TraitValue::Number(73.0).as_percent(), Some(73));
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(TraitValue::Number(5.0).as_display(), "5");
        assert_eq!(TraitValue::Number(2.5).as_display(), "2.5");
    }
}
