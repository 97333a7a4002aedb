use serde::{Deserialize, Deserializer};

/// One page of `/events/collection/{slug}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventsPage {
    /// Events that fail to decode are logged and left out.
    #[serde(default, deserialize_with = "lenient_events")]
    pub asset_events: Vec<AssetEvent>,
    pub next: Option<String>,
}

/// A marketplace event. Only the fields needed to describe a sale are kept;
/// everything is optional because OpenSea omits fields per event type.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetEvent {
    pub event_type: Option<String>,
    /// Epoch seconds on v2, ISO text on some older payloads.
    pub event_timestamp: Option<serde_json::Value>,
    pub transaction: Option<String>,
    #[serde(default, deserialize_with = "address_or_account")]
    pub buyer: Option<String>,
    #[serde(default, deserialize_with = "address_or_account")]
    pub seller: Option<String>,
    pub nft: Option<Nft>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nft {
    pub identifier: Option<String>,
    pub collection: Option<String>,
    pub contract: Option<String>,
    pub name: Option<String>,
    pub opensea_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    /// Base-unit amount as a decimal string (wei for ETH).
    #[serde(deserialize_with = "quantity_string")]
    pub quantity: String,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    pub symbol: Option<String>,
}

fn default_decimals() -> u32 {
    18
}

/// `/collections/{slug}/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionStats {
    #[serde(default)]
    pub total: StatsTotal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsTotal {
    pub volume: Option<f64>,
    pub sales: Option<f64>,
    pub num_owners: Option<u64>,
    pub floor_price: Option<f64>,
    pub floor_price_symbol: Option<String>,
}

fn lenient_events<'de, D>(deserializer: D) -> Result<Vec<AssetEvent>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(index, error = %e, "Dropping undecodable asset event");
                None
            }
        })
        .collect())
}

/// Buyer/seller arrive either as a bare address or as `{"address": ...}`.
fn address_or_account<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Party {
        Address(String),
        Account { address: Option<String> },
    }

    Ok(match Option::<Party>::deserialize(deserializer)? {
        Some(Party::Address(a)) => Some(a),
        Some(Party::Account { address }) => address,
        None => None,
    })
}

/// Quantity is usually a string but has been seen as a JSON number.
fn quantity_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unexpected payment quantity: {other}"
        ))),
    }
}
