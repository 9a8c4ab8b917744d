//! Account heartbeat data models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Account identifier as reported by the terminal.
///
/// Terminals send either the numeric login or a string. The as-sent JSON
/// shape is kept for responses, while [`AccountId::key`] gives the canonical
/// registry key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountId {
    Number(Number),
    Text(String),
}

impl AccountId {
    /// Accepts non-empty strings and non-zero numbers. Everything else
    /// (null, `""`, `0`, booleans, containers) counts as absent.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            Value::Number(n) if n.as_f64().is_some_and(|v| v != 0.0) => {
                Some(Self::Number(n.clone()))
            }
            _ => None,
        }
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One open position as reported by the terminal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OpenTrade {
    #[serde(default, deserialize_with = "lenient::text")]
    pub symbol: String,
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub side: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub volume: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub entry_price: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub profit: f64,
    /// Producer fields the relay does not know about, passed through as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// Status payload pushed by a terminal on every heartbeat.
///
/// Terminals are sloppy about JSON types, so every field is read leniently:
/// `null` or a value of the wrong shape falls back to the field's default
/// instead of rejecting the whole heartbeat.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountStatusUpdate {
    #[serde(default)]
    pub account_id: Option<Value>,
    #[serde(default)]
    pub account_number: Option<Value>,
    #[serde(default = "unknown", deserialize_with = "lenient::text_or_unknown")]
    pub account_name: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub balance: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub equity: f64,
    #[serde(default, deserialize_with = "lenient::trades")]
    pub open_trades: Vec<OpenTrade>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub daily_profit: f64,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub is_running: bool,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub magic_number: i64,
    #[serde(default = "unknown", deserialize_with = "lenient::text_or_unknown")]
    pub server: String,
}

/// Coercing field readers for terminal payloads.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::{unknown, OpenTrade};

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(as_f64(&value).filter(|v| v.is_finite()).unwrap_or(0.0))
    }

    /// Integers also arrive as `123.0` or `"123"`; fractions are truncated.
    pub fn integer<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(d)?;
        let parsed = match &value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        Ok(parsed
            .or_else(|| {
                as_f64(&value)
                    .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
                    .map(|v| v.trunc() as i64)
            })
            .unwrap_or(0))
    }

    /// `true`/`false`, any non-zero number, or `"true"`/`"1"`.
    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let value = Value::deserialize(d)?;
        Ok(match value {
            Value::Bool(b) => b,
            Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
            Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
            _ => false,
        })
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(as_text(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn text_or_unknown<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(as_text(Value::deserialize(d)?).unwrap_or_else(unknown))
    }

    /// Non-object entries are dropped; a non-array means no open trades.
    pub fn trades<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<OpenTrade>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

impl AccountStatusUpdate {
    /// `account_id` wins; `account_number` is consulted when the former is absent or falsy.
    pub fn identifier(&self) -> Option<AccountId> {
        self.account_id
            .as_ref()
            .and_then(AccountId::from_value)
            .or_else(|| self.account_number.as_ref().and_then(AccountId::from_value))
    }

    pub fn into_snapshot(self, account_id: AccountId, now: DateTime<Utc>) -> AccountSnapshot {
        AccountSnapshot {
            account_id,
            account_name: self.account_name,
            balance: self.balance,
            equity: self.equity,
            open_trades: self.open_trades,
            daily_profit: self.daily_profit,
            is_running: self.is_running,
            last_update: now,
            magic_number: self.magic_number,
            server: self.server,
        }
    }
}

/// Latest known state of one account. Replaced wholesale on every heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub account_name: String,
    pub balance: f64,
    pub equity: f64,
    pub open_trades: Vec<OpenTrade>,
    pub daily_profit: f64,
    pub is_running: bool,
    pub last_update: DateTime<Utc>,
    pub magic_number: i64,
    pub server: String,
}
