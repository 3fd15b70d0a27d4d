//! Per-user dashboard settings.
//!
//! Favorite symbols and chart options are persisted as JSON text. Reads never
//! fail on bad JSON: [`parse_or_default`] substitutes the built-in defaults.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

pub const DEFAULT_APP: &str = "Stock Analysis";
pub const DEFAULT_FAVORITES: [&str; 3] = ["AAPL", "MSFT", "GOOGL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartPreferences {
    pub show_moving_averages: bool,
    pub default_ma_periods: Vec<u32>,
    pub default_chart_type: String,
    pub show_volume: bool,
    /// Keys written by other clients are kept as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ChartPreferences {
    fn default() -> Self {
        ChartPreferences {
            show_moving_averages: true,
            default_ma_periods: vec![20, 50],
            default_chart_type: "candlestick".to_string(),
            show_volume: true,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    pub user_id: i64,
    pub theme: Theme,
    pub default_app: String,
    pub favorite_symbols: Vec<String>,
    pub chart: ChartPreferences,
}

/// The row as stored: every column may be missing or hold junk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredPreferences {
    pub theme: Option<String>,
    pub default_app: Option<String>,
    pub favorite_symbols: Option<String>,
    pub chart_preferences: Option<String>,
}

/// Fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesUpdate {
    pub theme: Option<Theme>,
    pub default_app: Option<String>,
    pub favorite_symbols: Option<Vec<String>>,
    pub chart_preferences: Option<ChartPreferences>,
}

pub fn default_favorites() -> Vec<String> {
    DEFAULT_FAVORITES.iter().map(|s| s.to_string()).collect()
}

/// Decode `raw` as JSON, or fall back to `default()` when it is absent, blank
/// or malformed.
pub fn parse_or_default<T, F>(raw: Option<&str>, default: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return default();
    };
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "unreadable stored preference, using default");
            default()
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<String, LedgerError> {
    serde_json::to_string(value).map_err(|e| LedgerError::Serialization {
        reason: e.to_string(),
    })
}

impl Preferences {
    pub fn defaults(user_id: i64) -> Self {
        Preferences {
            user_id,
            theme: Theme::Light,
            default_app: DEFAULT_APP.to_string(),
            favorite_symbols: default_favorites(),
            chart: ChartPreferences::default(),
        }
    }

    pub fn from_stored(user_id: i64, stored: &StoredPreferences) -> Self {
        let theme = stored
            .theme
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or_default();
        let default_app = stored
            .default_app
            .clone()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_APP.to_string());

        Preferences {
            user_id,
            theme,
            default_app,
            favorite_symbols: parse_or_default(
                stored.favorite_symbols.as_deref(),
                default_favorites,
            ),
            chart: parse_or_default(stored.chart_preferences.as_deref(), ChartPreferences::default),
        }
    }

    pub fn to_stored(&self) -> Result<StoredPreferences, LedgerError> {
        Ok(StoredPreferences {
            theme: Some(self.theme.to_string()),
            default_app: Some(self.default_app.clone()),
            favorite_symbols: Some(encode(&self.favorite_symbols)?),
            chart_preferences: Some(encode(&self.chart)?),
        })
    }
}

impl PreferencesUpdate {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.default_app.is_none()
            && self.favorite_symbols.is_none()
            && self.chart_preferences.is_none()
    }

    /// Column values to write, in stored form.
    pub fn to_stored(&self) -> Result<StoredPreferences, LedgerError> {
        Ok(StoredPreferences {
            theme: self.theme.map(|t| t.to_string()),
            default_app: self.default_app.clone(),
            favorite_symbols: self.favorite_symbols.as_ref().map(encode).transpose()?,
            chart_preferences: self.chart_preferences.as_ref().map(encode).transpose()?,
        })
    }
}
