//! Stock entity and thesis-analysis types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// How confident the thesis author is in the idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvictionLevel {
    Low,
    Medium,
    High,
}

impl ConvictionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvictionLevel::Low => "low",
            ConvictionLevel::Medium => "medium",
            ConvictionLevel::High => "high",
        }
    }
}

impl fmt::Display for ConvictionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConvictionLevel {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ConvictionLevel::Low),
            "medium" => Ok(ConvictionLevel::Medium),
            "high" => Ok(ConvictionLevel::High),
            other => Err(DeskError::InvalidInput(format!(
                "unknown conviction level: {}",
                other
            ))),
        }
    }
}

/// Expected time frame for a thesis to play out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeHorizon {
    Short,
    Medium,
    Long,
}

impl TimeHorizon {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeHorizon::Short => "short",
            TimeHorizon::Medium => "medium",
            TimeHorizon::Long => "long",
        }
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeHorizon {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "short" => Ok(TimeHorizon::Short),
            "medium" => Ok(TimeHorizon::Medium),
            "long" => Ok(TimeHorizon::Long),
            other => Err(DeskError::InvalidInput(format!(
                "unknown time horizon: {}",
                other
            ))),
        }
    }
}

/// Structured fields extracted from a free-text investment thesis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThesisAnalysis {
    /// Near-term event expected to move the stock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalyst: Option<String>,

    /// Durable competitive advantage claimed by the thesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub competitive_moat: Option<String>,

    /// Risks that would invalidate the thesis
    #[serde(default)]
    pub key_risks: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conviction_level: Option<ConvictionLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_horizon: Option<TimeHorizon>,

    /// When the extraction ran (stamped by the enrichment layer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,

    /// Model that produced the extraction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_model: Option<String>,
}

/// Free-form metadata attached to a stock.
///
/// `investment_thesis` feeds the canonical embedding text; `date_added` and
/// `last_reviewed` are stamped by the write path. Anything else callers put
/// in the map survives round trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_thesis: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<NaiveDate>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl StockMetadata {
    /// Stamp the date the stock entered the system.
    pub fn stamp_added(&mut self, today: NaiveDate) {
        self.date_added = Some(today);
    }

    /// Stamp the date of the most recent edit.
    pub fn stamp_reviewed(&mut self, today: NaiveDate) {
        self.last_reviewed = Some(today);
    }

    /// The thesis text, if present and non-blank.
    pub fn thesis(&self) -> Option<&str> {
        self.investment_thesis
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    /// Merge `other` into this map. Keys present in `other` win; keys absent
    /// from `other` keep their current value.
    pub fn merge(&mut self, other: StockMetadata) {
        if other.investment_thesis.is_some() {
            self.investment_thesis = other.investment_thesis;
        }
        if other.date_added.is_some() {
            self.date_added = other.date_added;
        }
        if other.last_reviewed.is_some() {
            self.last_reviewed = other.last_reviewed;
        }
        self.extra.extend(other.extra);
    }
}

/// A stock under research.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub id: i64,
    pub name: String,
    /// Uppercase-normalized, unique across the store
    pub ticker: String,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub price: Option<f64>,
    pub market_cap: Option<i64>,
    #[serde(default)]
    pub metadata: StockMetadata,
    pub thesis_analysis: Option<ThesisAnalysis>,
    /// Derived vector; written only by the enrichment layer
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// Canonical text fed to the embedding provider.
    ///
    /// Fixed field order: name, ticker, sector, investment thesis,
    /// description, notes. Blank fields are skipped outright so the result
    /// never contains doubled or leading spaces.
    pub fn embedding_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();

        push_text(&mut parts, Some(&self.name));
        push_text(&mut parts, Some(&self.ticker));
        push_text(&mut parts, self.sector.as_deref());
        push_text(&mut parts, self.metadata.investment_thesis.as_deref());
        push_text(&mut parts, self.description.as_deref());
        push_text(&mut parts, self.notes.as_deref());

        parts.join(" ")
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Skip blank fields rather than joining empty strings.
pub(crate) fn push_text<'a>(parts: &mut Vec<&'a str>, field: Option<&'a str>) {
    if let Some(text) = field {
        if !text.trim().is_empty() {
            parts.push(text);
        }
    }
}

/// Fields accepted when creating a stock.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStock {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<i64>,
    #[serde(default)]
    pub metadata: StockMetadata,
}

/// Partial update for a stock; `None` leaves a field untouched.
///
/// Supplied `metadata` is merged key-by-key into the existing map rather
/// than replacing it wholesale.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StockUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<i64>,
    #[serde(default)]
    pub metadata: Option<StockMetadata>,
}

/// Update applied to many stocks at once.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkStockUpdate {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}
