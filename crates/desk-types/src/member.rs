//! Member entity and stock-link types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::stock::push_text;

/// A member of the research network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub bio: Option<String>,
    /// e.g. "angel", "vc", "operator"
    pub investor_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub investment_focus: Vec<String>,
    pub location: Option<String>,
    pub last_contact_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub notes: Option<String>,
    /// Derived vector; written only by the enrichment layer
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Member {
    /// Canonical text fed to the embedding provider.
    ///
    /// Fixed field order: name, job title, company, bio, tags,
    /// investment focus, notes. List fields join with ", "; blank fields
    /// are skipped outright.
    pub fn embedding_text(&self) -> String {
        let tags = self.tags.join(", ");
        let focus = self.investment_focus.join(", ");

        let mut parts: Vec<&str> = Vec::new();
        push_text(&mut parts, Some(&self.name));
        push_text(&mut parts, self.job_title.as_deref());
        push_text(&mut parts, self.company.as_deref());
        push_text(&mut parts, self.bio.as_deref());
        push_text(&mut parts, Some(&tags));
        push_text(&mut parts, Some(&focus));
        push_text(&mut parts, self.notes.as_deref());

        parts.join(" ")
    }

    pub fn has_embedding(&self) -> bool {
        self.embedding.is_some()
    }
}

/// Fields accepted when creating a member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewMember {
    pub name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub investor_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub investment_focus: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub last_contact_date: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update for a member; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub investor_type: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub investment_focus: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub last_contact_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One entry in a member's originated/commented sync list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockLink {
    pub stock_id: i64,
    #[serde(default)]
    pub note: Option<String>,
}

/// A linked stock as surfaced in member projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedStock {
    pub id: i64,
    pub name: String,
    pub ticker: String,
    pub note: Option<String>,
}
