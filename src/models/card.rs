//! Timeline entries and the context the merge engine works against.

use serde::{Deserialize, Serialize};

use super::Observation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSites {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
}

impl AppSites {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }
}

/// A brief detour inside a card's span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distraction {
    #[serde(alias = "start_time")]
    pub start_time: String,
    #[serde(alias = "end_time")]
    pub end_time: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
}

/// One timeline entry. Times are minute-resolution strings (see `pipeline::clock`).
///
/// Once placed in a timeline a card is either left alone or replaced
/// wholesale by a merge; fields are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityCardData {
    pub start_time: String,
    pub end_time: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub detailed_summary: String,
    #[serde(default)]
    pub distractions: Vec<Distraction>,
    #[serde(default)]
    pub app_sites: AppSites,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityGenerationContext {
    /// Ordered oldest to newest.
    pub existing_cards: Vec<ActivityCardData>,
    pub batch_observations: Vec<Observation>,
    pub categories: Vec<String>,
}
