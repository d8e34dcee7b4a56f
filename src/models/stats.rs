//! Cohort statistics and engagement heuristics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cohort counts over the active student population.
///
/// Buckets are independent: one student can count in several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    /// Students active in the trailing window.
    pub active_students: u64,
    /// Active students with status `Applying`.
    pub applying_stage: u64,
    /// Active students tagged "Needs essay help".
    pub needs_essay_help: u64,
    /// Active students tagged "High intent".
    pub high_intent: u64,
    /// Active students tagged "Students not contacted in 7 days".
    pub not_contacted_recently: u64,
}

/// How often a student has been contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommunicationFrequency {
    /// One log.
    Low,
    /// Two to four logs.
    Medium,
    /// Five or more logs.
    High,
    /// No logs.
    Unknown,
}

/// How recently a student has been in contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponsePattern {
    /// Two or more contacts in the last 14 days.
    #[serde(rename = "Actively engaged")]
    ActivelyEngaged,
    /// Exactly one contact in the last 14 days.
    #[serde(rename = "Moderately engaged")]
    ModeratelyEngaged,
    /// Logs exist but none in the last 14 days.
    #[serde(rename = "Limited recent engagement")]
    LimitedRecentEngagement,
    /// No logs at all.
    #[serde(rename = "No data")]
    NoData,
}

/// Disengagement risk derived from activity recency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Active within a week.
    Low,
    /// Active within a month, or activity unknown.
    #[default]
    Medium,
    /// Inactive for over a month.
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(s)
    }
}

/// Advisory engagement classification for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Whole days since last activity, if known.
    pub last_active_days: Option<i64>,
    /// Contact volume bucket.
    pub communication_frequency: CommunicationFrequency,
    /// Contact recency bucket.
    pub response_pattern: ResponsePattern,
    /// Risk bucket.
    pub risk_level: RiskLevel,
}
