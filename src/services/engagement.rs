//! Engagement heuristic.

use super::context::whole_days_between;
use crate::models::{
    CommunicationFrequency, CommunicationLog, EngagementMetrics, ResponsePattern, RiskLevel,
    Student,
};
use chrono::{DateTime, Utc};

/// Logs no older than this many whole days count as recent contact.
pub const RECENT_CONTACT_DAYS: i64 = 14;

/// Classifies a student's engagement from activity and contact history.
///
/// Advisory only: the result is not part of the summary dossier.
pub struct EngagementScorer;

impl EngagementScorer {
    /// Scores as of now.
    #[must_use]
    pub fn score(student: &Student, logs: &[CommunicationLog]) -> EngagementMetrics {
        Self::score_at(student, logs, Utc::now())
    }

    /// Scores as of `now`.
    #[must_use]
    pub fn score_at(
        student: &Student,
        logs: &[CommunicationLog],
        now: DateTime<Utc>,
    ) -> EngagementMetrics {
        let last_active_days = student
            .last_active
            .map(|at| whole_days_between(at, now));

        EngagementMetrics {
            last_active_days,
            communication_frequency: frequency(logs.len()),
            response_pattern: response_pattern(logs, now),
            risk_level: last_active_days.map_or(RiskLevel::Medium, risk_level),
        }
    }
}

const fn risk_level(days: i64) -> RiskLevel {
    if days <= 7 {
        RiskLevel::Low
    } else if days <= 30 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

const fn frequency(count: usize) -> CommunicationFrequency {
    match count {
        0 => CommunicationFrequency::Unknown,
        1 => CommunicationFrequency::Low,
        2..=4 => CommunicationFrequency::Medium,
        _ => CommunicationFrequency::High,
    }
}

fn response_pattern(logs: &[CommunicationLog], now: DateTime<Utc>) -> ResponsePattern {
    if logs.is_empty() {
        return ResponsePattern::NoData;
    }
    let recent = logs
        .iter()
        .filter_map(|log| log.timestamp)
        .filter(|at| whole_days_between(*at, now) <= RECENT_CONTACT_DAYS)
        .count();
    match recent {
        0 => ResponsePattern::LimitedRecentEngagement,
        1 => ResponsePattern::ModeratelyEngaged,
        _ => ResponsePattern::ActivelyEngaged,
    }
}
