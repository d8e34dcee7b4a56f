//! Student dossier assembly.
//!
//! Renders a student and their communication history into the plain-text
//! dossier embedded in the summary prompt. Output depends only on the inputs
//! and the supplied `now`.

use crate::models::{CommunicationLog, Student};
use chrono::{DateTime, Utc};

/// Number of log entries rendered individually.
pub const MAX_LISTED_LOGS: usize = 10;

const NOT_PROVIDED: &str = "Not provided";

/// Builds the student dossier.
pub struct ContextAssembler;

impl ContextAssembler {
    /// Assembles the dossier as of now.
    #[must_use]
    pub fn assemble(student: &Student, logs: &[CommunicationLog]) -> String {
        Self::assemble_at(student, logs, Utc::now())
    }

    /// Assembles the dossier as of `now`.
    ///
    /// `logs` may be in any order; entries are listed newest first.
    #[must_use]
    pub fn assemble_at(student: &Student, logs: &[CommunicationLog], now: DateTime<Utc>) -> String {
        let mut lines: Vec<String> = Vec::new();
        push_basic_information(&mut lines, student);
        push_tags(&mut lines, student);
        push_notes(&mut lines, student);
        push_history(&mut lines, logs, now);
        lines.join("\n")
    }
}

fn push_basic_information(lines: &mut Vec<String>, student: &Student) {
    lines.push("=== BASIC INFORMATION ===".to_string());
    lines.push(format!("Name: {}", student.name));
    lines.push(format!("Email: {}", student.email));
    lines.push(format!(
        "Phone: {}",
        student.phone.as_deref().unwrap_or(NOT_PROVIDED)
    ));
    lines.push(format!(
        "Country: {}",
        student.country.as_deref().unwrap_or(NOT_PROVIDED)
    ));
    lines.push(format!("Application Status: {}", student.application_status));
    lines.push(match student.last_active {
        Some(at) => format!("Last Active: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => "Last Active: Never recorded".to_string(),
    });
    lines.push(format!(
        "Account Created: {}",
        student.created_at.format("%Y-%m-%d")
    ));
    lines.push(format!(
        "Profile Last Updated: {}",
        student.updated_at.format("%Y-%m-%d")
    ));
}

fn push_tags(lines: &mut Vec<String>, student: &Student) {
    if student.tags.is_empty() {
        lines.push("Tags: None assigned".to_string());
    } else {
        lines.push(format!(
            "Tags: {}",
            student.tags.iter().collect::<Vec<_>>().join(", ")
        ));
        lines.push(String::new());

        let mut canonical = student.tags.canonical().peekable();
        if canonical.peek().is_some() {
            lines.push("Tag Context:".to_string());
            lines.extend(canonical.map(|tag| tag.explanation().to_string()));
        }
    }
    lines.push(String::new());
}

fn push_notes(lines: &mut Vec<String>, student: &Student) {
    lines.push("=== INTERNAL STAFF NOTES ===".to_string());
    match student.internal_notes.as_deref() {
        Some(notes) if !notes.trim().is_empty() => lines.push(notes.to_string()),
        _ => lines.push("No internal notes recorded".to_string()),
    }
    lines.push(String::new());
}

fn push_history(lines: &mut Vec<String>, logs: &[CommunicationLog], now: DateTime<Utc>) {
    lines.push("=== RECENT COMMUNICATION HISTORY ===".to_string());
    if logs.is_empty() {
        lines.push("No communication logs available".to_string());
        lines.push(
            "⚠️  This student has no recorded interactions with admissions staff".to_string(),
        );
        return;
    }

    lines.push(format!("Total communications logged: {}", logs.len()));
    lines.push(String::new());

    let newest_first = sort_newest_first(logs);
    let listed = &newest_first[..newest_first.len().min(MAX_LISTED_LOGS)];
    for (i, log) in listed.iter().enumerate() {
        let when = log.timestamp.map_or_else(
            || "Unknown time".to_string(),
            |at| at.format("%Y-%m-%d %H:%M UTC").to_string(),
        );
        let kind = non_blank(&log.kind).unwrap_or("Unknown type");
        let content = log
            .content
            .as_deref()
            .and_then(non_blank)
            .unwrap_or("No description provided");

        lines.push(format!("{}. [{when}] {kind}", i + 1));
        lines.push(format!("   Content: {content}"));
        if i + 1 < listed.len() {
            lines.push(String::new());
        }
    }

    lines.push(String::new());
    lines.push("Communication Pattern Analysis:".to_string());
    for (kind, count) in type_breakdown(logs) {
        lines.push(format!("- {kind}: {count} interactions"));
    }

    if let Some(latest) = newest_first.first().and_then(|log| log.timestamp) {
        lines.push(format!(
            "- Last communication: {} days ago",
            whole_days_between(latest, now)
        ));
    }
}

/// Stable sort by timestamp descending; untimestamped entries go last.
pub(crate) fn sort_newest_first(logs: &[CommunicationLog]) -> Vec<&CommunicationLog> {
    let mut sorted: Vec<&CommunicationLog> = logs.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted
}

/// Counts entries per type in first-seen order. Blank types count as `Unknown`.
fn type_breakdown(logs: &[CommunicationLog]) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for log in logs {
        let kind = non_blank(&log.kind).unwrap_or("Unknown");
        match counts.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => counts.push((kind, 1)),
        }
    }
    counts
}

/// Floored whole days from `earlier` to `later` (negative if `earlier` is in the future).
pub(crate) fn whole_days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later - earlier).num_seconds().div_euclid(86_400)
}

fn non_blank(s: &str) -> Option<&str> {
    if s.trim().is_empty() { None } else { Some(s) }
}
