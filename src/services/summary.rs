//! AI engagement summaries.
//!
//! The generator never fails: any backend problem (transport error,
//! timeout, open circuit, empty reply, or no backend configured) yields
//! [`FALLBACK_SUMMARY`].

use super::context::ContextAssembler;
use super::engagement::EngagementScorer;
use crate::llm::{GenerationParams, LlmProvider};
use crate::models::{CommunicationLog, Student};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Text returned whenever the backend cannot produce a summary.
pub const FALLBACK_SUMMARY: &str = "## AI Summary Unavailable\n\nThe AI summary service is temporarily unavailable. Please try again later.";

/// Sampling parameters used for every summary.
pub const SUMMARY_PARAMS: GenerationParams = GenerationParams {
    temperature: 0.3,
    top_p: 0.9,
    max_tokens: 1200,
};

/// System instruction framing the model as an admissions expert.
pub const SYSTEM_PROMPT: &str = "You are an expert university admissions consultant with 15+ years of experience in student assessment and application management.

Your expertise includes:
- Identifying at-risk students who need additional support
- Recognizing high-potential applicants
- Understanding communication patterns and engagement levels
- Providing actionable recommendations for admissions staff

Always provide clear, actionable insights that help staff make informed decisions about student support and follow-up actions.";

/// Result of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// The backend produced text.
    Generated(String),
    /// The backend failed; the reason is for logs only.
    BackendFailed(String),
}

impl SummaryOutcome {
    /// Returns the generated text or [`FALLBACK_SUMMARY`].
    #[must_use]
    pub fn into_text(self) -> String {
        match self {
            Self::Generated(text) => text,
            Self::BackendFailed(_) => FALLBACK_SUMMARY.to_string(),
        }
    }

    /// True when the fallback text will be served.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::BackendFailed(_))
    }
}

/// Builds the prompt and calls the generative backend.
#[derive(Clone)]
pub struct SummaryGenerator {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl SummaryGenerator {
    /// Creates a generator backed by `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Creates a generator that always returns the fallback text.
    #[must_use]
    pub const fn fallback_only() -> Self {
        Self { provider: None }
    }

    /// Creates a generator from an optional provider.
    #[must_use]
    pub fn from_provider(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }

    /// True if a backend is configured.
    #[must_use]
    pub fn has_backend(&self) -> bool {
        self.provider.is_some()
    }

    /// Generates a summary, falling back on any backend failure.
    #[must_use]
    pub fn generate(&self, student: &Student, logs: &[CommunicationLog]) -> String {
        self.try_generate_at(student, logs, Utc::now()).into_text()
    }

    /// Attempts generation as of now.
    #[must_use]
    pub fn try_generate(&self, student: &Student, logs: &[CommunicationLog]) -> SummaryOutcome {
        self.try_generate_at(student, logs, Utc::now())
    }

    /// Attempts generation as of `now`.
    #[instrument(skip(self, student, logs), fields(student.id = %student.id, logs = logs.len()))]
    pub fn try_generate_at(
        &self,
        student: &Student,
        logs: &[CommunicationLog],
        now: DateTime<Utc>,
    ) -> SummaryOutcome {
        let engagement = EngagementScorer::score_at(student, logs, now);
        tracing::debug!(?engagement, "Engagement heuristics");

        let Some(provider) = &self.provider else {
            return fallback("no generative backend configured");
        };

        let context = ContextAssembler::assemble_at(student, logs, now);
        let prompt = build_user_prompt(&student.name, &context);
        let start = Instant::now();
        let outcome = match provider.complete_with_system(SYSTEM_PROMPT, &prompt, &SUMMARY_PARAMS) {
            Ok(text) if !text.trim().is_empty() => SummaryOutcome::Generated(text.trim().to_string()),
            Ok(_) => fallback("backend returned an empty summary"),
            Err(e) => fallback(&e.to_string()),
        };
        if !outcome.is_fallback() {
            tracing::info!(
                provider = provider.name(),
                elapsed_ms = start.elapsed().as_millis(),
                "Generated AI summary"
            );
        }
        outcome
    }
}

impl std::fmt::Debug for SummaryGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SummaryGenerator")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

fn fallback(reason: &str) -> SummaryOutcome {
    tracing::warn!(reason, "Serving fallback AI summary");
    metrics::counter!("summary_fallbacks_total").increment(1);
    SummaryOutcome::BackendFailed(reason.to_string())
}

/// Builds the user prompt around the student dossier.
#[must_use]
pub fn build_user_prompt(name: &str, context: &str) -> String {
    format!(
        "You are an AI assistant helping university admissions staff understand students better.
Analyze the following student profile and communication history to provide insights.

Student Profile:
{context}

Please provide a comprehensive summary that includes:

## Engagement Analysis for {name}
Level of interaction, responsiveness, and communication patterns

## Application Status
Progress assessment and potential areas of concern

## Recommendations
Specific actions or follow-ups suggested for admissions staff

## Risk Assessment
Any flags or areas requiring immediate attention

Keep the summary professional, concise, and actionable for admissions staff.
Focus on insights that would help staff better support this student's application journey.
Use clear headings and bullet points where appropriate."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApplicationStatus, StudentId, TagSet};
    use crate::{Error, Result};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<(String, String, GenerationParams)>>,
        reply: Option<String>,
    }

    impl LlmProvider for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn complete(&self, _: &str, _: &GenerationParams) -> Result<String> {
            unreachable!("summary uses complete_with_system")
        }

        fn complete_with_system(
            &self,
            system: &str,
            user: &str,
            params: &GenerationParams,
        ) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), user.to_string(), *params));
            self.reply.clone().ok_or_else(|| Error::OperationFailed {
                operation: "recording_request".to_string(),
                cause: "operation timed out".to_string(),
            })
        }
    }

    fn student() -> Student {
        let now = Utc::now();
        Student {
            id: StudentId::generate(),
            name: "Priya Shah".to_string(),
            email: "priya@uni.edu".to_string(),
            phone: None,
            country: Some("India".to_string()),
            application_status: ApplicationStatus::Shortlisting,
            last_active: Some(now),
            created_at: now,
            updated_at: now,
            tags: TagSet::new(),
            internal_notes: None,
        }
    }

    #[test]
    fn test_generated_text_is_trimmed() {
        let provider = Arc::new(Recording {
            reply: Some("\n## Engagement Analysis for Priya Shah\n...  ".to_string()),
            ..Recording::default()
        });
        let generator = SummaryGenerator::new(provider.clone());
        let outcome = generator.try_generate(&student(), &[]);
        assert_eq!(
            outcome,
            SummaryOutcome::Generated("## Engagement Analysis for Priya Shah\n...".to_string())
        );

        let seen = provider.seen.lock().unwrap();
        let (system, user, params) = &seen[0];
        assert_eq!(system, SYSTEM_PROMPT);
        assert!(user.contains("## Engagement Analysis for Priya Shah"));
        assert!(user.contains("Name: Priya Shah"));
        assert!(user.contains("No communication logs available"));
        assert_eq!(*params, SUMMARY_PARAMS);
    }

    #[test]
    fn test_backend_failure_yields_fallback() {
        let generator = SummaryGenerator::new(Arc::new(Recording::default()));
        let outcome = generator.try_generate(&student(), &[]);
        assert!(outcome.is_fallback());
        assert_eq!(outcome.into_text(), FALLBACK_SUMMARY);
    }

    #[test]
    fn test_empty_reply_yields_fallback() {
        let generator = SummaryGenerator::new(Arc::new(Recording {
            reply: Some("   ".to_string()),
            ..Recording::default()
        }));
        assert_eq!(generator.generate(&student(), &[]), FALLBACK_SUMMARY);
    }

    #[test]
    fn test_fallback_only_mode() {
        let generator = SummaryGenerator::fallback_only();
        assert!(!generator.has_backend());
        assert_eq!(generator.generate(&student(), &[]), FALLBACK_SUMMARY);
    }

    #[test]
    fn test_fallback_text_shape() {
        assert!(FALLBACK_SUMMARY.starts_with("## AI Summary Unavailable\n\n"));
    }
}
