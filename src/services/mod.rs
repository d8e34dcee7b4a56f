//! Business logic services.
//!
//! Services orchestrate the database and the generative backend. Pure
//! pieces (context assembly, engagement scoring) take their inputs
//! explicitly so they can be tested without storage.

mod context;
mod engagement;
mod stats;
mod students;
mod summary;

pub use context::{ContextAssembler, MAX_LISTED_LOGS};
pub use engagement::{EngagementScorer, RECENT_CONTACT_DAYS};
pub use stats::{ACTIVE_WINDOW_DAYS, StatisticsEngine, window_start};
pub use students::{
    DEFAULT_COMMUNICATIONS_LIMIT, MAX_COMMUNICATIONS_LIMIT, SUMMARY_LOG_LIMIT, StudentService,
};
pub use summary::{
    FALLBACK_SUMMARY, SUMMARY_PARAMS, SYSTEM_PROMPT, SummaryGenerator, SummaryOutcome,
    build_user_prompt,
};

use crate::Result;
use crate::config::EnrollaConfig;
use crate::storage::Database;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
///
/// Owns the database handle and the summary generator; cloned cheaply into
/// each request.
#[derive(Debug, Clone)]
pub struct AppContext {
    db: Arc<Database>,
    summaries: SummaryGenerator,
}

impl AppContext {
    /// Creates a context from its parts.
    #[must_use]
    pub const fn new(db: Arc<Database>, summaries: SummaryGenerator) -> Self {
        Self { db, summaries }
    }

    /// Opens the configured database and builds the configured provider.
    ///
    /// Must be called outside an async runtime: the LLM HTTP client is blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn from_config(config: &EnrollaConfig) -> Result<Self> {
        let db = Database::open(
            &config.database.path,
            Duration::from_millis(config.database.timeout_ms),
        )?;
        let summaries = SummaryGenerator::from_provider(crate::llm::build_provider(&config.llm));
        Ok(Self::new(Arc::new(db), summaries))
    }

    /// The database handle.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Student operations.
    #[must_use]
    pub fn students(&self) -> StudentService<'_> {
        StudentService::new(&self.db)
    }

    /// The summary generator.
    #[must_use]
    pub const fn summaries(&self) -> &SummaryGenerator {
        &self.summaries
    }
}
