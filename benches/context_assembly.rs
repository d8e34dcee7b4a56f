//! Benchmarks for dossier assembly and engagement scoring.
//!
//! Assembly sorts the full history and scans it for the type breakdown, so
//! cost grows with history length even though only ten entries are listed.

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use enrolla::models::{ApplicationStatus, CommunicationLog, Student, StudentId, tags};
use enrolla::services::{ContextAssembler, EngagementScorer};
use std::hint::black_box;

fn fixture(history: usize) -> (Student, Vec<CommunicationLog>) {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let student = Student {
        id: StudentId::generate(),
        name: "Bench Student".to_string(),
        email: "bench@uni.edu".to_string(),
        phone: Some("+1 555 0100".to_string()),
        country: Some("Canada".to_string()),
        application_status: ApplicationStatus::Applying,
        last_active: Some(now - Duration::days(4)),
        created_at: now,
        updated_at: now,
        tags: [tags::HIGH_INTENT, tags::NEEDS_ESSAY_HELP].into_iter().collect(),
        internal_notes: Some("Asked about scholarships".to_string()),
    };
    let kinds = ["Email", "SMS", "Call", "Meeting"];
    let logs = (0..history)
        .map(|i| {
            let offset = i64::try_from(i).unwrap();
            CommunicationLog::new(
                student.id,
                kinds[i % kinds.len()],
                Some(format!("Contact number {i}")),
                now - Duration::hours(offset * 7),
            )
        })
        .collect();
    (student, logs)
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("context_assemble");
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    for history in [0usize, 10, 100, 1_000] {
        let (student, logs) = fixture(history);
        group.bench_with_input(BenchmarkId::from_parameter(history), &logs, |b, logs| {
            b.iter(|| ContextAssembler::assemble_at(black_box(&student), black_box(logs), now));
        });
    }
    group.finish();
}

fn bench_engagement(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let (student, logs) = fixture(1_000);
    c.bench_function("engagement_score_1000", |b| {
        b.iter(|| EngagementScorer::score_at(black_box(&student), black_box(&logs), now));
    });
}

criterion_group!(benches, bench_assemble, bench_engagement);
criterion_main!(benches);
