use super::types::{ReportSummary, SwarmReport, TaskReport, TaskStatus};
use crate::session::{SwarmSession, TaskState};

/// Turns a finished session into the final report.
pub struct ResultAggregator;

impl ResultAggregator {
    /// One entry per task, in submission order.
    pub fn aggregate(session: &SwarmSession) -> SwarmReport {
        let results = session.results();
        let average_task_ms = match results.len() as u64 {
            0 => 0,
            n => results.iter().map(|r| r.duration_ms).sum::<u64>() / n,
        };
        let mut summary = ReportSummary {
            total_tasks: session.graph().len(),
            average_task_ms,
            peak_in_flight: session.peak_in_flight(),
            duration_ms: session.duration_ms(),
            ..ReportSummary::default()
        };

        let entries: Vec<TaskReport> = session
            .graph()
            .ids()
            .filter_map(|task_id| {
                let progress = session.progress(task_id)?;
                let status = match progress.state {
                    TaskState::Succeeded => TaskStatus::Success,
                    TaskState::PermanentlyFailed => TaskStatus::PermanentlyFailed,
                    // Unfinished tasks only remain when the loop was cut short.
                    _ => TaskStatus::Skipped,
                };
                match status {
                    TaskStatus::Success => summary.succeeded += 1,
                    TaskStatus::PermanentlyFailed => summary.permanently_failed += 1,
                    TaskStatus::Skipped => summary.skipped += 1,
                }
                summary.total_attempts += u64::from(progress.attempts);
                summary.total_retries += u64::from(progress.retries_used);

                let canonical = progress.canonical.as_ref();
                let conflict = canonical.and_then(|c| c.conflict.clone());
                if conflict.is_some() {
                    summary.conflicts += 1;
                }
                if let Some(c) = canonical {
                    *summary.resolutions.entry(c.strategy).or_default() += 1;
                }

                Some(TaskReport {
                    task_id: task_id.clone(),
                    status,
                    payload: canonical.map(|c| c.payload.clone()),
                    error: match status {
                        TaskStatus::Success => None,
                        _ => progress.error.clone(),
                    },
                    skip_reason: progress.skip_reason.clone(),
                    attempts: progress.attempts,
                    worker_id: canonical.map(|c| c.worker_id.clone()),
                    resolution: canonical.map(|c| c.strategy),
                    conflict,
                })
            })
            .collect();

        SwarmReport {
            run_id: session.run_id().to_string(),
            entries,
            summary,
            cancelled: session.is_cancelled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::{Outcome, Task, TaskResult};
    use crate::executor::TaskGraph;
    use crate::report::SkipReason;
    use crate::resolve::{CanonicalResult, ResolutionStrategy, TrustTable};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[test]
    fn entries_follow_submission_order_with_summary() {
        let graph = TaskGraph::build(vec![
            Task::new("b", "x"),
            Task::new("a", "x"),
            Task::new("c", "x").depends_on(["a"]),
        ])
        .unwrap();
        let mut session = SwarmSession::new("run-1", Arc::new(graph), TrustTable::new());

        session.begin_attempt("b");
        session.mark_succeeded(
            "b",
            CanonicalResult {
                task_id: "b".into(),
                payload: json!({"ok": true}),
                worker_id: "w1".into(),
                strategy: ResolutionStrategy::Single,
                conflict: None,
            },
        );
        session.begin_attempt("a");
        session.mark_failed("a", "boom".into());
        session.propagate_upstream_failures();

        let report = ResultAggregator::aggregate(&session);
        let ids: Vec<_> = report.entries.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);

        let b = report.entry("b").unwrap();
        assert_eq!(b.status, TaskStatus::Success);
        assert_eq!(b.payload, Some(json!({"ok": true})));
        assert_eq!(b.worker_id.as_deref(), Some("w1"));

        let a = report.entry("a").unwrap();
        assert_eq!(a.status, TaskStatus::PermanentlyFailed);
        assert_eq!(a.error.as_deref(), Some("boom"));

        let c = report.entry("c").unwrap();
        assert_eq!(c.status, TaskStatus::Skipped);
        assert_eq!(c.attempts, 0);
        assert_eq!(
            c.skip_reason,
            Some(SkipReason::UpstreamFailure {
                dependency: "a".into()
            })
        );

        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.permanently_failed, 1);
        assert_eq!(report.summary.skipped, 1);
        assert_eq!(report.summary.total_attempts, 2);
        assert!(!report.all_succeeded());
    }

    fn result(task_id: &str, worker_id: &str, duration_ms: u64, outcome: Outcome) -> TaskResult {
        TaskResult {
            task_id: task_id.into(),
            worker_id: worker_id.into(),
            attempt: 1,
            outcome,
            produced_at: chrono::Utc::now(),
            duration_ms,
        }
    }

    fn finish(session: &mut SwarmSession, task_id: &str, replicas: &[(&str, u64, Outcome)]) {
        let now = Instant::now();
        let attempt = session.begin_attempt(task_id).unwrap();
        let ids: Vec<u64> = replicas
            .iter()
            .map(|(worker, _, _)| session.record_dispatch(task_id, worker, attempt, now).id)
            .collect();
        for (id, (worker, ms, outcome)) in ids.into_iter().zip(replicas) {
            session.settle(id, Some(result(task_id, worker, *ms, outcome.clone())), now);
        }
    }

    #[test]
    fn summary_counts_resolutions_and_average_time() {
        let graph = TaskGraph::build(vec![
            Task::new("a", "x"),
            Task::new("b", "x"),
            Task::new("c", "x"),
        ])
        .unwrap();
        let mut session = SwarmSession::new("run", Arc::new(graph), TrustTable::new());

        finish(&mut session, "a", &[("w1", 100, Outcome::Success(json!(1)))]);
        finish(
            &mut session,
            "b",
            &[
                ("w1", 200, Outcome::Success(json!(2))),
                ("w2", 300, Outcome::Success(json!(2))),
            ],
        );
        finish(&mut session, "c", &[("w2", 400, Outcome::TimedOut)]);

        let canonical = |task_id: &str, strategy| CanonicalResult {
            task_id: task_id.into(),
            payload: json!(0),
            worker_id: "w1".into(),
            strategy,
            conflict: None,
        };
        session.mark_succeeded("a", canonical("a", ResolutionStrategy::Single));
        session.mark_succeeded("b", canonical("b", ResolutionStrategy::ExactMatch));
        session.mark_failed("c", "timed out".into());

        let summary = ResultAggregator::aggregate(&session).summary;
        assert_eq!(summary.average_task_ms, 250);
        assert_eq!(
            summary.resolutions,
            BTreeMap::from([
                (ResolutionStrategy::Single, 1),
                (ResolutionStrategy::ExactMatch, 1),
            ])
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["resolutions"]["exact_match"], 1);
    }

    #[test]
    fn empty_session_has_zero_average() {
        let graph = TaskGraph::build(vec![Task::new("a", "x")]).unwrap();
        let session = SwarmSession::new("run", Arc::new(graph), TrustTable::new());
        let summary = ResultAggregator::aggregate(&session).summary;
        assert_eq!(summary.average_task_ms, 0);
        assert!(summary.resolutions.is_empty());
    }

    #[test]
    fn report_serializes_statuses_in_snake_case() {
        let graph = TaskGraph::build(vec![Task::new("a", "x")]).unwrap();
        let mut session = SwarmSession::new("run", Arc::new(graph), TrustTable::new());
        session.cancel();
        let json = serde_json::to_value(ResultAggregator::aggregate(&session)).unwrap();
        assert_eq!(json["entries"][0]["status"], "skipped");
        assert_eq!(json["entries"][0]["skip_reason"]["kind"], "cancelled");
        assert_eq!(json["cancelled"], true);
    }
}
