use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::trust::TrustTable;
use crate::executor::traits::PayloadClassifier;
use crate::executor::types::{Payload, TaskId, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    Single,
    ExactMatch,
    WeightedVote,
    PriorityFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub worker_id: String,
    pub payload: Payload,
    pub trust_weight: f64,
}

/// Record of redundant results that disagreed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub task_id: TaskId,
    pub strategy: ResolutionStrategy,
    pub accepted: Candidate,
    pub discarded: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalResult {
    pub task_id: TaskId,
    pub payload: Payload,
    pub worker_id: String,
    pub strategy: ResolutionStrategy,
    pub conflict: Option<Conflict>,
}

/// Picks one canonical payload out of the successful results of an attempt.
///
/// Tiers, first match wins:
/// 1. every payload is identical
/// 2. classifier vote: the largest class by count, ties broken by summed
///    trust weight; a remaining tie falls through
/// 3. the highest trust weight, earliest registration on ties
///
/// The outcome depends only on the inputs, never on their arrival order.
#[derive(Clone, Default)]
pub struct ConflictResolver {
    classifier: Option<Arc<dyn PayloadClassifier>>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: Arc<dyn PayloadClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
        }
    }

    pub fn classifier_name(&self) -> Option<&str> {
        self.classifier.as_deref().map(|c| c.name())
    }

    /// Returns `None` when no result succeeded.
    pub fn resolve(
        &self,
        task_id: &str,
        results: &[TaskResult],
        trust: &TrustTable,
    ) -> Option<CanonicalResult> {
        let mut candidates: Vec<(u64, Candidate)> = results
            .iter()
            .filter_map(|r| {
                r.outcome.payload().map(|payload| {
                    (
                        trust.seq(&r.worker_id),
                        Candidate {
                            worker_id: r.worker_id.clone(),
                            payload: payload.clone(),
                            trust_weight: trust.weight(&r.worker_id),
                        },
                    )
                })
            })
            .collect();
        candidates.sort_by(|(sa, a), (sb, b)| sa.cmp(sb).then_with(|| a.worker_id.cmp(&b.worker_id)));
        let candidates: Vec<Candidate> = candidates.into_iter().map(|(_, c)| c).collect();

        let first = candidates.first()?;
        if candidates.len() == 1 {
            return Some(canonical(task_id, first.clone(), ResolutionStrategy::Single, None));
        }

        if candidates.iter().all(|c| c.payload == first.payload) {
            return Some(canonical(
                task_id,
                first.clone(),
                ResolutionStrategy::ExactMatch,
                None,
            ));
        }

        if let Some(winner) = self.vote(&candidates) {
            return Some(with_conflict(
                task_id,
                &candidates,
                winner,
                ResolutionStrategy::WeightedVote,
            ));
        }

        let winner = most_trusted(candidates.iter())?;
        Some(with_conflict(
            task_id,
            &candidates,
            winner,
            ResolutionStrategy::PriorityFallback,
        ))
    }

    fn vote<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        let classifier = self.classifier.as_ref()?;

        // BTreeMap keeps group iteration independent of hashing.
        let mut groups: BTreeMap<String, Vec<&Candidate>> = BTreeMap::new();
        for candidate in candidates {
            let class = classifier.classify(&candidate.payload)?;
            groups.entry(class).or_default().push(candidate);
        }

        let max_count = groups.values().map(Vec::len).max()?;
        let leaders: Vec<&Vec<&Candidate>> =
            groups.values().filter(|g| g.len() == max_count).collect();

        let group = match leaders.as_slice() {
            [only] => *only,
            _ => {
                let weight = |g: &Vec<&Candidate>| g.iter().map(|c| c.trust_weight).sum::<f64>();
                let best = leaders
                    .iter()
                    .map(|g| weight(g))
                    .max_by(|a, b| a.total_cmp(b))?;
                let mut heaviest = leaders.iter().filter(|g| weight(g).total_cmp(&best).is_eq());
                let group = heaviest.next()?;
                if heaviest.next().is_some() {
                    return None;
                }
                *group
            }
        };

        most_trusted(group.iter().copied())
    }
}

/// Highest trust weight; among equals, the first in registration order.
fn most_trusted<'a>(candidates: impl Iterator<Item = &'a Candidate>) -> Option<&'a Candidate> {
    candidates.fold(None, |best: Option<&Candidate>, c| match best {
        Some(b) if c.trust_weight.total_cmp(&b.trust_weight) != Ordering::Greater => Some(b),
        _ => Some(c),
    })
}

fn canonical(
    task_id: &str,
    accepted: Candidate,
    strategy: ResolutionStrategy,
    conflict: Option<Conflict>,
) -> CanonicalResult {
    CanonicalResult {
        task_id: task_id.to_string(),
        payload: accepted.payload,
        worker_id: accepted.worker_id,
        strategy,
        conflict,
    }
}

fn with_conflict(
    task_id: &str,
    candidates: &[Candidate],
    winner: &Candidate,
    strategy: ResolutionStrategy,
) -> CanonicalResult {
    let discarded = candidates
        .iter()
        .filter(|c| c.payload != winner.payload)
        .cloned()
        .collect();
    let conflict = Conflict {
        task_id: task_id.to_string(),
        strategy,
        accepted: winner.clone(),
        discarded,
    };
    canonical(task_id, winner.clone(), strategy, Some(conflict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::Outcome;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct SeverityClassifier;

    impl PayloadClassifier for SeverityClassifier {
        fn name(&self) -> &str {
            "sev"
        }

        fn classify(&self, payload: &Payload) -> Option<String> {
            payload.get("sev")?.as_str().map(str::to_string)
        }
    }

    fn ok(worker: &str, payload: Payload) -> TaskResult {
        TaskResult {
            task_id: "t".into(),
            worker_id: worker.into(),
            attempt: 1,
            outcome: Outcome::Success(payload),
            produced_at: Utc::now(),
            duration_ms: 1,
        }
    }

    fn table(entries: &[(&str, f64)]) -> TrustTable {
        let mut t = TrustTable::new();
        for (seq, (id, w)) in entries.iter().enumerate() {
            t.insert(*id, seq as u64, *w);
        }
        t
    }

    #[test]
    fn no_success_resolves_to_none() {
        let mut failed = ok("a", json!(1));
        failed.outcome = Outcome::Failure("boom".into());
        assert_eq!(ConflictResolver::new().resolve("t", &[failed], &TrustTable::new()), None);
    }

    #[test]
    fn single_success() {
        let r = ConflictResolver::new()
            .resolve("t", &[ok("a", json!(1))], &table(&[("a", 1.0)]))
            .unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::Single);
        assert_eq!(r.conflict, None);
    }

    #[test]
    fn identical_payloads_match_without_conflict() {
        let trust = table(&[("a", 1.0), ("b", 1.0)]);
        let r = ConflictResolver::new()
            .resolve("t", &[ok("b", json!({"x": 1})), ok("a", json!({"x": 1}))], &trust)
            .unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::ExactMatch);
        assert_eq!(r.worker_id, "a");
        assert_eq!(r.conflict, None);
    }

    #[test]
    fn equal_trust_falls_back_to_first_registered() {
        let trust = table(&[("a", 1.0), ("b", 1.0)]);
        let results = [ok("b", json!({"sev": "low"})), ok("a", json!({"sev": "high"}))];
        let r = ConflictResolver::new().resolve("t", &results, &trust).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::PriorityFallback);
        assert_eq!(r.payload, json!({"sev": "high"}));
        let conflict = r.conflict.unwrap();
        assert_eq!(conflict.accepted.worker_id, "a");
        assert_eq!(conflict.discarded.len(), 1);
        assert_eq!(conflict.discarded[0].worker_id, "b");
    }

    #[test]
    fn fallback_prefers_higher_trust() {
        let trust = table(&[("a", 1.0), ("b", 3.0)]);
        let results = [ok("a", json!(1)), ok("b", json!(2))];
        let r = ConflictResolver::new().resolve("t", &results, &trust).unwrap();
        assert_eq!(r.worker_id, "b");
    }

    #[test]
    fn majority_class_wins_vote() {
        let trust = table(&[("a", 5.0), ("b", 1.0), ("c", 1.0)]);
        let results = [
            ok("a", json!({"sev": "low"})),
            ok("b", json!({"sev": "high", "line": 3})),
            ok("c", json!({"sev": "high", "line": 4})),
        ];
        let resolver = ConflictResolver::with_classifier(Arc::new(SeverityClassifier));
        let r = resolver.resolve("t", &results, &trust).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::WeightedVote);
        assert_eq!(r.worker_id, "b");
        assert_eq!(r.conflict.unwrap().discarded.len(), 2);
    }

    #[test]
    fn vote_tie_broken_by_summed_trust() {
        let trust = table(&[("a", 1.0), ("b", 2.5)]);
        let results = [ok("a", json!({"sev": "low"})), ok("b", json!({"sev": "high"}))];
        let resolver = ConflictResolver::with_classifier(Arc::new(SeverityClassifier));
        let r = resolver.resolve("t", &results, &trust).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::WeightedVote);
        assert_eq!(r.worker_id, "b");
    }

    #[test]
    fn full_vote_tie_falls_through() {
        let trust = table(&[("a", 1.0), ("b", 1.0)]);
        let results = [ok("a", json!({"sev": "low"})), ok("b", json!({"sev": "high"}))];
        let resolver = ConflictResolver::with_classifier(Arc::new(SeverityClassifier));
        let r = resolver.resolve("t", &results, &trust).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::PriorityFallback);
        assert_eq!(r.worker_id, "a");
    }

    #[test]
    fn resolution_ignores_arrival_order() {
        let trust = table(&[("a", 1.0), ("b", 1.0), ("c", 2.0)]);
        let a = ok("a", json!(1));
        let b = ok("b", json!(2));
        let c = ok("c", json!(3));
        let resolver = ConflictResolver::new();
        let first = resolver.resolve("t", &[a.clone(), b.clone(), c.clone()], &trust);
        let second = resolver.resolve("t", &[c, a, b], &trust);
        assert_eq!(first, second);
    }
}
