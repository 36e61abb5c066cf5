//! Merges attempt records into final items plus provenance.
//! Items are never unioned across sources: only the first source that
//! returned data contributes.

use serde::Serialize;

use crate::catalog::SourceId;
use crate::controller::{AttemptOutcome, AttemptRecord};
use crate::item::CollectedItem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceStatus {
    Results(usize),
    NoResults,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: SourceId,
    #[serde(flatten)]
    pub status: SourceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregate {
    pub items: Vec<CollectedItem>,
    pub trail: Vec<SourceId>,
    pub source_used: Option<SourceId>,
    pub sources: Vec<SourceReport>,
}

pub fn merge(attempts: &[AttemptRecord]) -> Aggregate {
    let mut agg = Aggregate {
        trail: Vec::with_capacity(attempts.len()),
        sources: Vec::with_capacity(attempts.len()),
        ..Aggregate::default()
    };

    for a in attempts {
        agg.trail.push(a.source.clone());
        let status = match &a.outcome {
            AttemptOutcome::Success(items) => {
                if agg.source_used.is_none() {
                    agg.source_used = Some(a.source.clone());
                    agg.items = items.clone();
                }
                SourceStatus::Results(items.len())
            }
            AttemptOutcome::Empty => SourceStatus::NoResults,
            AttemptOutcome::Failed(reason) => SourceStatus::Unavailable(reason.clone()),
        };
        agg.sources.push(SourceReport {
            source: a.source.clone(),
            status,
        });
    }
    agg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(src: &str, outcome: AttemptOutcome) -> AttemptRecord {
        AttemptRecord {
            source: SourceId::new(src),
            outcome,
        }
    }

    #[test]
    fn success_uses_only_the_succeeding_attempt() {
        let b = SourceId::new("b");
        let attempts = vec![
            rec("a", AttemptOutcome::Failed("503".into())),
            rec("b", AttemptOutcome::Success(vec![CollectedItem::new(&b, "t", "", "u")])),
        ];
        let agg = merge(&attempts);
        assert_eq!(agg.items.len(), 1);
        assert_eq!(agg.source_used, Some(b.clone()));
        assert_eq!(agg.trail, vec![SourceId::new("a"), b]);
        assert_eq!(agg.sources[0].status, SourceStatus::Unavailable("503".into()));
        assert_eq!(agg.sources[1].status, SourceStatus::Results(1));
    }

    #[test]
    fn exhausted_has_no_items_and_full_trail() {
        let attempts = vec![
            rec("a", AttemptOutcome::Empty),
            rec("b", AttemptOutcome::Failed("timeout".into())),
            rec("c", AttemptOutcome::Empty),
        ];
        let agg = merge(&attempts);
        assert!(agg.items.is_empty());
        assert!(agg.source_used.is_none());
        assert_eq!(agg.trail.len(), 3);
    }

    #[test]
    fn report_serializes_flat() {
        let r = SourceReport {
            source: SourceId::new("news"),
            status: SourceStatus::NoResults,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["source"], "news");
        assert_eq!(v["status"], "no_results");
    }
}
