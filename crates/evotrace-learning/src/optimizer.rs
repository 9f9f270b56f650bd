//! Multi-objective decision support over candidates whose objectives are
//! all "higher is better".

use std::collections::BTreeMap;

use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub objectives: BTreeMap<String, f64>,
    pub metadata: Option<Value>,
}

pub struct Optimizer;

impl Optimizer {
    /// `c1` dominates `c2` over the intersection of their objective keys:
    /// `>=` on every shared key and `>` on at least one. Missing or
    /// non-finite values on either side are skipped. No shared, comparable
    /// key means incomparable.
    pub fn dominates(c1: &Candidate, c2: &Candidate) -> bool {
        let mut any_strict = false;
        let mut any_compared = false;
        for (key, v1) in &c1.objectives {
            let Some(v2) = c2.objectives.get(key) else { continue };
            if !v1.is_finite() || !v2.is_finite() {
                continue;
            }
            any_compared = true;
            if v1 < v2 {
                return false;
            }
            if v1 > v2 {
                any_strict = true;
            }
        }
        any_compared && any_strict
    }

    pub fn pareto_front(candidates: &[Candidate]) -> Vec<Candidate> {
        candidates
            .iter()
            .filter(|c| !candidates.iter().any(|other| Self::dominates(other, c)))
            .cloned()
            .collect()
    }

    /// Weighted-sum `sum(w_i * o_i)` over candidates, highest score wins.
    /// Weights must be finite and non-negative; empty weights or an empty
    /// candidate list yield `None`.
    pub fn select_best(candidates: &[Candidate], weights: &BTreeMap<String, f64>) -> Option<Candidate> {
        if candidates.is_empty() || weights.is_empty() {
            return None;
        }
        if weights.values().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        candidates
            .iter()
            .max_by(|a, b| Self::score(a, weights).partial_cmp(&Self::score(b, weights)).unwrap())
            .cloned()
    }

    fn score(candidate: &Candidate, weights: &BTreeMap<String, f64>) -> f64 {
        weights
            .iter()
            .map(|(key, w)| w * candidate.objectives.get(key).copied().unwrap_or(0.0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, objectives: &[(&str, f64)]) -> Candidate {
        Candidate {
            id: id.to_string(),
            objectives: objectives.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            metadata: None,
        }
    }

    #[test]
    fn dominates_requires_strict_improvement_on_one_axis() {
        let a = candidate("a", &[("speed", 2.0), ("cost", 1.0)]);
        let b = candidate("b", &[("speed", 1.0), ("cost", 1.0)]);
        assert!(Optimizer::dominates(&a, &b));
        assert!(!Optimizer::dominates(&b, &a));
    }

    #[test]
    fn equal_candidates_do_not_dominate_each_other() {
        let a = candidate("a", &[("speed", 1.0)]);
        let b = candidate("b", &[("speed", 1.0)]);
        assert!(!Optimizer::dominates(&a, &b));
        assert!(!Optimizer::dominates(&b, &a));
    }

    #[test]
    fn pareto_front_drops_dominated_candidates() {
        let candidates = vec![
            candidate("fast-cheap", &[("speed", 2.0), ("cost", 2.0)]),
            candidate("slow-cheap", &[("speed", 1.0), ("cost", 2.0)]),
            candidate("fast-expensive", &[("speed", 2.0), ("cost", 1.0)]),
        ];
        let front = Optimizer::pareto_front(&candidates);
        let ids: Vec<&str> = front.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["fast-cheap"]);
    }

    #[test]
    fn select_best_applies_weighted_sum() {
        let candidates = vec![candidate("a", &[("speed", 1.0), ("cost", 3.0)]), candidate("b", &[("speed", 3.0), ("cost", 1.0)])];
        let weights = BTreeMap::from([("speed".to_string(), 2.0), ("cost".to_string(), 1.0)]);
        let best = Optimizer::select_best(&candidates, &weights).unwrap();
        assert_eq!(best.id, "b");
    }

    #[test]
    fn select_best_rejects_negative_weights() {
        let candidates = vec![candidate("a", &[("speed", 1.0)])];
        let weights = BTreeMap::from([("speed".to_string(), -1.0)]);
        assert!(Optimizer::select_best(&candidates, &weights).is_none());
    }
}
