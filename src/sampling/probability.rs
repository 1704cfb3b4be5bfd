//! Sampling probability models.
//!
//! Probabilities are unnormalized and indexed by subgraph-local node. A node
//! with no edge towards the seeds always gets exactly 0.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{CandidateSubgraph, Direction};

/// Iteration budget for [`cap_probabilities`].
pub const CAPPING_MAX_ITERATIONS: usize = 50;

/// `min(S, num) / max(S, num)` at which capping counts as converged.
pub const CAPPING_CONVERGENCE: f64 = 0.9999;

/// How candidate nodes are weighted before selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityPolicy {
    /// Every candidate with an edge into the seeds is equally likely.
    Uniform,
    /// LADIES: proportional to the sum of squared weights of the candidate's
    /// edges into the seeds.
    #[default]
    Importance,
}

/// `values` divided by their largest element, so the maximum becomes 1.
/// All-zero input is returned unchanged. Only for uses that are invariant to
/// a common factor.
pub fn scale_to_unit(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        values.iter().map(|v| v / max).collect()
    } else {
        values.to_vec()
    }
}

/// Per-candidate probability under `policy`.
///
/// `weights` is indexed by subgraph edge. Both policies work on the reversed
/// candidate subgraph, where each candidate's edges into the seeds become its
/// in-edges. Importance probabilities are relative to the heaviest candidate
/// edge.
pub fn node_probabilities(
    candidate: &CandidateSubgraph,
    weights: &[f64],
    policy: ProbabilityPolicy,
) -> Result<Vec<f64>> {
    let reversed = candidate.graph.reverse();
    match policy {
        ProbabilityPolicy::Uniform => Ok(reversed
            .degrees(Direction::In)
            .into_iter()
            .map(|d| if d > 0 { 1.0 } else { 0.0 })
            .collect()),
        ProbabilityPolicy::Importance => {
            let squared: Vec<f64> = scale_to_unit(weights).iter().map(|w| w * w).collect();
            reversed.sum_into_dst(&squared)
        }
    }
}

/// Result of scaling raw probabilities into Poisson inclusion probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct CappedProbabilities {
    /// `min(raw * scale, 1)` per candidate.
    pub probabilities: Vec<f64>,
    pub scale: f64,
    pub iterations: usize,
    /// False when the iteration budget ran out first; `scale` is then the
    /// last value reached.
    pub converged: bool,
}

impl CappedProbabilities {
    /// Expected number of included candidates.
    pub fn expected_count(&self) -> f64 {
        self.probabilities.iter().sum()
    }
}

/// Find `c` with `sum(min(raw * c, 1)) ~= num` by fixed-point iteration.
///
/// With `raw.len() <= num` every candidate is included with probability 1.
pub fn cap_probabilities(raw: &[f64], num: usize) -> CappedProbabilities {
    if raw.len() <= num {
        return CappedProbabilities {
            probabilities: vec![1.0; raw.len()],
            scale: 1.0,
            iterations: 0,
            converged: true,
        };
    }

    let target = num as f64;
    let capped_sum = |c: f64| -> f64 { raw.iter().map(|p| (p * c).min(1.0)).sum() };

    let mut c = 1.0;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < CAPPING_MAX_ITERATIONS {
        let s = capped_sum(c);
        if s.min(target) / s.max(target) >= CAPPING_CONVERGENCE {
            converged = true;
            break;
        }
        // All mass is zero; no scale can reach the target
        if s <= 0.0 {
            break;
        }
        c *= target / s;
        iterations += 1;
    }
    if !converged && iterations == CAPPING_MAX_ITERATIONS {
        let s = capped_sum(c);
        converged = s.min(target) / s.max(target) >= CAPPING_CONVERGENCE;
    }

    CappedProbabilities {
        probabilities: raw.iter().map(|p| (p * c).min(1.0)).collect(),
        scale: c,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ArrowGraph, GlobalNodeId, GraphQuery};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn within_tolerance(sum: f64, num: usize) -> bool {
        let target = num as f64;
        sum.min(target) / sum.max(target) >= CAPPING_CONVERGENCE
    }

    // Seed 0 receives edges from 1 (w=1), 2 (w=2), 3 (w=3); 3 also feeds seed 1 (w=1).
    fn candidate() -> (ArrowGraph, CandidateSubgraph) {
        let graph = ArrowGraph::from_edge_list(
            5,
            &[(1, 0), (2, 0), (3, 0), (3, 1), (0, 4)],
            Some(vec![1.0, 2.0, 3.0, 1.0, 9.0]),
        )
        .unwrap();
        let candidate = graph.induced_subgraph(&[GlobalNodeId(0), GlobalNodeId(1)]).unwrap();
        (graph, candidate)
    }

    #[test]
    fn test_uniform_probabilities() {
        let (graph, candidate) = candidate();
        let weights = candidate.gather_edge_weights(graph.edge_weights()).unwrap();
        let probs = node_probabilities(&candidate, &weights, ProbabilityPolicy::Uniform).unwrap();

        // Seeds 0 and 1, then nodes 2 and 3
        assert_eq!(candidate.node_map.values().len(), 4);
        // Seed 0 has no edge into the seed set, every other node does
        assert_eq!(probs, vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_importance_probabilities_sum_squares() {
        let (graph, candidate) = candidate();
        let weights = candidate.gather_edge_weights(graph.edge_weights()).unwrap();
        let probs = node_probabilities(&candidate, &weights, ProbabilityPolicy::Importance).unwrap();

        // Weights relative to the heaviest (3): node 1 (1^2), node 2 (2^2), node 3 (3^2 + 1^2), over 9
        let expected = [0.0, 1.0 / 9.0, 4.0 / 9.0, 10.0 / 9.0];
        for (p, e) in probs.iter().zip(expected) {
            assert!((p - e).abs() < 1e-12, "{} vs {}", p, e);
        }
    }

    #[test]
    fn test_importance_probabilities_stay_finite_for_huge_weights() {
        let graph = ArrowGraph::from_edge_list(4, &[(1, 0), (2, 0), (3, 0)], Some(vec![1e200, 1.0, 1.0])).unwrap();
        let candidate = graph.induced_subgraph(&[GlobalNodeId(0)]).unwrap();
        let weights = candidate.gather_edge_weights(graph.edge_weights()).unwrap();
        let probs = node_probabilities(&candidate, &weights, ProbabilityPolicy::Importance).unwrap();

        assert!(probs.iter().all(|p| p.is_finite()));
        assert_eq!(probs[1], 1.0);
    }

    #[test]
    fn test_scale_to_unit() {
        assert_eq!(scale_to_unit(&[2.0, 0.0, 8.0]), vec![0.25, 0.0, 1.0]);
        assert_eq!(scale_to_unit(&[0.0, 0.0]), vec![0.0, 0.0]);
        assert_eq!(scale_to_unit(&[f64::MAX, 1.0])[0], 1.0);
    }

    #[test]
    fn test_capping_skipped_when_few_candidates() {
        let capped = cap_probabilities(&[0.1, 0.0, 0.3], 3);
        assert_eq!(capped.probabilities, vec![1.0, 1.0, 1.0]);
        assert!(capped.converged);
        assert_eq!(capped.iterations, 0);
    }

    #[test]
    fn test_capping_converges_on_constant_vector() {
        let raw = vec![0.5; 1000];
        for num in [10, 500, 999] {
            let capped = cap_probabilities(&raw, num);
            assert!(capped.converged, "num={} did not converge", num);
            assert!(within_tolerance(capped.expected_count(), num));
            assert!(capped.probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn test_capping_on_random_uniform_vector() {
        let mut rng = Pcg64::seed_from_u64(3);
        let raw: Vec<f64> = (0..1000).map(|_| rng.gen::<f64>()).collect();

        for num in [10, 500, 999] {
            let capped = cap_probabilities(&raw, num);
            if capped.converged {
                assert!(within_tolerance(capped.expected_count(), num));
            }
            assert!(capped.iterations <= CAPPING_MAX_ITERATIONS);
        }
        // Small targets are far from saturation and converge in one step
        assert!(cap_probabilities(&raw, 10).converged);
    }

    #[test]
    fn test_capping_all_zero_does_not_converge() {
        let capped = cap_probabilities(&[0.0; 8], 2);
        assert!(!capped.converged);
        assert!(capped.probabilities.iter().all(|&p| p == 0.0));
    }

    proptest! {
        #[test]
        fn prop_capped_probabilities_are_bounded(
            raw in prop::collection::vec(0.0f64..10.0, 1..200),
            num in 1usize..100,
        ) {
            let capped = cap_probabilities(&raw, num);
            prop_assert_eq!(capped.probabilities.len(), raw.len());
            for p in &capped.probabilities {
                prop_assert!(*p >= 0.0 && *p <= 1.0);
            }
            if capped.converged && raw.len() > num {
                prop_assert!(within_tolerance(capped.expected_count(), num));
            }
        }
    }
}
