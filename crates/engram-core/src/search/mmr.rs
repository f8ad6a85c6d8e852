//! Maximal Marginal Relevance
//!
//! Greedy diversity reranking over a retrieval candidate pool:
//!
//!   MMR(d) = λ · relevance(d) − (1 − λ) · max_sim(d, selected)
//!
//! λ = 1.0 reduces to pure relevance ordering; λ = 0.0 maximises
//! diversity. Pairwise similarity is cosine over the stored embeddings.

use super::cosine_similarity;

/// A candidate the reranker can see: relevance score plus its embedding
pub struct MmrCandidate<'a> {
    pub score: f32,
    pub vector: &'a [f32],
}

/// Select up to `limit` candidates balancing relevance against diversity.
///
/// Returns indices into `candidates` in selection order. The pool is
/// expected to be pre-filtered by the similarity floor; MMR only reorders
/// and truncates.
pub fn mmr_select(candidates: &[MmrCandidate<'_>], lambda: f32, limit: usize) -> Vec<usize> {
    if candidates.is_empty() || limit == 0 {
        return Vec::new();
    }
    let lambda = lambda.clamp(0.0, 1.0);

    let n = candidates.len();
    let mut selected: Vec<usize> = Vec::with_capacity(limit.min(n));
    let mut remaining: Vec<usize> = (0..n).collect();

    // Seed with the most relevant candidate
    let first = remaining
        .iter()
        .copied()
        .max_by(|&a, &b| {
            candidates[a]
                .score
                .partial_cmp(&candidates[b].score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    selected.push(first);
    remaining.retain(|&i| i != first);

    while selected.len() < limit && !remaining.is_empty() {
        let best = remaining
            .iter()
            .copied()
            .max_by(|&a, &b| {
                let sa = mmr_score(&candidates[a], &selected, candidates, lambda);
                let sb = mmr_score(&candidates[b], &selected, candidates, lambda);
                sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(remaining[0]);
        selected.push(best);
        remaining.retain(|&i| i != best);
    }

    selected
}

fn mmr_score(
    candidate: &MmrCandidate<'_>,
    selected: &[usize],
    pool: &[MmrCandidate<'_>],
    lambda: f32,
) -> f32 {
    let max_sim = selected
        .iter()
        .map(|&s| cosine_similarity(candidate.vector, pool[s].vector))
        .fold(0.0_f32, f32::max);
    lambda * candidate.score - (1.0 - lambda) * max_sim
}
