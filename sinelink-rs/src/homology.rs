//! Best-hit tables and reciprocal best hits between organisms A and B.

use crate::dialect::IdCanon;
use crate::error::{ensure_not_fully_malformed, Audit, RejectReason, Staged};
use crate::loci::{data_rows, tsv_reader};
use crate::types::{HashMap, HashMapExt};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitDirection {
    AtoB,
    BtoA,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestHitPair {
    pub query_id: String,
    pub target_id: String,
    /// Bitscore; higher is better.
    pub score: f64,
    pub evalue: f64,
    pub direction: HitDirection,
}

/// An orthologue candidate: `gene_a` in organism A, `gene_b` in organism B.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RbhPair {
    pub gene_a: String,
    pub gene_b: String,
}

/// Decode a BLAST tabular hit table.
///
/// Accepts the 12-column `-outfmt 6` layout (evalue in column 11, bitscore
/// in column 12) or a compact `query target bitscore evalue` layout. Query
/// and target ids go through their organism's canonicalization.
pub fn read_best_hits(
    path: &Path,
    direction: HitDirection,
    query_canon: &IdCanon,
    target_canon: &IdCanon,
) -> Result<Staged<Vec<BestHitPair>>> {
    let mut reader = tsv_reader(path)?;
    let mut audit = Audit::default();
    let mut first_bad: Option<(usize, RejectReason)> = None;
    let mut hits = Vec::new();

    for (row, result) in data_rows(&mut reader) {
        let parsed = result
            .map_err(|e| RejectReason::Unparseable(e.to_string()))
            .and_then(|record| {
                let (score, evalue) = match record.len() {
                    12 => (&record[11], &record[10]),
                    4 => (&record[2], &record[3]),
                    n => {
                        return Err(RejectReason::Unparseable(format!(
                            "expected 12 or 4 columns, got {n}"
                        )))
                    }
                };
                let score = parse_finite(score)?;
                let evalue = parse_finite(evalue)?;
                let query_id = query_canon.canonical_id(&record[0]);
                let target_id = target_canon.canonical_id(&record[1]);
                if query_id.is_empty() || target_id.is_empty() {
                    return Err(RejectReason::MissingIdentifier("query/target".to_string()));
                }
                Ok(BestHitPair {
                    query_id,
                    target_id,
                    score,
                    evalue,
                    direction,
                })
            });
        match parsed {
            Ok(hit) => hits.push(hit),
            Err(reason) => {
                audit.reject(&reason);
                first_bad.get_or_insert((row, reason));
            }
        }
    }

    ensure_not_fully_malformed(path, hits.len(), first_bad)?;
    tracing::info!(
        path = %path.display(),
        direction = ?direction,
        hits = hits.len(),
        rejected = audit.rejected_total(),
        "hit table loaded"
    );
    Ok(Staged::new(hits, audit))
}

fn parse_finite(s: &str) -> Result<f64, RejectReason> {
    match s.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RejectReason::Unparseable(format!("bad score '{s}'"))),
    }
}

/// Keep the best-scoring target per query.
///
/// Stable sort on (query ascending, score descending): among equal top
/// scores the row seen first in the input wins.
pub fn reduce_best_hits(hits: &[BestHitPair]) -> Vec<BestHitPair> {
    let mut sorted: Vec<BestHitPair> = hits.to_vec();
    sorted.sort_by(|a, b| {
        a.query_id
            .cmp(&b.query_id)
            .then_with(|| b.score.total_cmp(&a.score))
    });
    sorted.dedup_by(|later, kept| later.query_id == kept.query_id);
    sorted
}

/// Pairs `(q, t)` where `t` is `q`'s best hit in `forward` and `q` is `t`'s
/// best hit in `backward`. Sorted and deduplicated.
///
/// `gene_a` is always the forward query, so swapping the tables swaps the
/// members of every pair.
pub fn reciprocal_best_hits(forward: &[BestHitPair], backward: &[BestHitPair]) -> Vec<RbhPair> {
    let forward = reduce_best_hits(forward);
    let backward = reduce_best_hits(backward);
    let back_best: HashMap<&str, &str> = backward
        .iter()
        .map(|h| (h.query_id.as_str(), h.target_id.as_str()))
        .collect();

    let mut pairs: Vec<RbhPair> = forward
        .iter()
        .filter(|h| back_best.get(h.target_id.as_str()) == Some(&h.query_id.as_str()))
        .map(|h| RbhPair {
            gene_a: h.query_id.clone(),
            gene_b: h.target_id.clone(),
        })
        .collect();
    pairs.sort();
    pairs.dedup();
    pairs
}

/// RBH pairs with lookup from either organism.
#[derive(Debug, Clone, Default)]
pub struct RbhSet {
    pairs: Vec<RbhPair>,
    by_a: HashMap<String, usize>,
    by_b: HashMap<String, usize>,
}

impl RbhSet {
    pub fn new(pairs: Vec<RbhPair>) -> Self {
        let mut by_a = HashMap::with_capacity(pairs.len());
        let mut by_b = HashMap::with_capacity(pairs.len());
        for (i, p) in pairs.iter().enumerate() {
            by_a.insert(p.gene_a.clone(), i);
            by_b.insert(p.gene_b.clone(), i);
        }
        Self { pairs, by_a, by_b }
    }

    pub fn pairs(&self) -> &[RbhPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn by_gene_a(&self, gene: &str) -> Option<&RbhPair> {
        self.by_a.get(gene).map(|&i| &self.pairs[i])
    }

    pub fn by_gene_b(&self, gene: &str) -> Option<&RbhPair> {
        self.by_b.get(gene).map(|&i| &self.pairs[i])
    }
}
