//! Nearest-feature and overlap resolution between query loci and reference
//! features, per contig.
//!
//! References are indexed per contig: a COITree for overlap lookups, plus
//! the same intervals ordered by start and by end for the closest-feature
//! sweep. Queries and references on contigs the other side does not have
//! are never compared; they are counted as `contig_mismatch`.

use crate::error::{Audit, Staged};
use crate::interval::GenomicInterval;
use crate::types::{HashMap, HashMapExt, HashSet, Strand};
use coitrees::{BasicCOITree, Interval, IntervalTree as CoitreeIntervalTree};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Nearest reference of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosestHit {
    pub ref_id: String,
    /// 0 on overlap or abutment. Otherwise the gap, negative when the
    /// reference lies upstream of the query in the reference's orientation.
    pub signed_distance: i64,
}

#[derive(Debug, Clone, Copy, Default)]
struct RefSlot {
    idx: u32,
}

struct ContigIndex<'a> {
    by_start: Vec<&'a GenomicInterval>,
    /// Positions into `by_start`, ordered by (end, start order).
    by_end: Vec<u32>,
    tree: BasicCOITree<RefSlot, u32>,
}

// COITree coordinates are i32; longer contigs saturate.
fn to_coord(x: u64) -> i32 {
    x.min(i32::MAX as u64) as i32
}

impl<'a> ContigIndex<'a> {
    fn new(mut by_start: Vec<&'a GenomicInterval>) -> Self {
        by_start.sort_by(|a, b| a.sort_cmp(b));
        let mut by_end: Vec<u32> = (0..by_start.len() as u32).collect();
        by_end.sort_by_key(|&i| (by_start[i as usize].end, i));

        // COITree intervals are end-inclusive; convert [start, end) -> [start, end-1].
        let intervals: Vec<Interval<RefSlot>> = by_start
            .iter()
            .enumerate()
            .map(|(i, r)| {
                Interval::new(
                    to_coord(r.start),
                    to_coord(r.end.saturating_sub(1)),
                    RefSlot { idx: i as u32 },
                )
            })
            .collect();
        let tree = BasicCOITree::new(&intervals);
        Self {
            by_start,
            by_end,
            tree,
        }
    }

    /// Positions of overlapping references, in sorted reference order.
    fn overlapping(&self, q: &GenomicInterval) -> Vec<u32> {
        let mut found: Vec<u32> = Vec::new();
        let q_last = to_coord(q.end.saturating_sub(1));
        self.tree.query(to_coord(q.start), q_last, |node| {
            let idx = node.metadata.idx;
            // saturated coordinates can over-report; confirm on the real ones
            if self.by_start[idx as usize].overlaps(q) {
                found.push(idx);
            }
        });
        found.sort_unstable();
        found.dedup();
        found
    }
}

struct ReferenceIndex<'a> {
    contigs: HashMap<&'a str, ContigIndex<'a>>,
}

impl<'a> ReferenceIndex<'a> {
    fn build(refs: &'a [GenomicInterval]) -> Self {
        let mut grouped: HashMap<&'a str, Vec<&'a GenomicInterval>> = HashMap::new();
        for r in refs {
            grouped.entry(r.contig.as_str()).or_default().push(r);
        }
        let contigs = grouped
            .into_iter()
            .map(|(contig, members)| (contig, ContigIndex::new(members)))
            .collect();
        Self { contigs }
    }

    fn get(&self, contig: &str) -> Option<&ContigIndex<'a>> {
        self.contigs.get(contig)
    }
}

/// Symmetric half-open overlap test.
pub fn overlap_test(a: &GenomicInterval, b: &GenomicInterval) -> bool {
    a.overlaps(b)
}

/// Group queries by contig, each group in sorted order.
fn group_queries(queries: &[GenomicInterval]) -> BTreeMap<&str, Vec<&GenomicInterval>> {
    let mut grouped: BTreeMap<&str, Vec<&GenomicInterval>> = BTreeMap::new();
    for q in queries {
        grouped.entry(q.contig.as_str()).or_default().push(q);
    }
    for members in grouped.values_mut() {
        members.sort_by(|a, b| a.sort_cmp(b));
    }
    grouped
}

fn count_contig_mismatch(
    queries: &BTreeMap<&str, Vec<&GenomicInterval>>,
    index: &ReferenceIndex<'_>,
) -> u64 {
    let query_side: u64 = queries
        .iter()
        .filter(|(contig, _)| index.get(contig).is_none())
        .map(|(_, members)| members.len() as u64)
        .sum();
    let query_contigs: HashSet<&str> = queries.keys().copied().collect();
    let ref_side: u64 = index
        .contigs
        .iter()
        .filter(|(contig, _)| !query_contigs.contains(*contig))
        .map(|(_, ci)| ci.by_start.len() as u64)
        .sum();
    query_side + ref_side
}

/// For each query, the ids of all overlapping references.
///
/// Queries without any overlap are absent from the mapping.
pub fn overlaps(
    queries: &[GenomicInterval],
    refs: &[GenomicInterval],
) -> Staged<BTreeMap<String, Vec<String>>> {
    let index = ReferenceIndex::build(refs);
    let grouped = group_queries(queries);
    let mut audit = Audit {
        contig_mismatch: count_contig_mismatch(&grouped, &index),
        ..Audit::default()
    };

    let per_contig: Vec<Vec<(String, Vec<String>)>> = grouped
        .par_iter()
        .filter_map(|(contig, members)| {
            let ci = index.get(contig)?;
            let hits = members
                .iter()
                .filter_map(|q| {
                    let found = ci.overlapping(q);
                    if found.is_empty() {
                        return None;
                    }
                    let mut ids: Vec<String> = Vec::with_capacity(found.len());
                    for idx in found {
                        let id = &ci.by_start[idx as usize].feature_id;
                        if !ids.contains(id) {
                            ids.push(id.clone());
                        }
                    }
                    Some((q.feature_id.clone(), ids))
                })
                .collect();
            Some(hits)
        })
        .collect();

    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (query_id, ids) in per_contig.into_iter().flatten() {
        if out.contains_key(&query_id) {
            audit.duplicate_key += 1;
            continue;
        }
        out.insert(query_id, ids);
    }
    Staged::new(out, audit)
}

/// For each query, the single nearest reference with a signed distance.
///
/// Ties resolve to the first candidate in sorted reference order: an
/// overlapping reference beats everything, and a preceding reference beats
/// a following one at equal gap.
pub fn closest(
    queries: &[GenomicInterval],
    refs: &[GenomicInterval],
) -> Staged<BTreeMap<String, ClosestHit>> {
    let index = ReferenceIndex::build(refs);
    let grouped = group_queries(queries);
    let mut audit = Audit {
        contig_mismatch: count_contig_mismatch(&grouped, &index),
        ..Audit::default()
    };

    let per_contig: Vec<Vec<(String, ClosestHit)>> = grouped
        .par_iter()
        .filter_map(|(contig, members)| {
            let ci = index.get(contig)?;
            Some(sweep_contig(ci, members))
        })
        .collect();

    let mut out: BTreeMap<String, ClosestHit> = BTreeMap::new();
    for (query_id, hit) in per_contig.into_iter().flatten() {
        if out.contains_key(&query_id) {
            audit.duplicate_key += 1;
            continue;
        }
        out.insert(query_id, hit);
    }
    Staged::new(out, audit)
}

fn sweep_contig(ci: &ContigIndex<'_>, queries: &[&GenomicInterval]) -> Vec<(String, ClosestHit)> {
    let mut out = Vec::with_capacity(queries.len());
    let mut end_ptr = 0usize;
    let mut best_prev: Option<u32> = None;

    for q in queries {
        // advance past every reference ending at or before this query's start
        while end_ptr < ci.by_end.len() {
            let idx = ci.by_end[end_ptr];
            let r = ci.by_start[idx as usize];
            if r.end > q.start {
                break;
            }
            match best_prev {
                Some(b) if ci.by_start[b as usize].end >= r.end => {}
                _ => best_prev = Some(idx),
            }
            end_ptr += 1;
        }

        let hit = if let Some(&idx) = ci.overlapping(q).first() {
            Some((ci.by_start[idx as usize], 0i64))
        } else {
            let prev = best_prev.map(|i| {
                let r = ci.by_start[i as usize];
                (r, q.start - r.end)
            });
            let next_pos = ci.by_start.partition_point(|r| r.start < q.end);
            let next = ci.by_start.get(next_pos).map(|r| (*r, r.start - q.end));
            match (prev, next) {
                (Some((p, pg)), Some((_, ng))) if pg <= ng => Some(oriented(p, pg as i64, true)),
                (Some(_), Some((n, ng))) => Some(oriented(n, ng as i64, false)),
                (Some((p, pg)), None) => Some(oriented(p, pg as i64, true)),
                (None, Some((n, ng))) => Some(oriented(n, ng as i64, false)),
                (None, None) => None,
            }
        };

        if let Some((r, signed_distance)) = hit {
            out.push((
                q.feature_id.clone(),
                ClosestHit {
                    ref_id: r.feature_id.clone(),
                    signed_distance,
                },
            ));
        }
    }
    out
}

/// Sign a gap in the reference's orientation. A reference to the left of the
/// query is upstream on `+` (and unknown) strands and downstream on `-`.
fn oriented(r: &GenomicInterval, gap: i64, ref_is_left: bool) -> (&GenomicInterval, i64) {
    let genomic = if ref_is_left { -gap } else { gap };
    let signed = match r.strand {
        Strand::Reverse => -genomic,
        Strand::Forward | Strand::Unknown => genomic,
    };
    (r, signed)
}
