//! Expression evidence: count matrices, SINE transcription flags, and the
//! left joins that attach both to SINE-gene links and RBH pairs.
//!
//! Joins are left joins from the locus / pair side. A miss on the other
//! side becomes `no` (SINE flags) or `NA` (gene expression) and is counted
//! as `join_miss`, so denominators never shrink.

use crate::dialect::{ContigRule, IdCanon};
use crate::error::{ensure_not_fully_malformed, Audit, RejectReason, Staged};
use crate::homology::RbhPair;
use crate::loci::{self, data_rows, locus_normalizer, tsv_reader};
use crate::resolver::ClosestHit;
use crate::types::{Direction, Flag, HashSet, HashSetExt, Organism};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionRecord {
    pub gene_id: String,
    /// One cell per sample column; `None` for `NA` or empty cells.
    pub counts: Vec<Option<f64>>,
}

impl ExpressionRecord {
    /// Mean over present cells; `None` when there are none.
    pub fn mean(&self) -> Option<f64> {
        let present: Vec<f64> = self.counts.iter().flatten().copied().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionMatrix {
    pub samples: Vec<String>,
    pub rows: Vec<ExpressionRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpressionFlag {
    pub mean: f64,
    pub expressed: bool,
}

/// Read a gene x sample count matrix: a header row, gene ids in the first
/// column, one numeric column per sample.
///
/// Repeated gene ids (after canonicalization) keep the first row.
pub fn read_expression_matrix(path: &Path, canon: &IdCanon) -> Result<Staged<ExpressionMatrix>> {
    let mut reader = tsv_reader(path)?;
    let mut records = data_rows(&mut reader);
    let header = match records.next() {
        Some((_, result)) => result.with_context(|| format!("{}: reading header", path.display()))?,
        None => anyhow::bail!("{}: empty expression matrix", path.display()),
    };
    let samples: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut audit = Audit::default();
    let mut first_bad: Option<(usize, RejectReason)> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();

    for (row, result) in records {
        let parsed = result
            .map_err(|e| RejectReason::Unparseable(e.to_string()))
            .and_then(|record| parse_matrix_row(&record, header.len(), canon));
        match parsed {
            Ok(rec) => {
                if !seen.insert(rec.gene_id.clone()) {
                    audit.duplicate_key += 1;
                    tracing::warn!(gene = %rec.gene_id, row, "duplicate expression row; keeping the first");
                    continue;
                }
                rows.push(rec);
            }
            Err(reason) => {
                audit.reject(&reason);
                first_bad.get_or_insert((row, reason));
            }
        }
    }

    ensure_not_fully_malformed(path, rows.len(), first_bad)?;
    tracing::info!(
        path = %path.display(),
        genes = rows.len(),
        samples = samples.len(),
        rejected = audit.rejected_total(),
        "expression matrix loaded"
    );
    Ok(Staged::new(ExpressionMatrix { samples, rows }, audit))
}

fn parse_matrix_row(
    record: &csv::StringRecord,
    width: usize,
    canon: &IdCanon,
) -> Result<ExpressionRecord, RejectReason> {
    if record.len() != width {
        return Err(RejectReason::Unparseable(format!(
            "expected {} columns, got {}",
            width,
            record.len()
        )));
    }
    let gene_id = canon.canonical_id(&record[0]);
    if gene_id.is_empty() {
        return Err(RejectReason::MissingIdentifier("gene column".to_string()));
    }
    let counts = record
        .iter()
        .skip(1)
        .map(|cell| {
            let cell = cell.trim();
            if cell.is_empty() || cell.eq_ignore_ascii_case("NA") {
                return Ok(None);
            }
            match cell.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(RejectReason::Unparseable(format!("non-numeric count '{cell}'"))),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExpressionRecord { gene_id, counts })
}

/// Per-gene mean and `mean >= threshold` flag.
///
/// A gene without any present sample is never expressed; it is counted as
/// `arithmetic_degenerate` instead of dividing by zero.
pub fn compute_expression_flags(
    matrix: &ExpressionMatrix,
    threshold: f64,
) -> Staged<BTreeMap<String, ExpressionFlag>> {
    let mut audit = Audit::default();
    let flags: BTreeMap<String, ExpressionFlag> = matrix
        .rows
        .iter()
        .map(|rec| {
            let flag = match rec.mean() {
                Some(mean) => ExpressionFlag {
                    mean,
                    expressed: mean >= threshold,
                },
                None => {
                    audit.arithmetic_degenerate += 1;
                    ExpressionFlag {
                        mean: 0.0,
                        expressed: false,
                    }
                }
            };
            (rec.gene_id.clone(), flag)
        })
        .collect();
    Staged::new(flags, audit)
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "y" | "1" | "true" => Some(true),
        "no" | "n" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Read `contig start end transcribed` rows into locus key -> transcribed.
///
/// Coordinates are 0-based half-open and go through the same contig rule as
/// the SINE catalog, so the keys match.
pub fn read_sine_flags(
    path: &Path,
    contig_rule: &ContigRule,
    organism: Organism,
) -> Result<Staged<BTreeMap<String, bool>>> {
    let normalizer = locus_normalizer(contig_rule, organism)?;
    let raw = loci::read_bed_records(path, crate::dialect::CoordinateBasis::ZeroBasedHalfOpen)?;
    let mut audit = raw.audit;
    let mut first_bad = raw.first_bad;
    let mut flags: BTreeMap<String, bool> = BTreeMap::new();

    for (row, record) in raw.value {
        let parsed = normalizer.normalize_locus(&record).and_then(|n| {
            let flag = record
                .attribute("name")
                .and_then(parse_flag)
                .ok_or_else(|| RejectReason::Unparseable("transcribed flag".to_string()))?;
            Ok((n.record.interval.feature_id, flag))
        });
        match parsed {
            Ok((key, flag)) => {
                if let Some(&kept) = flags.get(&key) {
                    audit.duplicate_key += 1;
                    if kept != flag {
                        tracing::warn!(
                            organism = %organism,
                            locus = %key,
                            row,
                            kept,
                            "conflicting duplicate SINE flag; keeping the first"
                        );
                    }
                    continue;
                }
                flags.insert(key, flag);
            }
            Err(reason) => {
                audit.reject(&reason);
                first_bad.get_or_insert((row, reason));
            }
        }
    }

    ensure_not_fully_malformed(path, flags.len(), first_bad)?;
    Ok(Staged::new(flags, audit))
}

/// A SINE locus joined to its flanking gene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SineGeneLink {
    pub sine_locus: String,
    pub gene_id: String,
    pub distance: u64,
    pub direction: Direction,
    pub sine_transcribed: bool,
    pub gene_expressed: Flag,
}

/// Attach SINE transcription and gene expression to every closest-gene hit.
pub fn join_sine_expression(
    closest: &BTreeMap<String, ClosestHit>,
    sine_flags: &BTreeMap<String, bool>,
    expr: &BTreeMap<String, ExpressionFlag>,
) -> Staged<Vec<SineGeneLink>> {
    let mut audit = Audit::default();
    let links: Vec<SineGeneLink> = closest
        .iter()
        .map(|(locus, hit)| {
            let sine_transcribed = match sine_flags.get(locus) {
                Some(&t) => t,
                None => {
                    audit.join_miss += 1;
                    false
                }
            };
            let gene_expressed = match expr.get(&hit.ref_id) {
                Some(f) => Flag::from_bool(f.expressed),
                None => {
                    audit.join_miss += 1;
                    Flag::NA
                }
            };
            SineGeneLink {
                sine_locus: locus.clone(),
                gene_id: hit.ref_id.clone(),
                distance: hit.signed_distance.unsigned_abs(),
                direction: Direction::from_signed(hit.signed_distance),
                sine_transcribed,
                gene_expressed,
            }
        })
        .collect();
    Staged::new(links, audit)
}

/// Per-gene SINE status inside the reporting window (`distance < max_distance`):
/// `yes` if any linked SINE is transcribed, `no` otherwise. Genes without a
/// linked SINE are absent.
pub fn gene_sine_flags(links: &[SineGeneLink], max_distance: u64) -> BTreeMap<String, Flag> {
    let mut out: BTreeMap<String, Flag> = BTreeMap::new();
    for link in links.iter().filter(|l| l.distance < max_distance) {
        let entry = out.entry(link.gene_id.clone()).or_insert(Flag::No);
        if link.sine_transcribed {
            *entry = Flag::Yes;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrthologueRow {
    pub gene_a: String,
    pub gene_b: String,
    pub sine_a: Flag,
    pub sine_b: Flag,
    pub expressed_a: Flag,
    pub expressed_b: Flag,
}

/// One row per RBH pair with SINE and expression status on both sides.
///
/// A gene without a linked SINE gets `sine = NA`; that is the normal case
/// and not a join miss. A gene missing from its expression matrix gets
/// `expressed = NA` and counts as `join_miss`.
pub fn build_orthologue_summary(
    rbh: &[RbhPair],
    sine_flags_a: &BTreeMap<String, Flag>,
    sine_flags_b: &BTreeMap<String, Flag>,
    expr_a: &BTreeMap<String, ExpressionFlag>,
    expr_b: &BTreeMap<String, ExpressionFlag>,
) -> Staged<Vec<OrthologueRow>> {
    let mut audit = Audit::default();
    let mut expressed = |table: &BTreeMap<String, ExpressionFlag>, gene: &str| match table.get(gene) {
        Some(f) => Flag::from_bool(f.expressed),
        None => {
            audit.join_miss += 1;
            Flag::NA
        }
    };
    let rows: Vec<OrthologueRow> = rbh
        .iter()
        .map(|pair| OrthologueRow {
            gene_a: pair.gene_a.clone(),
            gene_b: pair.gene_b.clone(),
            sine_a: sine_flags_a.get(&pair.gene_a).copied().unwrap_or(Flag::NA),
            sine_b: sine_flags_b.get(&pair.gene_b).copied().unwrap_or(Flag::NA),
            expressed_a: expressed(expr_a, &pair.gene_a),
            expressed_b: expressed(expr_b, &pair.gene_b),
        })
        .collect();
    Staged::new(rows, audit)
}
