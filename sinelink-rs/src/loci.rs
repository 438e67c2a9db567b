//! SINE locus catalogs and other BED-like tables.

use crate::annotation::RawRows;
use crate::dialect::{ContigRule, CoordinateBasis, Dialect};
use crate::error::{ensure_not_fully_malformed, RejectReason, Staged};
use crate::interval::{sort_intervals, GenomicInterval};
use crate::normalize::{Normalizer, RawRecord};
use crate::types::{HashSet, HashSetExt, Organism, Strand};
use anyhow::{Context, Result};
use std::path::Path;

pub(crate) fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))
}

/// Records of a tab-delimited table paired with their 1-based file line.
///
/// `#` lines are dropped here instead of through the csv reader's comment
/// setting, which stamps a record with the position before any comments it
/// skipped.
pub(crate) fn data_rows(
    reader: &mut csv::Reader<std::fs::File>,
) -> impl Iterator<Item = (usize, csv::Result<csv::StringRecord>)> + '_ {
    reader.records().enumerate().filter_map(|(i, result)| {
        let position = match &result {
            Ok(record) => {
                if record.get(0).is_some_and(|f| f.starts_with('#')) {
                    return None;
                }
                record.position()
            }
            Err(e) => e.position(),
        };
        Some((position.map_or(i + 1, |p| p.line() as usize), result))
    })
}

/// Decode `contig start end [name [score [strand]]]` rows.
///
/// The name column, when present, is exposed as the `name` attribute.
/// `track` and `browser` header lines are skipped.
pub(crate) fn read_bed_records(path: &Path, basis: CoordinateBasis) -> Result<RawRows> {
    let mut reader = tsv_reader(path)?;
    let mut rows = RawRows::new();

    for (row, result) in data_rows(&mut reader) {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                rows.reject(row, RejectReason::Unparseable(e.to_string()));
                continue;
            }
        };
        let first = record.get(0).unwrap_or("");
        if first.starts_with("track") || first.starts_with("browser") {
            continue;
        }
        if record.len() < 3 {
            rows.reject(
                row,
                RejectReason::Unparseable(format!("expected at least 3 columns, got {}", record.len())),
            );
            continue;
        }
        let (start, end) = match (parse_coord(&record[1]), parse_coord(&record[2])) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                rows.reject(
                    row,
                    RejectReason::BadCoordinate(format!("'{}'..'{}'", &record[1], &record[2])),
                );
                continue;
            }
        };
        let attributes = record
            .get(3)
            .map(|name| vec![("name".to_string(), name.trim().to_string())])
            .unwrap_or_default();
        let strand = record
            .get(5)
            .and_then(|s| s.trim().chars().next())
            .map_or(Strand::Unknown, Strand::from_char);
        rows.value.push((
            row,
            RawRecord {
                contig: record[0].to_string(),
                feature_type: "locus".to_string(),
                start,
                end,
                basis,
                strand,
                attributes,
            },
        ));
    }
    Ok(rows)
}

fn parse_coord(s: &str) -> Option<i64> {
    s.trim().parse::<i64>().ok()
}

/// Normalizer for 0-based locus tables with the given contig rule.
pub fn locus_normalizer(contig_rule: &ContigRule, organism: Organism) -> Result<Normalizer> {
    let dialect = Dialect {
        contig_rule: contig_rule.clone(),
        ..Dialect::ucsc_bed()
    };
    Normalizer::new(&dialect, organism)
}

/// Load a SINE catalog. Loci are keyed by `contig:start-end` after
/// normalization; a repeated key keeps the first row.
pub fn load_sine_loci(
    path: &Path,
    contig_rule: &ContigRule,
    organism: Organism,
) -> Result<Staged<Vec<GenomicInterval>>> {
    let normalizer = locus_normalizer(contig_rule, organism)?;
    let raw = read_bed_records(path, CoordinateBasis::ZeroBasedHalfOpen)?;
    let mut audit = raw.audit;
    let mut first_bad = raw.first_bad;
    let mut seen: HashSet<String> = HashSet::new();
    let mut loci = Vec::with_capacity(raw.value.len());

    for (row, record) in raw.value {
        match normalizer.normalize_locus(&record) {
            Ok(n) => {
                if n.clamped {
                    audit.clamped_starts += 1;
                }
                if !seen.insert(n.record.interval.feature_id.clone()) {
                    audit.duplicate_key += 1;
                    continue;
                }
                loci.push(n.record.interval);
            }
            Err(reason) => {
                audit.reject(&reason);
                first_bad.get_or_insert((row, reason));
            }
        }
    }

    ensure_not_fully_malformed(path, loci.len(), first_bad)?;
    sort_intervals(&mut loci);
    if audit.duplicate_key > 0 {
        tracing::warn!(
            organism = %organism,
            duplicates = audit.duplicate_key,
            "repeated SINE loci collapsed"
        );
    }
    tracing::info!(
        organism = %organism,
        path = %path.display(),
        loci = loci.len(),
        clamped = audit.clamped_starts,
        rejected = audit.rejected_total(),
        "SINE catalog loaded"
    );
    Ok(Staged::new(loci, audit))
}
