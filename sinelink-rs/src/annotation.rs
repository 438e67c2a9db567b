//! Gene annotation decoding (GFF3 / GTF / BED) into canonical [`FeatureRecord`]s.
//!
//! Coordinate conventions:
//! - GTF/GFF are 1-based inclusive. Records leave here as `RawRecord`s tagged
//!   `OneBasedInclusive`; the normalizer does the single shift to 0-based,
//!   half-open `[start - 1, end)`.
//! - BED input is already 0-based half-open.

use crate::dialect::{AnnotationFormat, CoordinateBasis, Dialect};
use crate::error::{ensure_not_fully_malformed, Audit, RejectReason, Staged};
use crate::interval::{sort_intervals, FeatureRecord};
use crate::loci;
use crate::normalize::{Normalizer, RawRecord};
use crate::types::{HashMap, HashMapExt, Organism, Strand};
use anyhow::{Context, Result};
use noodles::core::Position;
use noodles::gff::feature::RecordBuf;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

/// Load the genes of one organism, normalized and sorted in resolver order.
///
/// Duplicate identifiers keep the first record; later ones are counted as
/// `duplicate_key` and logged.
pub fn load_genes(
    path: &Path,
    dialect: &Dialect,
    organism: Organism,
) -> Result<Staged<Vec<FeatureRecord>>> {
    let normalizer = Normalizer::new(dialect, organism)?;
    let raw = match dialect.format {
        AnnotationFormat::Gff3 => read_gff3(path, dialect)?,
        AnnotationFormat::Gtf => read_gtf(path, dialect)?,
        AnnotationFormat::Bed => loci::read_bed_records(path, dialect.basis)?,
    };

    let mut audit = raw.audit;
    let mut first_bad = raw.first_bad;
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut genes: Vec<FeatureRecord> = Vec::with_capacity(raw.value.len());

    for (row, record) in raw.value {
        if !dialect.keeps_feature_type(&record.feature_type) {
            continue;
        }
        match normalizer.normalize(&record) {
            Ok(n) => {
                if n.clamped {
                    audit.clamped_starts += 1;
                }
                let id = n.record.id().to_string();
                if let Some(&kept) = seen.get(&id) {
                    audit.duplicate_key += 1;
                    if genes[kept] != n.record {
                        tracing::warn!(
                            organism = %organism,
                            gene = %id,
                            row,
                            "duplicate gene id with a different record; keeping the first"
                        );
                    }
                    continue;
                }
                seen.insert(id, genes.len());
                genes.push(n.record);
            }
            Err(reason) => {
                audit.reject(&reason);
                tracing::debug!(organism = %organism, row, %reason, "annotation row rejected");
                first_bad.get_or_insert((row, reason));
            }
        }
    }

    ensure_not_fully_malformed(path, genes.len(), first_bad)?;
    genes.sort_by(|a, b| a.interval.sort_cmp(&b.interval));
    tracing::info!(
        organism = %organism,
        path = %path.display(),
        genes = genes.len(),
        rejected = audit.rejected_total(),
        "annotation loaded"
    );
    Ok(Staged::new(genes, audit))
}

/// Intervals of a gene set, in resolver order.
pub fn gene_intervals(genes: &[FeatureRecord]) -> Vec<crate::interval::GenomicInterval> {
    let mut out: Vec<_> = genes.iter().map(|g| g.interval.clone()).collect();
    sort_intervals(&mut out);
    out
}

/// Raw rows of a table, keyed by 1-based line number, plus the first
/// decode failure.
pub(crate) struct RawRows {
    pub value: Vec<(usize, RawRecord)>,
    pub audit: Audit,
    pub first_bad: Option<(usize, RejectReason)>,
}

impl RawRows {
    pub(crate) fn new() -> Self {
        Self {
            value: Vec::new(),
            audit: Audit::default(),
            first_bad: None,
        }
    }

    pub(crate) fn reject(&mut self, row: usize, reason: RejectReason) {
        self.audit.reject(&reason);
        self.first_bad.get_or_insert((row, reason));
    }
}

fn read_gff3(path: &Path, dialect: &Dialect) -> Result<RawRows> {
    use noodles::gff::directive_buf::key;

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = noodles::gff::io::Reader::new(BufReader::new(file));
    let mut rows = RawRows::new();

    for (i, result) in reader.lines().enumerate() {
        let row = i + 1;
        let line = result.with_context(|| format!("reading {}", path.display()))?;
        if let Some(directive) = line.as_directive() {
            if directive.key() == key::FASTA {
                break;
            }
            continue;
        }
        let record = match line.as_record() {
            None => continue,
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                rows.reject(row, RejectReason::Unparseable(e.to_string()));
                continue;
            }
        };
        if let Err(reason) = check_positions(record.start(), record.end()) {
            rows.reject(row, reason);
            continue;
        }
        match RecordBuf::try_from_feature_record(&record) {
            Ok(buf) => rows.value.push((row, raw_from_record_buf(&buf, dialect))),
            Err(e) => rows.reject(row, RejectReason::Unparseable(e.to_string())),
        }
    }
    Ok(rows)
}

fn read_gtf(path: &Path, dialect: &Dialect) -> Result<RawRows> {
    // noodles-gtf records convert into gff RecordBufs, so both formats share one conversion.
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut reader = noodles::gtf::io::Reader::new(BufReader::new(file));
    let mut rows = RawRows::new();

    for (i, result) in reader.lines().enumerate() {
        let row = i + 1;
        let line = result.with_context(|| format!("reading {}", path.display()))?;
        let record = match line.as_record() {
            None => continue,
            Some(Ok(r)) => r,
            Some(Err(e)) => {
                rows.reject(row, RejectReason::Unparseable(e.to_string()));
                continue;
            }
        };
        if let Err(reason) = check_positions(record.start(), record.end()) {
            rows.reject(row, reason);
            continue;
        }
        match RecordBuf::try_from_feature_record(&record) {
            Ok(buf) => rows.value.push((row, raw_from_record_buf(&buf, dialect))),
            Err(e) => rows.reject(row, RejectReason::Unparseable(e.to_string())),
        }
    }
    Ok(rows)
}

/// Start/end columns that noodles cannot read as positions (non-numeric,
/// zero or negative) are coordinate rejections, not malformed rows.
fn check_positions(
    start: io::Result<Position>,
    end: io::Result<Position>,
) -> std::result::Result<(), RejectReason> {
    match (start, end) {
        (Ok(_), Ok(_)) => Ok(()),
        (Err(e), _) => Err(RejectReason::BadCoordinate(format!("start: {e}"))),
        (_, Err(e)) => Err(RejectReason::BadCoordinate(format!("end: {e}"))),
    }
}

fn raw_from_record_buf(record: &RecordBuf, dialect: &Dialect) -> RawRecord {
    let feature_type: &[u8] = record.ty().as_ref();
    let attrs = record.attributes();
    let attributes = dialect
        .id_tags
        .iter()
        .filter_map(|tag| get_record_buf_attribute(attrs, tag.as_bytes()).map(|v| (tag.clone(), v)))
        .collect();
    RawRecord {
        contig: record.reference_sequence_name().to_string(),
        feature_type: String::from_utf8_lossy(feature_type).into_owned(),
        start: record.start().get() as i64,
        end: record.end().get() as i64,
        basis: CoordinateBasis::OneBasedInclusive,
        strand: Strand::from_char(strand_to_char(record.strand())),
        attributes,
    }
}

fn get_record_buf_attribute(
    attrs: &noodles::gff::feature::record_buf::Attributes,
    key: &[u8],
) -> Option<String> {
    let value = attrs.get(key)?;
    value.iter().next().map(|v| v.to_string())
}

fn strand_to_char(strand: noodles::gff::feature::record::Strand) -> char {
    use noodles::gff::feature::record::Strand;
    match strand {
        Strand::Forward => '+',
        Strand::Reverse => '-',
        Strand::None => '.',
        Strand::Unknown => '?',
    }
}
