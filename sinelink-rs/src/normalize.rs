//! Raw record -> canonical record.
//!
//! A [`RawRecord`] carries its own coordinate basis; [`GenomicInterval`] has
//! none. The basis shift therefore happens exactly once, here, and a
//! canonical record can only re-enter as `ZeroBasedHalfOpen`.

use crate::dialect::{CoordinateBasis, Dialect, IdCanon};
use crate::error::RejectReason;
use crate::interval::{FeatureRecord, GenomicInterval};
use crate::types::{Organism, Strand};
use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub contig: String,
    pub feature_type: String,
    pub start: i64,
    pub end: i64,
    pub basis: CoordinateBasis,
    pub strand: Strand,
    pub attributes: Vec<(String, String)>,
}

impl RawRecord {
    pub fn attribute(&self, tag: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Re-wrap a canonical record. The result is always `ZeroBasedHalfOpen`.
    pub fn from_canonical(record: &FeatureRecord, id_tag: &str) -> Self {
        let iv = &record.interval;
        Self {
            contig: iv.contig.clone(),
            feature_type: record.feature_type.clone(),
            start: iv.start as i64,
            end: iv.end as i64,
            basis: CoordinateBasis::ZeroBasedHalfOpen,
            strand: iv.strand,
            attributes: vec![(id_tag.to_string(), iv.feature_id.clone())],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub record: FeatureRecord,
    /// The raw start was negative and got clamped to 0.
    pub clamped: bool,
}

/// Normalizer bound to one organism and one dialect.
#[derive(Debug, Clone)]
pub struct Normalizer {
    dialect: Dialect,
    canon: IdCanon,
    organism: Organism,
}

impl Normalizer {
    pub fn new(dialect: &Dialect, organism: Organism) -> Result<Self> {
        Ok(Self {
            canon: dialect.id_canon()?,
            dialect: dialect.clone(),
            organism,
        })
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn organism(&self) -> Organism {
        self.organism
    }

    pub fn canon(&self) -> &IdCanon {
        &self.canon
    }

    /// Normalize an annotated feature; the id comes from the dialect's tags.
    pub fn normalize(&self, raw: &RawRecord) -> Result<Normalized, RejectReason> {
        let (contig, start, end, clamped) = self.coordinates(raw)?;
        let raw_id = self
            .dialect
            .id_tags
            .iter()
            .filter_map(|tag| raw.attribute(tag))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .ok_or_else(|| RejectReason::MissingIdentifier(self.dialect.id_tags.join(",")))?;
        let feature_id = self.canon.canonical_id(raw_id);
        Ok(self.build(raw, contig, start, end, feature_id, clamped))
    }

    /// Normalize an anonymous locus; its id is the `contig:start-end` key.
    pub fn normalize_locus(&self, raw: &RawRecord) -> Result<Normalized, RejectReason> {
        let (contig, start, end, clamped) = self.coordinates(raw)?;
        let feature_id = crate::interval::locus_key(&contig, start, end);
        Ok(self.build(raw, contig, start, end, feature_id, clamped))
    }

    fn coordinates(&self, raw: &RawRecord) -> Result<(String, u64, u64, bool), RejectReason> {
        let start = match raw.basis {
            CoordinateBasis::OneBasedInclusive => raw.start.saturating_sub(1),
            CoordinateBasis::ZeroBasedHalfOpen => raw.start,
        };
        let clamped = start < 0;
        let start = start.max(0);
        if raw.end <= start {
            return Err(RejectReason::BadCoordinate(format!(
                "end {} not after start {}",
                raw.end, start
            )));
        }
        let contig = self.dialect.contig_rule.apply(&raw.contig)?;
        Ok((contig, start as u64, raw.end as u64, clamped))
    }

    fn build(
        &self,
        raw: &RawRecord,
        contig: String,
        start: u64,
        end: u64,
        feature_id: String,
        clamped: bool,
    ) -> Normalized {
        Normalized {
            record: FeatureRecord {
                interval: GenomicInterval {
                    contig,
                    start,
                    end,
                    strand: raw.strand,
                    feature_id,
                    source_organism: self.organism,
                },
                feature_type: raw.feature_type.clone(),
            },
            clamped,
        }
    }
}
