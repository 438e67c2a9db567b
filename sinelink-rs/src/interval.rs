//! Canonical interval model.
//!
//! Every interval in this crate is 0-based, half-open `[start, end)` with
//! `start < end`, on a contig name that has already been through its
//! organism's contig rule. Only [`crate::normalize`] builds these from raw
//! input.

use crate::types::{Organism, Strand};
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
    pub feature_id: String,
    pub source_organism: Organism,
}

impl GenomicInterval {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `contig:start-end` key used to identify a locus across tables.
    pub fn locus_key(&self) -> String {
        locus_key(&self.contig, self.start, self.end)
    }

    /// Half-open overlap on the same contig. Abutting intervals do not overlap.
    pub fn overlaps(&self, other: &GenomicInterval) -> bool {
        self.contig == other.contig && self.start < other.end && other.start < self.end
    }

    /// Sort order used by the resolver: contig, start, end, then id.
    pub fn sort_cmp(&self, other: &GenomicInterval) -> Ordering {
        self.contig
            .cmp(&other.contig)
            .then(self.start.cmp(&other.start))
            .then(self.end.cmp(&other.end))
            .then_with(|| self.feature_id.cmp(&other.feature_id))
    }
}

pub fn locus_key(contig: &str, start: u64, end: u64) -> String {
    format!("{contig}:{start}-{end}")
}

/// A gene (or other annotated feature) with its canonical join key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    pub interval: GenomicInterval,
    pub feature_type: String,
}

impl FeatureRecord {
    pub fn id(&self) -> &str {
        &self.interval.feature_id
    }
}

/// Stable sort in resolver order.
pub fn sort_intervals(intervals: &mut [GenomicInterval]) {
    intervals.sort_by(|a, b| a.sort_cmp(b));
}

pub fn is_sorted(intervals: &[GenomicInterval]) -> bool {
    intervals
        .windows(2)
        .all(|w| w[0].sort_cmp(&w[1]) != Ordering::Greater)
}
