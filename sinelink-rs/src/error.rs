//! Row-level rejection taxonomy and the per-stage audit counters.
//!
//! Nothing in here is fatal. Stage-level failures (unreadable files, fully
//! malformed tables, bad configuration) travel as `anyhow::Error` with
//! context naming the file and row.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a single input row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("bad coordinate: {0}")]
    BadCoordinate(String),

    #[error("missing identifier (tried tags: {0})")]
    MissingIdentifier(String),

    #[error("unknown contig '{0}'")]
    UnknownContig(String),

    #[error("unparseable row: {0}")]
    Unparseable(String),
}

impl RejectReason {
    pub fn kind(&self) -> &'static str {
        match self {
            RejectReason::BadCoordinate(_) => "bad_coordinate",
            RejectReason::MissingIdentifier(_) => "missing_identifier",
            RejectReason::UnknownContig(_) => "unknown_contig",
            RejectReason::Unparseable(_) => "unparseable",
        }
    }
}

/// Counters every stage reports alongside its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub rejected: BTreeMap<&'static str, u64>,
    pub clamped_starts: u64,
    pub contig_mismatch: u64,
    pub join_miss: u64,
    pub arithmetic_degenerate: u64,
    pub duplicate_key: u64,
}

impl Audit {
    pub fn reject(&mut self, reason: &RejectReason) {
        *self.rejected.entry(reason.kind()).or_insert(0) += 1;
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }

    pub fn merge(&mut self, other: &Audit) {
        for (kind, n) in &other.rejected {
            *self.rejected.entry(kind).or_insert(0) += n;
        }
        self.clamped_starts += other.clamped_starts;
        self.contig_mismatch += other.contig_mismatch;
        self.join_miss += other.join_miss;
        self.arithmetic_degenerate += other.arithmetic_degenerate;
        self.duplicate_key += other.duplicate_key;
    }
}

/// A stage result paired with its audit.
#[derive(Debug, Clone, Default)]
pub struct Staged<T> {
    pub value: T,
    pub audit: Audit,
}

impl<T> Staged<T> {
    pub fn new(value: T, audit: Audit) -> Self {
        Self { value, audit }
    }
}

/// Fail the stage when a table had rows but none of them were usable.
pub(crate) fn ensure_not_fully_malformed(
    source: &std::path::Path,
    accepted: usize,
    first_bad: Option<(usize, RejectReason)>,
) -> anyhow::Result<()> {
    match first_bad {
        Some((row, reason)) if accepted == 0 => Err(anyhow::anyhow!(
            "{}: no usable rows; first bad row {}: {}",
            source.display(),
            row,
            reason
        )),
        _ => Ok(()),
    }
}
