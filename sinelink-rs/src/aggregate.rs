//! Distance binning and corpus-level summaries.

use crate::expression::{OrthologueRow, SineGeneLink};
use crate::interval::GenomicInterval;
use crate::types::{Direction, Flag, HashSet};
use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DistanceBin {
    pub lower: u64,
    pub upper: u64,
    pub direction: Direction,
    pub expressed_count: u64,
    pub total_count: u64,
}

/// Fixed-width distance bins per direction over `[0, max_distance)`.
///
/// Links at or beyond `max_distance` are left out, not folded into the last
/// bin. Only observed bins are emitted, upstream first, each by `lower`.
pub fn bin(links: &[SineGeneLink], bin_width: u64, max_distance: u64) -> Result<Vec<DistanceBin>> {
    if bin_width == 0 {
        bail!("bin width must be positive");
    }
    let mut counts: BTreeMap<(Direction, u64), (u64, u64)> = BTreeMap::new();
    for link in links.iter().filter(|l| l.distance < max_distance) {
        let lower = (link.distance / bin_width) * bin_width;
        let (expressed, total) = counts.entry((link.direction, lower)).or_insert((0, 0));
        *total += 1;
        if link.sine_transcribed {
            *expressed += 1;
        }
    }
    Ok(counts
        .into_iter()
        .map(|((direction, lower), (expressed_count, total_count))| DistanceBin {
            lower,
            upper: lower + bin_width,
            direction,
            expressed_count,
            total_count,
        })
        .collect())
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub catalog_size: u64,
    pub transcribed_loci: u64,
    pub pct_transcribed: f64,
    pub linked_loci: u64,
    pub proximity_threshold: u64,
    pub within_proximity: u64,
    pub genes_total: u64,
    pub genes_with_sine: u64,
    pub pct_genes_with_sine: f64,
    /// Links where the SINE is transcribed and the gene expressed.
    pub both_expressed: u64,
    /// `both_expressed / linked_loci`, as a fraction.
    pub coexpression_rate: f64,
}

impl CorpusSummary {
    pub fn compute(
        catalog: &[GenomicInterval],
        sine_flags: &BTreeMap<String, bool>,
        links: &[SineGeneLink],
        genes_total: u64,
        proximity_threshold: u64,
    ) -> Self {
        let catalog_size = catalog.len() as u64;
        let transcribed_loci = catalog
            .iter()
            .filter(|l| sine_flags.get(&l.feature_id).copied().unwrap_or(false))
            .count() as u64;
        let linked_loci = links.len() as u64;
        let within_proximity = links
            .iter()
            .filter(|l| l.distance < proximity_threshold)
            .count() as u64;
        let genes_with_sine = links
            .iter()
            .map(|l| l.gene_id.as_str())
            .collect::<HashSet<&str>>()
            .len() as u64;
        let both_expressed = links
            .iter()
            .filter(|l| l.sine_transcribed && l.gene_expressed.is_yes())
            .count() as u64;
        let coexpression_rate = if linked_loci == 0 {
            0.0
        } else {
            both_expressed as f64 / linked_loci as f64
        };

        Self {
            catalog_size,
            transcribed_loci,
            pct_transcribed: percent(transcribed_loci, catalog_size),
            linked_loci,
            proximity_threshold,
            within_proximity,
            genes_total,
            genes_with_sine,
            pct_genes_with_sine: percent(genes_with_sine, genes_total),
            both_expressed,
            coexpression_rate,
        }
    }
}

/// 2x2 expression table over orthologue pairs. `NA` counts as not expressed
/// in the table and separately in `unresolved`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AsymmetryCounts {
    pub a_only: u64,
    pub b_only: u64,
    pub both: u64,
    pub neither: u64,
    pub unresolved: u64,
    /// Asymmetric pairs whose expressed side has a transcribed SINE nearby.
    pub a_only_with_sine: u64,
    pub b_only_with_sine: u64,
}

impl AsymmetryCounts {
    pub fn from_rows(rows: &[OrthologueRow]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            if row.expressed_a == Flag::NA || row.expressed_b == Flag::NA {
                counts.unresolved += 1;
            }
            match (row.expressed_a.is_yes(), row.expressed_b.is_yes()) {
                (true, true) => counts.both += 1,
                (false, false) => counts.neither += 1,
                (true, false) => {
                    counts.a_only += 1;
                    if row.sine_a.is_yes() {
                        counts.a_only_with_sine += 1;
                    }
                }
                (false, true) => {
                    counts.b_only += 1;
                    if row.sine_b.is_yes() {
                        counts.b_only_with_sine += 1;
                    }
                }
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.a_only + self.b_only + self.both + self.neither
    }
}
