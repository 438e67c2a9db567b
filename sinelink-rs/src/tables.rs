//! Output tables. Tab-delimited, header row first; column order is fixed.

use crate::aggregate::DistanceBin;
use crate::expression::{OrthologueRow, SineGeneLink};
use crate::homology::RbhPair;
use crate::types::Flag;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub const LINK_HEADER: [&str; 5] = ["sine_locus", "gene_id", "distance", "direction", "sine_transcribed"];
pub const OVERLAP_HEADER: [&str; 2] = ["sine_locus", "gene_id"];
pub const BIN_HEADER: [&str; 5] = ["bin_lower", "bin_upper", "direction", "expressed_count", "total_count"];
pub const RBH_HEADER: [&str; 2] = ["gene_a", "gene_b"];
pub const ORTHOLOGUE_HEADER: [&str; 6] = [
    "gene_a",
    "gene_b",
    "sine_a",
    "sine_b",
    "expressed_a",
    "expressed_b",
];

fn write_table<I, R>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_links(path: &Path, links: &[SineGeneLink]) -> Result<()> {
    write_table(
        path,
        &LINK_HEADER,
        links.iter().map(|l| {
            [
                l.sine_locus.clone(),
                l.gene_id.clone(),
                l.distance.to_string(),
                l.direction.to_string(),
                Flag::from_bool(l.sine_transcribed).to_string(),
            ]
        }),
    )
}

pub fn write_overlaps(path: &Path, overlaps: &BTreeMap<String, Vec<String>>) -> Result<()> {
    write_table(
        path,
        &OVERLAP_HEADER,
        overlaps
            .iter()
            .flat_map(|(locus, genes)| genes.iter().map(move |g| [locus.as_str(), g.as_str()])),
    )
}

pub fn write_bins(path: &Path, bins: &[DistanceBin]) -> Result<()> {
    write_table(
        path,
        &BIN_HEADER,
        bins.iter().map(|b| {
            [
                b.lower.to_string(),
                b.upper.to_string(),
                b.direction.to_string(),
                b.expressed_count.to_string(),
                b.total_count.to_string(),
            ]
        }),
    )
}

pub fn write_rbh(path: &Path, pairs: &[RbhPair]) -> Result<()> {
    write_table(
        path,
        &RBH_HEADER,
        pairs.iter().map(|p| [p.gene_a.as_str(), p.gene_b.as_str()]),
    )
}

pub fn write_orthologue_summary(path: &Path, rows: &[OrthologueRow]) -> Result<()> {
    write_table(
        path,
        &ORTHOLOGUE_HEADER,
        rows.iter().map(|r| {
            [
                r.gene_a.as_str(),
                r.gene_b.as_str(),
                r.sine_a.as_str(),
                r.sine_b.as_str(),
                r.expressed_a.as_str(),
                r.expressed_b.as_str(),
            ]
        }),
    )
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
