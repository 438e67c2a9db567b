/// Distance binning, corpus summary and the orthologue 2x2 table.
use sinelink_rs::aggregate::{bin, AsymmetryCounts, CorpusSummary};
use sinelink_rs::expression::{OrthologueRow, SineGeneLink};
use sinelink_rs::{Direction, Flag, GenomicInterval, Organism, Strand};
use std::collections::BTreeMap;

// ── helpers ──────────────────────────────────────────────────────────────────

fn link(locus: &str, gene: &str, distance: u64, direction: Direction, transcribed: bool, expressed: Flag) -> SineGeneLink {
    SineGeneLink {
        sine_locus: locus.to_string(),
        gene_id: gene.to_string(),
        distance,
        direction,
        sine_transcribed: transcribed,
        gene_expressed: expressed,
    }
}

fn downstream(distance: u64, transcribed: bool) -> SineGeneLink {
    link(&format!("chr1:{distance}"), "g", distance, Direction::Downstream, transcribed, Flag::No)
}

fn locus(start: u64) -> GenomicInterval {
    GenomicInterval {
        contig: "chr1".to_string(),
        start,
        end: start + 10,
        strand: Strand::Unknown,
        feature_id: format!("chr1:{}-{}", start, start + 10),
        source_organism: Organism::A,
    }
}

fn row(expressed_a: Flag, expressed_b: Flag, sine_a: Flag, sine_b: Flag) -> OrthologueRow {
    OrthologueRow {
        gene_a: "g".to_string(),
        gene_b: "h".to_string(),
        sine_a,
        sine_b,
        expressed_a,
        expressed_b,
    }
}

// ── binning ──────────────────────────────────────────────────────────────────

#[test]
fn distances_fall_into_floor_bins() {
    let links = [
        downstream(50, true),
        downstream(999, false),
        downstream(1000, true),
        downstream(1500, true),
    ];
    let bins = bin(&links, 1000, 2000).unwrap();
    assert_eq!(bins.len(), 2);
    assert_eq!((bins[0].lower, bins[0].upper), (0, 1000));
    assert_eq!((bins[0].total_count, bins[0].expressed_count), (2, 1));
    assert_eq!((bins[1].lower, bins[1].upper), (1000, 2000));
    assert_eq!((bins[1].total_count, bins[1].expressed_count), (2, 2));
}

#[test]
fn window_edge_is_excluded() {
    let links = [downstream(1999, false), downstream(2000, true), downstream(50_000, true)];
    let bins = bin(&links, 1000, 2000).unwrap();
    assert_eq!(bins.len(), 1);
    assert_eq!(bins[0].lower, 1000);
    assert_eq!(bins[0].total_count, 1);
}

#[test]
fn directions_are_binned_separately_upstream_first() {
    let links = [
        link("a", "g", 10, Direction::Downstream, false, Flag::No),
        link("b", "g", 10, Direction::Upstream, true, Flag::No),
        link("c", "g", 20, Direction::Upstream, false, Flag::No),
    ];
    let bins = bin(&links, 100, 1000).unwrap();
    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0].direction, Direction::Upstream);
    assert_eq!((bins[0].total_count, bins[0].expressed_count), (2, 1));
    assert_eq!(bins[1].direction, Direction::Downstream);
}

#[test]
fn bin_counts_sum_to_links_inside_the_window() {
    let links: Vec<SineGeneLink> = (0..100).map(|i| downstream(i * 137, i % 3 == 0)).collect();
    let bins = bin(&links, 500, 10_000).unwrap();
    let total: u64 = bins.iter().map(|b| b.total_count).sum();
    let inside = links.iter().filter(|l| l.distance < 10_000).count() as u64;
    assert_eq!(total, inside);
    assert!(bins.iter().all(|b| b.expressed_count <= b.total_count));
}

#[test]
fn zero_bin_width_is_an_error() {
    assert!(bin(&[downstream(1, true)], 0, 100).is_err());
}

// ── corpus summary ───────────────────────────────────────────────────────────

#[test]
fn corpus_summary_percentages() {
    let catalog = [locus(0), locus(100), locus(200), locus(300)];
    let mut sine_flags = BTreeMap::new();
    sine_flags.insert("chr1:0-10".to_string(), true);
    sine_flags.insert("chr1:100-110".to_string(), false);
    sine_flags.insert("chr1:200-210".to_string(), true);
    let links = [
        link("chr1:0-10", "g1", 500, Direction::Upstream, true, Flag::Yes),
        link("chr1:100-110", "g1", 5000, Direction::Downstream, false, Flag::Yes),
        link("chr1:200-210", "g2", 10, Direction::Downstream, true, Flag::NA),
    ];
    let s = CorpusSummary::compute(&catalog, &sine_flags, &links, 10, 1000);
    assert_eq!(s.catalog_size, 4);
    assert_eq!(s.transcribed_loci, 2);
    assert_eq!(s.pct_transcribed, 50.0);
    assert_eq!(s.linked_loci, 3);
    assert_eq!(s.within_proximity, 2);
    assert_eq!(s.genes_with_sine, 2);
    assert_eq!(s.pct_genes_with_sine, 20.0);
    assert_eq!(s.both_expressed, 1);
    assert!((s.coexpression_rate - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn empty_corpus_has_zero_rates() {
    let s = CorpusSummary::compute(&[], &BTreeMap::new(), &[], 0, 1000);
    assert_eq!(s.pct_transcribed, 0.0);
    assert_eq!(s.pct_genes_with_sine, 0.0);
    assert_eq!(s.coexpression_rate, 0.0);
}

// ── asymmetry ────────────────────────────────────────────────────────────────

#[test]
fn asymmetry_table_counts_each_pair_once() {
    let rows = [
        row(Flag::Yes, Flag::Yes, Flag::NA, Flag::NA),
        row(Flag::Yes, Flag::No, Flag::Yes, Flag::NA),
        row(Flag::Yes, Flag::No, Flag::No, Flag::NA),
        row(Flag::No, Flag::Yes, Flag::NA, Flag::Yes),
        row(Flag::No, Flag::No, Flag::NA, Flag::NA),
        row(Flag::NA, Flag::Yes, Flag::NA, Flag::NA),
    ];
    let c = AsymmetryCounts::from_rows(&rows);
    assert_eq!(c.both, 1);
    assert_eq!(c.a_only, 2);
    assert_eq!(c.a_only_with_sine, 1);
    assert_eq!(c.b_only, 2);
    assert_eq!(c.b_only_with_sine, 1);
    assert_eq!(c.neither, 1);
    assert_eq!(c.unresolved, 1);
    assert_eq!(c.total(), rows.len() as u64);
}
