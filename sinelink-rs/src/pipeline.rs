//! Stage driver: per-organism stages in parallel, a barrier, then the
//! cross-organism orthologue stage and the report files.

use crate::aggregate::{self, AsymmetryCounts, CorpusSummary, DistanceBin};
use crate::annotation::{self, gene_intervals};
use crate::config::PipelineConfig;
use crate::error::Audit;
use crate::expression::{
    self, build_orthologue_summary, compute_expression_flags, gene_sine_flags,
    join_sine_expression, ExpressionFlag, OrthologueRow, SineGeneLink,
};
use crate::homology::{read_best_hits, reciprocal_best_hits, HitDirection, RbhSet};
use crate::loci;
use crate::resolver;
use crate::search::{cached_search, SimilaritySearch};
use crate::tables;
use crate::types::{Flag, Organism};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct OrganismInputs {
    pub annotation: PathBuf,
    pub sines: PathBuf,
    pub sine_flags: PathBuf,
    pub expression: PathBuf,
}

#[derive(Debug, Clone)]
pub enum HitSource {
    /// Precomputed BLAST tables.
    Tables { a_to_b: PathBuf, b_to_a: PathBuf },
    /// Run the search from protein FASTA; results are cached at the out paths.
    Search {
        proteins_a: PathBuf,
        proteins_b: PathBuf,
        a_to_b: PathBuf,
        b_to_a: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct Inputs {
    pub a: OrganismInputs,
    pub b: OrganismInputs,
    pub hits: HitSource,
}

impl Inputs {
    fn organism(&self, organism: Organism) -> &OrganismInputs {
        match organism {
            Organism::A => &self.a,
            Organism::B => &self.b,
        }
    }
}

/// Everything computed for one organism before the barrier.
#[derive(Debug, Clone)]
pub struct OrganismResult {
    pub organism: Organism,
    pub label: String,
    pub genes_total: u64,
    pub overlaps: BTreeMap<String, Vec<String>>,
    pub links: Vec<SineGeneLink>,
    pub expr_flags: BTreeMap<String, ExpressionFlag>,
    pub gene_sine: BTreeMap<String, Flag>,
    pub bins: Vec<DistanceBin>,
    pub summary: CorpusSummary,
    pub audit: Audit,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganismReport {
    pub label: String,
    pub summary: CorpusSummary,
    pub audit: Audit,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub organisms: BTreeMap<String, OrganismReport>,
    pub rbh_pairs: u64,
    pub asymmetry: AsymmetryCounts,
    pub homology_audit: Audit,
}

pub fn run_organism(
    inputs: &OrganismInputs,
    config: &PipelineConfig,
    organism: Organism,
) -> Result<OrganismResult> {
    let org_config = config.organism(organism);
    let dialect = config.dialect(organism)?;
    let mut audit = Audit::default();

    let genes = annotation::load_genes(&inputs.annotation, &dialect, organism)?;
    audit.merge(&genes.audit);
    let loci = loci::load_sine_loci(&inputs.sines, &org_config.sine_contig_rule, organism)?;
    audit.merge(&loci.audit);
    let sine_flags =
        expression::read_sine_flags(&inputs.sine_flags, &org_config.sine_contig_rule, organism)?;
    audit.merge(&sine_flags.audit);
    let matrix = expression::read_expression_matrix(&inputs.expression, &dialect.id_canon()?)?;
    audit.merge(&matrix.audit);

    let refs = gene_intervals(&genes.value);
    let overlaps = resolver::overlaps(&loci.value, &refs);
    let closest = resolver::closest(&loci.value, &refs);
    // both calls see the same contig sets; count the mismatch once
    audit.merge(&closest.audit);
    if closest.audit.contig_mismatch > 0 {
        tracing::warn!(
            organism = %organism,
            excluded = closest.audit.contig_mismatch,
            "intervals on contigs missing from the other set were not compared"
        );
    }

    let expr_flags = compute_expression_flags(&matrix.value, config.expression_threshold);
    audit.merge(&expr_flags.audit);
    let links = join_sine_expression(&closest.value, &sine_flags.value, &expr_flags.value);
    audit.merge(&links.audit);

    let bins = aggregate::bin(&links.value, config.bin_width, config.max_distance)?;
    let gene_sine = gene_sine_flags(&links.value, config.max_distance);
    let summary = CorpusSummary::compute(
        &loci.value,
        &sine_flags.value,
        &links.value,
        genes.value.len() as u64,
        config.proximity_threshold,
    );

    tracing::info!(
        organism = %organism,
        loci = summary.catalog_size,
        linked = summary.linked_loci,
        overlapping = overlaps.value.len(),
        pct_transcribed = %format!("{:.2}", summary.pct_transcribed),
        coexpression_rate = %format!("{:.4}", summary.coexpression_rate),
        rejected = audit.rejected_total(),
        "organism stage complete"
    );

    Ok(OrganismResult {
        organism,
        label: org_config.label.clone(),
        genes_total: genes.value.len() as u64,
        overlaps: overlaps.value,
        links: links.value,
        expr_flags: expr_flags.value,
        gene_sine,
        bins,
        summary,
        audit,
    })
}

fn resolve_hit_tables(hits: &HitSource, search: &dyn SimilaritySearch) -> Result<(PathBuf, PathBuf)> {
    match hits {
        HitSource::Tables { a_to_b, b_to_a } => Ok((a_to_b.clone(), b_to_a.clone())),
        HitSource::Search {
            proteins_a,
            proteins_b,
            a_to_b,
            b_to_a,
        } => {
            let (ab, ba) = rayon::join(
                || cached_search(search, proteins_a, proteins_b, a_to_b),
                || cached_search(search, proteins_b, proteins_a, b_to_a),
            );
            ab.context("A -> B search")?;
            ba.context("B -> A search")?;
            Ok((a_to_b.clone(), b_to_a.clone()))
        }
    }
}

/// Orthologue stage. Needs both organisms finished.
pub fn run_homology(
    hit_tables: (&Path, &Path),
    config: &PipelineConfig,
    a: &OrganismResult,
    b: &OrganismResult,
) -> Result<(RbhSet, Vec<OrthologueRow>, Audit)> {
    let canon_a = config.dialect(Organism::A)?.id_canon()?;
    let canon_b = config.dialect(Organism::B)?.id_canon()?;
    let mut audit = Audit::default();

    let forward = read_best_hits(hit_tables.0, HitDirection::AtoB, &canon_a, &canon_b)?;
    audit.merge(&forward.audit);
    let backward = read_best_hits(hit_tables.1, HitDirection::BtoA, &canon_b, &canon_a)?;
    audit.merge(&backward.audit);

    let rbh = RbhSet::new(reciprocal_best_hits(&forward.value, &backward.value));
    let rows = build_orthologue_summary(
        rbh.pairs(),
        &a.gene_sine,
        &b.gene_sine,
        &a.expr_flags,
        &b.expr_flags,
    );
    audit.merge(&rows.audit);
    tracing::info!(rbh_pairs = rbh.len(), join_miss = rows.audit.join_miss, "orthologue stage complete");
    Ok((rbh, rows.value, audit))
}

pub fn run(
    inputs: &Inputs,
    config: &PipelineConfig,
    search: &dyn SimilaritySearch,
    out_dir: &Path,
) -> Result<Report> {
    config.validate()?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {}", out_dir.display()))?;

    // the searches only depend on the protein files, so they overlap with
    // the per-organism stages
    let (organisms, hit_tables) = rayon::join(
        || {
            rayon::join(
                || run_organism(inputs.organism(Organism::A), config, Organism::A),
                || run_organism(inputs.organism(Organism::B), config, Organism::B),
            )
        },
        || resolve_hit_tables(&inputs.hits, search),
    );
    let a = organisms.0.context("organism A")?;
    let b = organisms.1.context("organism B")?;
    let (ab_path, ba_path) = hit_tables?;

    let (rbh, rows, homology_audit) = run_homology((&ab_path, &ba_path), config, &a, &b)?;
    let asymmetry = AsymmetryCounts::from_rows(&rows);

    for result in [&a, &b] {
        write_organism_tables(out_dir, result)?;
    }
    tables::write_rbh(&out_dir.join("rbh.tsv"), rbh.pairs())?;
    tables::write_orthologue_summary(&out_dir.join("orthologue_summary.tsv"), &rows)?;

    let organisms = [&a, &b]
        .into_iter()
        .map(|r| {
            (
                r.label.clone(),
                OrganismReport {
                    label: r.label.clone(),
                    summary: r.summary.clone(),
                    audit: r.audit.clone(),
                },
            )
        })
        .collect();
    let report = Report {
        organisms,
        rbh_pairs: rbh.len() as u64,
        asymmetry,
        homology_audit,
    };
    tables::write_json(&out_dir.join("summary.json"), &report)?;
    Ok(report)
}

fn write_organism_tables(out_dir: &Path, result: &OrganismResult) -> Result<()> {
    let label = &result.label;
    tables::write_links(&out_dir.join(format!("{label}.sine_gene_links.tsv")), &result.links)?;
    tables::write_overlaps(&out_dir.join(format!("{label}.sine_overlaps.tsv")), &result.overlaps)?;
    tables::write_bins(&out_dir.join(format!("{label}.distance_bins.tsv")), &result.bins)?;
    tracing::debug!(organism = %result.organism, genes = result.genes_total, "tables written");
    Ok(())
}
