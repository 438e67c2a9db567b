use crate::config::PipelineConfig;
use crate::pipeline::{HitSource, Inputs, OrganismInputs};
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sinelink-rs",
    about = "Link SINE loci to nearby genes and compare expression across orthologues",
    version
)]
pub struct Args {
    /// Gene annotation for organism A (GFF3/GTF/BED, per dialect)
    #[arg(long = "annotation-a", value_name = "FILE")]
    pub annotation_a: PathBuf,

    /// Gene annotation for organism B
    #[arg(long = "annotation-b", value_name = "FILE")]
    pub annotation_b: PathBuf,

    /// SINE locus catalog for organism A (BED)
    #[arg(long = "sines-a", value_name = "BED")]
    pub sines_a: PathBuf,

    /// SINE locus catalog for organism B (BED)
    #[arg(long = "sines-b", value_name = "BED")]
    pub sines_b: PathBuf,

    /// Per-locus transcription flags for organism A
    #[arg(long = "sine-flags-a", value_name = "TSV")]
    pub sine_flags_a: PathBuf,

    /// Per-locus transcription flags for organism B
    #[arg(long = "sine-flags-b", value_name = "TSV")]
    pub sine_flags_b: PathBuf,

    /// Gene expression count matrix for organism A
    #[arg(long = "expression-a", value_name = "TSV")]
    pub expression_a: PathBuf,

    /// Gene expression count matrix for organism B
    #[arg(long = "expression-b", value_name = "TSV")]
    pub expression_b: PathBuf,

    /// A-vs-B best-hit table (BLAST tabular); with --proteins-*, where to cache it
    #[arg(long = "hits-ab", value_name = "TSV")]
    pub hits_ab: Option<PathBuf>,

    /// B-vs-A best-hit table; with --proteins-*, where to cache it
    #[arg(long = "hits-ba", value_name = "TSV")]
    pub hits_ba: Option<PathBuf>,

    /// Protein FASTA for organism A; runs the similarity search
    #[arg(long = "proteins-a", value_name = "FASTA", requires = "proteins_b")]
    pub proteins_a: Option<PathBuf>,

    /// Protein FASTA for organism B
    #[arg(long = "proteins-b", value_name = "FASTA", requires = "proteins_a")]
    pub proteins_b: Option<PathBuf>,

    /// Output directory
    #[arg(short = 'o', long = "out-dir", value_name = "DIR")]
    pub out_dir: PathBuf,

    /// JSON run configuration
    #[arg(short = 'c', long = "config", value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Annotation dialect for organism A (overrides config)
    #[arg(long = "dialect-a", value_name = "NAME")]
    pub dialect_a: Option<String>,

    /// Annotation dialect for organism B (overrides config)
    #[arg(long = "dialect-b", value_name = "NAME")]
    pub dialect_b: Option<String>,

    /// Mean count at or above which a gene is expressed
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Distance bin width in bp
    #[arg(long = "bin-width")]
    pub bin_width: Option<u64>,

    /// Links at or beyond this distance are not binned
    #[arg(long = "max-distance")]
    pub max_distance: Option<u64>,

    /// Number of threads (CPUs) to use
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    pub threads: u8,

    /// Set logging level to WARN
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(name) = &self.dialect_a {
            config.organisms.a.annotation_dialect = name.clone();
        }
        if let Some(name) = &self.dialect_b {
            config.organisms.b.annotation_dialect = name.clone();
        }
        if let Some(t) = self.threshold {
            config.expression_threshold = t;
        }
        if let Some(w) = self.bin_width {
            config.bin_width = w;
        }
        if let Some(d) = self.max_distance {
            config.max_distance = d;
        }
        config.search.threads = usize::from(self.threads.max(1));
        config.validate()?;
        Ok(config)
    }

    pub fn inputs(&self) -> Result<Inputs> {
        let hits = match (&self.proteins_a, &self.proteins_b) {
            (Some(proteins_a), Some(proteins_b)) => {
                let search_dir = self.out_dir.join("search");
                HitSource::Search {
                    proteins_a: proteins_a.clone(),
                    proteins_b: proteins_b.clone(),
                    a_to_b: self
                        .hits_ab
                        .clone()
                        .unwrap_or_else(|| search_dir.join("a_vs_b.tsv")),
                    b_to_a: self
                        .hits_ba
                        .clone()
                        .unwrap_or_else(|| search_dir.join("b_vs_a.tsv")),
                }
            }
            _ => match (&self.hits_ab, &self.hits_ba) {
                (Some(ab), Some(ba)) => HitSource::Tables {
                    a_to_b: ab.clone(),
                    b_to_a: ba.clone(),
                },
                _ => bail!("need both --hits-ab and --hits-ba, or both --proteins-a and --proteins-b"),
            },
        };
        Ok(Inputs {
            a: OrganismInputs {
                annotation: self.annotation_a.clone(),
                sines: self.sines_a.clone(),
                sine_flags: self.sine_flags_a.clone(),
                expression: self.expression_a.clone(),
            },
            b: OrganismInputs {
                annotation: self.annotation_b.clone(),
                sines: self.sines_b.clone(),
                sine_flags: self.sine_flags_b.clone(),
                expression: self.expression_b.clone(),
            },
            hits,
        })
    }
}
