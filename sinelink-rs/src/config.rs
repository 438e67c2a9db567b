use crate::dialect::{ContigRule, Dialect, DialectRegistry};
use crate::search::BlastSearch;
use crate::types::Organism;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganismConfig {
    /// Used in output file names.
    pub label: String,
    pub annotation_dialect: String,
    /// Rule that brings SINE catalog contigs into the annotation's naming.
    pub sine_contig_rule: ContigRule,
}

impl OrganismConfig {
    fn new(label: &str, annotation_dialect: &str) -> Self {
        Self {
            label: label.to_string(),
            annotation_dialect: annotation_dialect.to_string(),
            sine_contig_rule: ContigRule::Keep,
        }
    }
}

impl Default for OrganismConfig {
    fn default() -> Self {
        Self::new("A", "ensembl-gff3")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganismPair {
    pub a: OrganismConfig,
    pub b: OrganismConfig,
}

impl Default for OrganismPair {
    fn default() -> Self {
        Self {
            a: OrganismConfig::new("A", "ensembl-gff3"),
            b: OrganismConfig::new("B", "refseq-gff3"),
        }
    }
}

/// Run parameters. Every field has a default, so a config file only needs
/// the fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Mean count at or above which a gene is expressed.
    pub expression_threshold: f64,
    pub bin_width: u64,
    /// Reporting window; links at or beyond it are not binned.
    pub max_distance: u64,
    pub proximity_threshold: u64,
    pub search: BlastSearch,
    pub organisms: OrganismPair,
    /// Extra dialects; a name shadows the preset of the same name.
    pub dialects: Vec<Dialect>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            expression_threshold: 3.0,
            bin_width: 1000,
            max_distance: 10_000,
            proximity_threshold: 1000,
            search: BlastSearch::default(),
            organisms: OrganismPair::default(),
            dialects: Vec::new(),
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn registry(&self) -> DialectRegistry {
        let mut registry = DialectRegistry::with_presets();
        for d in &self.dialects {
            registry.insert(d.clone());
        }
        registry
    }

    pub fn organism(&self, organism: Organism) -> &OrganismConfig {
        match organism {
            Organism::A => &self.organisms.a,
            Organism::B => &self.organisms.b,
        }
    }

    pub fn dialect(&self, organism: Organism) -> Result<Dialect> {
        let name = &self.organism(organism).annotation_dialect;
        self.registry()
            .get(name)
            .cloned()
            .with_context(|| format!("organism {organism}"))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.expression_threshold.is_finite() || self.expression_threshold < 0.0 {
            bail!(
                "expression_threshold must be a non-negative number, got {}",
                self.expression_threshold
            );
        }
        if self.bin_width == 0 {
            bail!("bin_width must be positive");
        }
        if self.max_distance == 0 {
            bail!("max_distance must be positive");
        }
        if self.organisms.a.label == self.organisms.b.label {
            bail!("organism labels must differ (both are '{}')", self.organisms.a.label);
        }
        for organism in [Organism::A, Organism::B] {
            self.dialect(organism)?.id_canon()?;
        }
        Ok(())
    }
}
