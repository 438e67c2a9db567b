//! Input dialects: how each organism's annotation spells coordinates,
//! identifiers and contig names.
//!
//! Dialects are selected explicitly per organism, never sniffed from the
//! data. Custom dialects can be declared in the JSON config.

use crate::error::RejectReason;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationFormat {
    Gff3,
    Gtf,
    Bed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateBasis {
    /// GFF/GTF: first base is 1, end is inclusive.
    OneBasedInclusive,
    /// BED: first base is 0, end is exclusive.
    ZeroBasedHalfOpen,
}

/// Contig renaming applied before any comparison. Every rule is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "rule", content = "value", rename_all = "snake_case")]
pub enum ContigRule {
    #[default]
    Keep,
    /// `NC_000067.7` -> `NC_000067`
    StripVersion,
    AppendSuffix(String),
    AddPrefix(String),
    StripPrefix(String),
    /// Explicit table. Names that are neither keys nor values are rejected.
    Rename(BTreeMap<String, String>),
}

impl ContigRule {
    pub fn apply(&self, contig: &str) -> Result<String, RejectReason> {
        let contig = contig.trim();
        if contig.is_empty() {
            return Err(RejectReason::UnknownContig(String::new()));
        }
        let out = match self {
            ContigRule::Keep => contig.to_string(),
            ContigRule::StripVersion => {
                let mut name = contig;
                loop {
                    let stem = strip_version(name);
                    if stem.len() == name.len() {
                        break;
                    }
                    name = stem;
                }
                name.to_string()
            }
            ContigRule::AppendSuffix(suffix) => {
                if contig.ends_with(suffix.as_str()) {
                    contig.to_string()
                } else {
                    format!("{contig}{suffix}")
                }
            }
            ContigRule::AddPrefix(prefix) => {
                if contig.starts_with(prefix.as_str()) {
                    contig.to_string()
                } else {
                    format!("{prefix}{contig}")
                }
            }
            ContigRule::StripPrefix(prefix) => {
                let mut name = contig;
                while let Some(rest) = name.strip_prefix(prefix.as_str()) {
                    if rest.is_empty() || rest.len() == name.len() {
                        break;
                    }
                    name = rest;
                }
                name.to_string()
            }
            ContigRule::Rename(table) => match table.get(contig) {
                Some(renamed) => renamed.clone(),
                None if table.values().any(|v| v == contig) => contig.to_string(),
                None => return Err(RejectReason::UnknownContig(contig.to_string())),
            },
        };
        if out.is_empty() {
            return Err(RejectReason::UnknownContig(contig.to_string()));
        }
        Ok(out)
    }
}

/// Strip a trailing `.<digits>` version suffix, if any.
pub fn strip_version(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, version))
            if !stem.is_empty()
                && !version.is_empty()
                && version.bytes().all(|b| b.is_ascii_digit()) =>
        {
            stem
        }
        _ => name,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    pub name: String,
    pub format: AnnotationFormat,
    pub basis: CoordinateBasis,
    /// Attribute tags holding the identifier, tried in order.
    #[serde(default)]
    pub id_tags: Vec<String>,
    /// Type prefixes such as `gene:`.
    #[serde(default)]
    pub id_prefixes: Vec<String>,
    /// Regex for suffix noise (versions, transcript variants).
    #[serde(default)]
    pub id_suffix_pattern: Option<String>,
    #[serde(default)]
    pub contig_rule: ContigRule,
    /// Feature types kept from the annotation; empty keeps everything.
    #[serde(default)]
    pub feature_types: Vec<String>,
}

impl Dialect {
    pub fn ensembl_gff3() -> Self {
        Self {
            name: "ensembl-gff3".to_string(),
            format: AnnotationFormat::Gff3,
            basis: CoordinateBasis::OneBasedInclusive,
            id_tags: vec!["ID".to_string(), "gene_id".to_string()],
            id_prefixes: vec!["gene:".to_string(), "transcript:".to_string()],
            id_suffix_pattern: Some(r"\.\d+$".to_string()),
            contig_rule: ContigRule::StripVersion,
            feature_types: vec!["gene".to_string()],
        }
    }

    pub fn refseq_gff3() -> Self {
        Self {
            name: "refseq-gff3".to_string(),
            format: AnnotationFormat::Gff3,
            basis: CoordinateBasis::OneBasedInclusive,
            id_tags: vec!["ID".to_string()],
            id_prefixes: vec!["gene-".to_string(), "rna-".to_string()],
            id_suffix_pattern: Some(r"(-T\d+|\.\d+)$".to_string()),
            contig_rule: ContigRule::StripVersion,
            feature_types: vec!["gene".to_string()],
        }
    }

    pub fn gencode_gtf() -> Self {
        Self {
            name: "gencode-gtf".to_string(),
            format: AnnotationFormat::Gtf,
            basis: CoordinateBasis::OneBasedInclusive,
            id_tags: vec!["gene_id".to_string()],
            id_prefixes: Vec::new(),
            id_suffix_pattern: Some(r"\.\d+$".to_string()),
            contig_rule: ContigRule::Keep,
            feature_types: vec!["gene".to_string()],
        }
    }

    pub fn ucsc_bed() -> Self {
        Self {
            name: "ucsc-bed".to_string(),
            format: AnnotationFormat::Bed,
            basis: CoordinateBasis::ZeroBasedHalfOpen,
            id_tags: vec!["name".to_string()],
            id_prefixes: Vec::new(),
            id_suffix_pattern: None,
            contig_rule: ContigRule::Keep,
            feature_types: Vec::new(),
        }
    }

    pub fn id_canon(&self) -> Result<IdCanon> {
        let suffix = self
            .id_suffix_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("dialect '{}': invalid id_suffix_pattern", self.name))?;
        Ok(IdCanon {
            prefixes: self.id_prefixes.clone(),
            suffix,
        })
    }

    pub fn keeps_feature_type(&self, ty: &str) -> bool {
        self.feature_types.is_empty() || self.feature_types.iter().any(|t| t == ty)
    }
}

/// Compiled identifier canonicalization for one dialect.
///
/// Every join key of an organism (annotation ids, hit table ids, expression
/// matrix ids) goes through the same `IdCanon`.
#[derive(Debug, Clone, Default)]
pub struct IdCanon {
    prefixes: Vec<String>,
    suffix: Option<Regex>,
}

impl IdCanon {
    pub fn new(prefixes: Vec<String>, suffix_pattern: Option<&str>) -> Result<Self> {
        let suffix = suffix_pattern.map(Regex::new).transpose()?;
        Ok(Self { prefixes, suffix })
    }

    /// Strip prefixes, then suffixes, until neither matches. Running this on
    /// its own output is a no-op. An id is never stripped down to nothing.
    pub fn canonical_id(&self, raw: &str) -> String {
        let mut id = raw.trim();
        while let Some(rest) = self.prefixes.iter().find_map(|p| id.strip_prefix(p.as_str())) {
            if rest.is_empty() || rest.len() == id.len() {
                break;
            }
            id = rest;
        }
        let mut id = id.to_string();
        if let Some(re) = &self.suffix {
            loop {
                let next = re.replace(&id, "");
                if next.is_empty() || next.as_ref() == id.as_str() {
                    break;
                }
                id = next.into_owned();
            }
        }
        id
    }
}

/// Name -> dialect lookup, seeded with the presets.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    dialects: BTreeMap<String, Dialect>,
}

impl DialectRegistry {
    pub fn with_presets() -> Self {
        let mut dialects = BTreeMap::new();
        for d in [
            Dialect::ensembl_gff3(),
            Dialect::refseq_gff3(),
            Dialect::gencode_gtf(),
            Dialect::ucsc_bed(),
        ] {
            dialects.insert(d.name.clone(), d);
        }
        Self { dialects }
    }

    /// Add or replace a dialect. Custom entries shadow presets of the same name.
    pub fn insert(&mut self, dialect: Dialect) {
        self.dialects.insert(dialect.name.clone(), dialect);
    }

    pub fn get(&self, name: &str) -> Result<&Dialect> {
        self.dialects.get(name).ok_or_else(|| {
            anyhow!(
                "unknown dialect '{}' (known: {})",
                name,
                self.dialects.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialects.keys().map(String::as_str)
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_presets()
    }
}
