//! External pairwise similarity search (BLAST) with skip-if-built caching.
//!
//! This is orchestration only; nothing in the core calls it. The core
//! consumes the tabular output through [`crate::homology::read_best_hits`].

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait SimilaritySearch: Sync {
    /// Search `query` against `subject`, writing BLAST tabular rows to `out`.
    fn search(&self, query: &Path, subject: &Path, out: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlastSearch {
    pub program: String,
    pub makeblastdb: String,
    pub db_type: String,
    pub evalue: f64,
    pub threads: usize,
}

impl Default for BlastSearch {
    fn default() -> Self {
        Self {
            program: "blastp".to_string(),
            makeblastdb: "makeblastdb".to_string(),
            db_type: "prot".to_string(),
            evalue: 1e-5,
            threads: 1,
        }
    }
}

impl BlastSearch {
    fn db_marker(&self, subject: &Path) -> PathBuf {
        let ext = if self.db_type == "nucl" { "nin" } else { "pin" };
        let mut name = subject.as_os_str().to_owned();
        name.push(format!(".{ext}"));
        PathBuf::from(name)
    }

    fn ensure_db(&self, subject: &Path) -> Result<()> {
        if self.db_marker(subject).exists() {
            tracing::debug!(subject = %subject.display(), "BLAST database present");
            return Ok(());
        }
        tracing::info!(subject = %subject.display(), "building BLAST database");
        let status = Command::new(&self.makeblastdb)
            .arg("-in")
            .arg(subject)
            .args(["-dbtype", self.db_type.as_str()])
            .status()
            .with_context(|| format!("failed to run {}", self.makeblastdb))?;
        if !status.success() {
            bail!("{} exited with {} for {}", self.makeblastdb, status, subject.display());
        }
        Ok(())
    }
}

impl SimilaritySearch for BlastSearch {
    fn search(&self, query: &Path, subject: &Path, out: &Path) -> Result<()> {
        self.ensure_db(subject)?;
        tracing::info!(
            program = %self.program,
            query = %query.display(),
            subject = %subject.display(),
            "running similarity search"
        );
        let status = Command::new(&self.program)
            .arg("-query")
            .arg(query)
            .arg("-db")
            .arg(subject)
            .arg("-out")
            .arg(out)
            .args(["-outfmt", "6", "-max_target_seqs", "1"])
            .arg("-evalue")
            .arg(self.evalue.to_string())
            .arg("-num_threads")
            .arg(self.threads.max(1).to_string())
            .status()
            .with_context(|| format!("failed to run {}", self.program))?;
        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }
        Ok(())
    }
}

/// `true` when `path` exists and is non-empty.
pub fn is_built(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Run `tool` unless `out` already holds a previous non-empty result.
///
/// Returns whether the search actually ran.
pub fn cached_search(
    tool: &dyn SimilaritySearch,
    query: &Path,
    subject: &Path,
    out: &Path,
) -> Result<bool> {
    if is_built(out) {
        tracing::info!(out = %out.display(), "hit table already built; skipping search");
        return Ok(false);
    }
    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    tool.search(query, subject, out)?;
    if !is_built(out) {
        tracing::warn!(out = %out.display(), "search produced no hits");
    }
    Ok(true)
}
