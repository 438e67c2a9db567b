//! sinelink-rs: link SINE loci to their closest genes and compare
//! expression asymmetry across reciprocal-best-hit orthologues.
//!
//! # Library usage
//!
//! ```no_run
//! use sinelink_rs::dialect::DialectRegistry;
//! use sinelink_rs::resolver;
//! use sinelink_rs::types::Organism;
//!
//! # fn main() -> anyhow::Result<()> {
//! let registry = DialectRegistry::with_presets();
//! let dialect = registry.get("ensembl-gff3")?;
//! // let genes = sinelink_rs::annotation::load_genes(path, dialect, Organism::A)?;
//! // let loci = sinelink_rs::loci::load_sine_loci(bed, &rule, Organism::A)?;
//! // let closest = resolver::closest(&loci.value, &sinelink_rs::annotation::gene_intervals(&genes.value));
//! # let _ = (dialect, Organism::A);
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod annotation;
pub mod cli;
pub mod config;
pub mod dialect;
pub mod error;
pub mod expression;
pub mod homology;
pub mod interval;
pub mod loci;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod search;
pub mod tables;
pub mod types;

// Flat re-exports for the most commonly used types.
pub use dialect::{ContigRule, Dialect, DialectRegistry};
pub use error::{Audit, RejectReason, Staged};
pub use interval::{FeatureRecord, GenomicInterval};
pub use resolver::ClosestHit;
pub use types::{Direction, Flag, Organism, Strand};
