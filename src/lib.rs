pub mod args;
pub mod builder;
pub mod dump;
pub mod errors;
pub mod genome;
pub mod library;
pub mod lineage;
pub mod links;
pub mod nodes;
pub mod rank;
pub mod skip;
pub mod tree;
pub mod utils;

pub use builder::{BuildOptions, BuildStats, TreeBuilder};
pub use errors::{LineageError, Result, TaxoError};
pub use genome::{GenomeMap, GenomeOutcome, GenomeStore};
pub use tree::TaxonomyTree;
