//! Data sources that populate environment namespaces.

mod file;
mod git;

pub use file::FileSource;
pub use git::{CommitSource, ComponentProvenance, StoreOpener};
