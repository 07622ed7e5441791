//! Check trees and the engine that evaluates them.
//!
//! A check tree is a YAML file with an optional skip condition and a list of
//! steps. A step either imports other check trees or holds newline separated
//! clauses, each of which produces one [`CheckResult`].

mod engine;
mod result;
mod tree;

pub use engine::{CheckEngine, EngineOptions, ErrorPolicy, StatusRule};
pub use result::{CheckResult, Status};
pub use tree::{CheckTree, Clause, Step};
