//! # relgate eval
//!
//! Environment building, expression evaluation and the check engine.
//!
//! A run builds one read-only [`Environment`] from two release descriptors
//! and a list of [`DataSource`]s, then walks a tree of check files with a
//! [`CheckEngine`]. Every clause of every check step yields one
//! [`CheckResult`].
//!
//! ```rust
//! use relgate_eval::{CheckEngine, EngineOptions, EnvironmentBuilder, ReleaseDescriptor, Status};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let checks = dir.path().join("checks.yml");
//! std::fs::write(&checks, "steps:\n  - name: Release\n    condition: releases.new.release == 'ZZZ_1.4'\n").unwrap();
//!
//! let env = EnvironmentBuilder::new(
//!     ReleaseDescriptor::new("ZZZ_1.3", vec![]),
//!     ReleaseDescriptor::new("ZZZ_1.4", vec![]),
//! )
//! .build()
//! .unwrap();
//!
//! let results = CheckEngine::new(&env, EngineOptions::default()).evaluate(&checks).unwrap();
//! assert_eq!(results[0].status, Status::Ok);
//! ```

pub mod builtins;
pub mod checks;
pub mod config;
pub mod environment;
pub mod error;
pub mod expr;
pub mod release;
pub mod sources;
pub mod validate;
pub mod value;

pub use checks::{
    CheckEngine, CheckResult, CheckTree, EngineOptions, ErrorPolicy, Status, StatusRule, Step,
};
pub use config::Config;
pub use environment::{DataSource, Environment, EnvironmentBuilder, EnvironmentError};
pub use error::{CheckError, CompileError, EvalError};
pub use expr::{CompiledExpression, ExpressionAdapter};
pub use release::ReleaseDescriptor;
pub use sources::{CommitSource, FileSource};
pub use validate::{ValidationError, validate_field};
pub use value::{Function, Value};
