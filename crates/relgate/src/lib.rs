//! # relgate
//!
//! Gates a release by running a tree of declarative checks against data
//! gathered about the difference between two release descriptors.
//!
//! [`Gate`] wires the pieces together: it builds the environment from the
//! releases and the configured data sources, then evaluates the check tree.
//!
//! ```no_run
//! use relgate::{Config, Credentials, Gate, ReleaseDescriptor};
//! use std::path::Path;
//!
//! let old = ReleaseDescriptor::load("releases/ZZZ_1.3.yml")?;
//! let new = ReleaseDescriptor::load("releases/ZZZ_1.4.yml")?;
//!
//! let gate = Gate::new(Config::load(".")?).with_credentials(Credentials::from_env());
//! for result in gate.run(old, new, Path::new("checks.yml"), None)? {
//!     println!("{} {} {}", result.name, result.status, result.comment);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Result;
use std::path::{Path, PathBuf};

pub use relgate_eval as eval;
pub use relgate_git as git;
pub use relgate_syntax as syntax;

pub use relgate_eval::{
    CheckEngine, CheckError, CheckResult, CheckTree, CommitSource, Config, DataSource,
    EngineOptions, Environment, EnvironmentBuilder, ErrorPolicy, FileSource, ReleaseDescriptor,
    Status, StatusRule, Value,
};
pub use relgate_git::{Credentials, ProvenanceResolver, ResolveError, ResolverOptions};

/// One configured release-gate run.
#[derive(Debug, Clone)]
pub struct Gate {
    config: Config,
    credentials: Credentials,
    data: Vec<FileSource>,
    base_dir: Option<PathBuf>,
}

impl Gate {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            credentials: Credentials::anonymous(),
            data: Vec::new(),
            base_dir: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Mounts an extra data file as its own namespace.
    pub fn with_data(mut self, source: FileSource) -> Self {
        self.data.push(source);
        self
    }

    /// Directory relative import patterns are resolved against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn environment(&self, old: ReleaseDescriptor, new: ReleaseDescriptor) -> Result<Environment> {
        let mut builder = EnvironmentBuilder::new(old, new);

        if self.config.git_enabled {
            let resolver =
                ProvenanceResolver::new(self.credentials.clone(), self.config.resolver_options());
            builder = builder.with_source(Box::new(CommitSource::new(
                resolver,
                self.config.project_key.clone(),
            )));
        } else {
            tracing::debug!("git data source disabled");
        }

        for source in &self.data {
            builder = builder.with_source(Box::new(source.clone()));
        }

        Ok(builder.build()?)
    }

    /// Evaluates `root` (or `checks` when no root is given), substituting
    /// `checks` for every `-` import.
    pub fn run(
        &self,
        old: ReleaseDescriptor,
        new: ReleaseDescriptor,
        checks: &Path,
        root: Option<&Path>,
    ) -> Result<Vec<CheckResult>> {
        let env = self.environment(old, new)?;

        let options = EngineOptions {
            base_dir: self.base_dir.clone(),
            external_path: Some(checks.to_path_buf()),
            ..self.config.engine_options()
        };

        let root = root.unwrap_or(checks);
        let results = CheckEngine::new(&env, options).evaluate(root)?;
        tracing::info!(file = %root.display(), results = results.len(), "checks evaluated");
        Ok(results)
    }
}

pub mod prelude {
    pub use crate::{CheckResult, Config, Credentials, Gate, ReleaseDescriptor, Status};
}
