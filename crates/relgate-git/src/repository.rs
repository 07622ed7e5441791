//! [`CommitStore`] backed by the `git` command line.

use crate::resolver::Credentials;
use crate::store::{BranchRef, CommitRecord, CommitStore};
use crate::{git_capture, git_output};
use anyhow::{Context, Result, bail};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

const COMMIT_FORMAT: &str = "--format=%H%x00%P%x00%an <%ae>%x00%B%x1e";
const BATCH_SIZE: &str = "256";

/// A local repository, or a bare clone of a remote one that lives in a
/// temporary directory for as long as this handle.
pub struct GitRepository {
    location: String,
    path: PathBuf,
    _checkout: Option<TempDir>,
    credentials: Credentials,
    commits: Mutex<LruCache<String, CommitRecord>>,
}

impl std::fmt::Debug for GitRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepository")
            .field("location", &self.location)
            .field("path", &self.path)
            .finish()
    }
}

impl GitRepository {
    /// Clones `http(s)://` URLs, opens anything else as a local path.
    pub fn open(location: &str, credentials: &Credentials, cache_size: usize) -> Result<Self> {
        if is_http(location) {
            Self::clone_remote(location, credentials, cache_size)
        } else {
            Ok(Self::open_local(Path::new(location), cache_size)?.with_credentials(credentials.clone()))
        }
    }

    /// Credentials used when fetching from an http(s) remote.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn open_local(path: &Path, cache_size: usize) -> Result<Self> {
        tracing::info!(dir = %path.display(), "opening git repository");

        if !path.exists() {
            bail!("repository path {} does not exist", path.display());
        }
        git_capture(path, &["rev-parse", "--git-dir"])
            .with_context(|| format!("{} is not a git repository", path.display()))?;

        Ok(Self {
            location: path.display().to_string(),
            path: path.to_path_buf(),
            _checkout: None,
            credentials: Credentials::anonymous(),
            commits: Self::cache(cache_size),
        })
    }

    pub fn clone_remote(url: &str, credentials: &Credentials, cache_size: usize) -> Result<Self> {
        tracing::info!(url, "cloning git repository");

        let checkout = tempfile::Builder::new()
            .prefix("relgate-")
            .tempdir()
            .context("failed to create clone directory")?;
        let target = checkout.path().join("repo.git");
        let target_str = target.to_string_lossy().to_string();
        let remote = credentials.apply(url);

        let output = git_output(
            checkout.path(),
            &["clone", "--bare", "--quiet", &remote, &target_str],
        )?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git clone of {} failed: {}", url, credentials.redact(stderr.trim()));
        }

        let repo = Self {
            location: url.to_string(),
            path: target,
            _checkout: Some(checkout),
            credentials: credentials.clone(),
            commits: Self::cache(cache_size),
        };
        // the clone config must not keep the authenticated URL
        repo.set_remote_url("origin", url)?;
        Ok(repo)
    }

    fn set_remote_url(&self, remote: &str, url: &str) -> Result<()> {
        self.git(&["remote", "set-url", remote, url])
            .with_context(|| format!("failed to reset URL of {}", remote))?;
        Ok(())
    }

    fn cache(size: usize) -> Mutex<LruCache<String, CommitRecord>> {
        let size = NonZeroUsize::new(size).unwrap_or(NonZeroUsize::MIN);
        Mutex::new(LruCache::new(size))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        git_capture(&self.path, args)
    }

    fn verify(&self, rev: &str) -> Result<Option<String>> {
        let spec = format!("{}^{{commit}}", rev);
        let output = git_output(&self.path, &["rev-parse", "--verify", "--quiet", &spec])?;

        if !output.status.success() {
            return Ok(None);
        }
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!hash.is_empty()).then_some(hash))
    }

    fn has_remote(&self, remote: &str) -> Result<bool> {
        let remotes = self.git(&["remote"])?;
        Ok(remotes.lines().any(|r| r.trim() == remote))
    }

    /// What `fetch` and `ls-remote` address: the remote's URL with
    /// credentials for http(s) remotes, the remote name otherwise.
    fn remote_target(&self, remote: &str) -> Result<String> {
        if self.credentials.is_anonymous() {
            return Ok(remote.to_string());
        }
        let url = self.git(&["remote", "get-url", remote])?;
        if is_http(&url) {
            Ok(self.credentials.apply(&url))
        } else {
            Ok(remote.to_string())
        }
    }

    /// Runs a git command that talks to a remote. Errors never carry the password.
    fn git_remote(&self, args: &[&str]) -> Result<String> {
        self.git(args)
            .map_err(|e| anyhow::anyhow!(self.credentials.redact(&format!("{:#}", e))))
    }

    fn local_heads(&self) -> Result<Vec<BranchRef>> {
        let output = self.git(&[
            "for-each-ref",
            "--format=%(objectname) %(refname)",
            "refs/heads/",
        ])?;
        Ok(parse_heads(&output, ' '))
    }

    /// Loads `hash` and a batch of its ancestors into the cache.
    fn load_batch(&self, hash: &str) -> Result<CommitRecord> {
        let output = self
            .git(&["log", "-n", BATCH_SIZE, COMMIT_FORMAT, hash, "--"])
            .with_context(|| format!("failed to read commit {}", hash))?;

        let mut cache = self
            .commits
            .lock()
            .map_err(|_| anyhow::anyhow!("commit cache lock poisoned"))?;

        // `git log <hash>` lists the commit itself first
        let mut requested = None;
        for record in output.split('\x1e').filter_map(parse_commit) {
            if requested.is_none() {
                requested = Some(record.clone());
            }
            cache.put(record.hash.clone(), record);
        }

        requested.with_context(|| format!("commit {} not found in {}", hash, self.location))
    }
}

fn is_http(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

fn parse_commit(raw: &str) -> Option<CommitRecord> {
    let raw = raw.trim_start_matches('\n');
    if raw.is_empty() {
        return None;
    }

    let mut fields = raw.splitn(4, '\0');
    let hash = fields.next()?.trim().to_string();
    let parents = fields
        .next()?
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let author = fields.next()?.to_string();
    let message = fields.next().unwrap_or_default().trim_end_matches('\n').to_string();

    Some(CommitRecord {
        hash,
        message,
        parents,
        author,
    })
}

fn parse_heads(output: &str, separator: char) -> Vec<BranchRef> {
    output
        .lines()
        .filter_map(|line| line.split_once(separator))
        .filter_map(|(hash, name)| {
            name.trim().strip_prefix("refs/heads/").map(|short| BranchRef {
                name: short.to_string(),
                hash: hash.trim().to_string(),
            })
        })
        .collect()
}

impl CommitStore for GitRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn resolve_ref(&self, refname: &str) -> Result<Option<String>> {
        self.verify(refname)
    }

    fn resolve_hash(&self, rev: &str) -> Result<Option<String>> {
        if rev.len() < 4 || !rev.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        self.verify(rev)
    }

    fn commit(&self, hash: &str) -> Result<CommitRecord> {
        if let Ok(mut cache) = self.commits.lock()
            && let Some(record) = cache.get(hash)
        {
            return Ok(record.clone());
        }
        self.load_batch(hash)
    }

    /// Fetches the remote's branch heads and lists them with `ls-remote`.
    /// Without the remote, local heads are used. An unreachable remote is an
    /// error.
    fn branches(&self, remote: &str) -> Result<Vec<BranchRef>> {
        if !self.has_remote(remote)? {
            tracing::debug!(remote, "remote not configured, using local branches");
            return self.local_heads();
        }

        let target = self.remote_target(remote)?;
        let refspec = format!("+refs/heads/*:refs/remotes/{}/*", remote);
        self.git_remote(&["fetch", "--quiet", &target, &refspec])
            .with_context(|| format!("failed to fetch {} in {}", remote, self.location))?;

        let listing = self
            .git_remote(&["ls-remote", "--heads", &target])
            .with_context(|| format!("failed to list branches of {}", remote))?;
        Ok(parse_heads(&listing, '\t'))
    }

    fn merge_bases(&self, a: &str, b: &str) -> Result<Vec<String>> {
        let output = git_output(&self.path, &["merge-base", "--all", a, b])?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // exit status 1 without a message: no common ancestor
            if output.status.code() == Some(1) && stderr.trim().is_empty() {
                return Ok(Vec::new());
            }
            bail!("git merge-base {} {} failed: {}", a, b, stderr.trim());
        }

        let mut bases: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
            .collect();
        bases.sort();
        Ok(bases)
    }

    fn commit_range(&self, base: &str, head: &str) -> Result<Vec<CommitRecord>> {
        let exclude = format!("^{}", base);
        let listing = self
            .git(&["rev-list", "--topo-order", head, &exclude, "--"])
            .with_context(|| format!("failed to list commits {}..{}", base, head))?;

        listing
            .lines()
            .filter(|h| !h.is_empty())
            .map(|hash| self.commit(hash))
            .collect()
    }
}
