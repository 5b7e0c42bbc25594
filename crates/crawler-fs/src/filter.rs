//! Include/exclude filtering on virtual paths.
//!
//! Patterns are glob-style and case sensitive. A pattern without `/` is
//! matched against the file name only; a pattern containing `/` is matched
//! against the whole virtual path, and there `*` also crosses separators.
//! Any name containing `~` is a temporary or lock file and never indexed.

use globset::{GlobBuilder, GlobMatcher};
use tracing::{trace, warn};

use crate::error::FsError;

#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    matcher: GlobMatcher,
    spans_path: bool,
}

impl Pattern {
    fn compile(source: &str) -> Result<Self, FsError> {
        let spans_path = source.contains('/');
        let glob = GlobBuilder::new(source)
            .case_insensitive(false)
            .literal_separator(!spans_path)
            .backslash_escape(true)
            .build()
            .map_err(|e| FsError::InvalidPattern {
                pattern: source.to_string(),
                reason: e.kind().to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            matcher: glob.compile_matcher(),
            spans_path,
        })
    }

    fn is_match(&self, path: &str) -> bool {
        if self.spans_path {
            self.matcher.is_match(path)
        } else {
            self.matcher.is_match(file_name(path))
        }
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_temporary(path: &str) -> bool {
    file_name(path).contains('~')
}

/// Compiled include/exclude rules for one crawl job.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PathFilter {
    /// Compile both pattern lists. Fails on the first invalid pattern.
    pub fn new(includes: &[String], excludes: &[String]) -> Result<Self, FsError> {
        Ok(Self {
            includes: compile_all(includes)?,
            excludes: compile_all(excludes)?,
        })
    }

    /// Whether a file at `virtual_path` should be indexed.
    ///
    /// Excludes win over includes; an empty include list accepts everything.
    pub fn is_indexable(&self, virtual_path: &str) -> bool {
        if is_temporary(virtual_path) {
            trace!(path = %virtual_path, "Temporary file, skipping");
            return false;
        }
        if let Some(p) = self.excludes.iter().find(|p| p.is_match(virtual_path)) {
            trace!(path = %virtual_path, pattern = %p.source, "Excluded");
            return false;
        }
        if self.includes.is_empty() {
            return true;
        }
        let included = self.includes.iter().any(|p| p.is_match(virtual_path));
        if !included {
            trace!(path = %virtual_path, "Does not match any include pattern");
        }
        included
    }

    /// Whether the crawl should descend into the directory at `virtual_path`.
    ///
    /// Include patterns describe files, so only excludes and the tilde rule
    /// apply to directories.
    pub fn is_directory_indexable(&self, virtual_path: &str) -> bool {
        !is_temporary(virtual_path) && !self.excludes.iter().any(|p| p.is_match(virtual_path))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Pattern>, FsError> {
    patterns
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| Pattern::compile(p))
        .collect()
}

/// One-shot check without a prebuilt [`PathFilter`].
///
/// Invalid patterns are logged and ignored.
pub fn is_indexable(path: &str, includes: &[String], excludes: &[String]) -> bool {
    let compile_lenient = |patterns: &[String]| -> Vec<Pattern> {
        patterns
            .iter()
            .filter(|p| !p.is_empty())
            .filter_map(|p| match Pattern::compile(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(error = %e, "Ignoring invalid pattern");
                    None
                }
            })
            .collect()
    };
    PathFilter {
        includes: compile_lenient(includes),
        excludes: compile_lenient(excludes),
    }
    .is_indexable(path)
}
