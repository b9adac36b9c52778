//! Pattern-based file exclusion using glob rules
//!
//! Every producer filters paths through a [`FileExclusionManager`] before
//! they enter the pending-work list. Rules are matched case-insensitively,
//! each against every path component and against the full root-relative
//! path, so a bare name like `tmp` excludes any file under a `tmp`
//! directory while `*.log` excludes by extension anywhere in the tree.

use crate::error::SyncError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Immutable, compiled set of exclusion rules
#[derive(Debug)]
pub struct FileExclusionManager {
	rules: Vec<String>,
	glob_set: GlobSet,
}

impl FileExclusionManager {
	/// Compile an ordered list of glob rules.
	pub fn new(rules: Vec<String>) -> Result<Self, SyncError> {
		let glob_set = build_glob_set(&rules)?;
		Ok(FileExclusionManager { rules, glob_set })
	}

	/// Manager with no rules; excludes nothing.
	pub fn empty() -> Self {
		FileExclusionManager { rules: Vec::new(), glob_set: GlobSet::empty() }
	}

	/// Load rules from a file: one glob per line, blank lines and `#`
	/// comment lines ignored.
	pub async fn from_file(path: &Path) -> Result<Self, SyncError> {
		let contents = tokio::fs::read_to_string(path).await?;
		let rules = contents
			.lines()
			.map(str::trim)
			.filter(|line| !line.is_empty() && !line.starts_with('#'))
			.map(String::from)
			.collect();
		Self::new(rules)
	}

	/// Check whether a path is excluded by any rule.
	///
	/// `path` should be relative to its watch root; a rule matches if it
	/// matches any single path component or the path as a whole.
	pub fn is_excluded(&self, path: &Path) -> bool {
		if self.rules.is_empty() {
			return false;
		}
		if self.glob_set.is_match(path) {
			return true;
		}
		path.components().any(|c| self.glob_set.is_match(Path::new(c.as_os_str())))
	}

	/// The rule strings this manager was built from, in order.
	pub fn rules(&self) -> &[String] {
		&self.rules
	}
}

/// Build a case-insensitive GlobSet from rule strings
fn build_glob_set(rules: &[String]) -> Result<GlobSet, SyncError> {
	let mut builder = GlobSetBuilder::new();

	for rule in rules {
		let glob = GlobBuilder::new(rule)
			.case_insensitive(true)
			.build()
			.map_err(|e| SyncError::InvalidConfig { message: format!("exclusion rule {}: {}", rule, e) })?;
		builder.add(glob);
	}

	builder
		.build()
		.map_err(|e| SyncError::InvalidConfig { message: format!("exclusion rules: {}", e) })
}


// vim: ts=4
