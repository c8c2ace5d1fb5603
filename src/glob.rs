// src/glob.rs

//! Declarative file selection.
//!
//! A [`GlobPattern`] is one include expression plus an ordered list of exclude
//! expressions. Supported syntax:
//!
//! - `*` matches within a single path segment
//! - `**` matches across directory boundaries
//! - `{a,b}` alternation, also accepted in the `{a|b}` and `+(a|b)` spellings
//! - excludes are separate expressions and always win over the include
//!
//! Resolution walks the filesystem under the pattern's literal base directory
//! and returns matching files in lexicographic path order, so downstream
//! transform output is reproducible.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{BuildpipeError, Result};
use crate::fs::FileSystem;
use crate::record::FileRecord;

/// One include expression plus its exclusions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobPattern {
    include: String,
    excludes: Vec<String>,
}

impl GlobPattern {
    pub fn new(include: impl Into<String>, excludes: Vec<String>) -> Self {
        Self {
            include: include.into(),
            excludes,
        }
    }

    pub fn include(&self) -> &str {
        &self.include
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// The literal directory prefix of the include expression, i.e. the
    /// segments before the first one containing glob metacharacters.
    ///
    /// `app/styles/**/*.style` -> `app/styles`; `*.html` -> `` (the root).
    pub fn base(&self) -> PathBuf {
        let mut base = PathBuf::new();
        for segment in self.include.split('/') {
            if segment.contains(['*', '?', '[', '{', '(']) {
                break;
            }
            base.push(segment);
        }
        // A pattern with no metacharacters names a single file; its base is
        // the containing directory.
        if base.as_os_str() == Path::new(&self.include).as_os_str() {
            base.pop();
        }
        base
    }

    /// Compile include and excludes, failing with `PatternError` on malformed
    /// expressions.
    pub fn compile(&self) -> Result<CompiledPattern> {
        let include = build_globset(std::slice::from_ref(&self.include))?;
        let exclude = if self.excludes.is_empty() {
            None
        } else {
            Some(build_globset(&self.excludes)?)
        };
        Ok(CompiledPattern { include, exclude })
    }
}

/// Compiled matcher for a [`GlobPattern`]. Paths are matched relative to the
/// project root, with forward slashes.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    include: GlobSet,
    exclude: Option<GlobSet>,
}

impl CompiledPattern {
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.include.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build a `GlobSet` from pattern strings, normalizing alternation spellings
/// first. `*` does not cross `/`; `**` does.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let normalized = normalize_alternation(pat);
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .build()
            .map_err(|err| BuildpipeError::PatternError {
                pattern: pat.clone(),
                reason: err.to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| BuildpipeError::PatternError {
        pattern: patterns.join(", "),
        reason: err.to_string(),
    })
}

/// Rewrite `+(a|b)` groups and `{a|b}` pipes into the `{a,b}` form the glob
/// compiler understands. Unbalanced groups are left untouched and rejected by
/// the compiler.
pub fn normalize_alternation(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '+' if chars.peek() == Some(&'(') => {
                chars.next();
                let mut inner = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == ')' {
                        closed = true;
                        break;
                    }
                    inner.push(n);
                }
                if closed {
                    out.push('{');
                    out.push_str(&inner.replace('|', ","));
                    out.push('}');
                } else {
                    out.push_str("+(");
                    out.push_str(&inner);
                }
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(n);
                }
                out.push('{');
                out.push_str(&inner.replace('|', ","));
                if closed {
                    out.push('}');
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Resolve a pattern against the tree under `root` into ordered records.
///
/// Matching is evaluated on root-relative paths; record paths are stored
/// relative to the pattern base. Zero matches is an empty list, not an error.
pub fn resolve(pattern: &GlobPattern, fs: &dyn FileSystem, root: &Path) -> Result<Vec<FileRecord>> {
    let compiled = pattern.compile()?;
    let base = pattern.base();
    let walk_root = root.join(&base);

    if !fs.is_dir(&walk_root) {
        return Ok(Vec::new());
    }

    let mut matched: Vec<(String, PathBuf)> = Vec::new();
    let mut stack = vec![walk_root];

    while let Some(dir) = stack.pop() {
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    if compiled.matches(&rel_str) {
                        let record_rel = rel
                            .strip_prefix(&base)
                            .unwrap_or(rel)
                            .to_string_lossy()
                            .replace('\\', "/");
                        matched.push((record_rel, path));
                    }
                }
            }
        }
    }

    matched.sort_by(|a, b| a.0.cmp(&b.0));

    let mut records = Vec::with_capacity(matched.len());
    for (record_rel, path) in matched {
        let content = fs.read(&path)?;
        records.push(FileRecord::new(record_rel, content));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plus_paren_alternation() {
        assert_eq!(
            normalize_alternation("app/images/**/*.+(png|jpg|svg)"),
            "app/images/**/*.{png,jpg,svg}"
        );
    }

    #[test]
    fn normalizes_pipes_inside_braces() {
        assert_eq!(normalize_alternation("*.{style|styl}"), "*.{style,styl}");
        assert_eq!(normalize_alternation("*.{css,js}"), "*.{css,js}");
    }

    #[test]
    fn leaves_plain_patterns_alone() {
        assert_eq!(normalize_alternation("src/**/*.rs"), "src/**/*.rs");
    }

    #[test]
    fn base_stops_at_first_meta_segment() {
        assert_eq!(
            GlobPattern::new("app/styles/**/*.style", vec![]).base(),
            PathBuf::from("app/styles")
        );
        assert_eq!(GlobPattern::new("*.html", vec![]).base(), PathBuf::new());
        assert_eq!(
            GlobPattern::new("app/*.html", vec![]).base(),
            PathBuf::from("app")
        );
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let compiled = GlobPattern::new("app/*.html", vec![]).compile().unwrap();
        assert!(compiled.matches("app/index.html"));
        assert!(!compiled.matches("app/sub/index.html"));
    }

    #[test]
    fn double_star_crosses_directories() {
        let compiled = GlobPattern::new("app/**/*.js", vec![]).compile().unwrap();
        assert!(compiled.matches("app/main.js"));
        assert!(compiled.matches("app/js/vendor/lib.js"));
    }

    #[test]
    fn malformed_pattern_is_a_pattern_error() {
        let err = GlobPattern::new("app/[unclosed", vec![]).compile().unwrap_err();
        assert!(matches!(err, BuildpipeError::PatternError { .. }));
    }
}
