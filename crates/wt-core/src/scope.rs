//! Scoped target resolution
//!
//! A target is `[scope:]identifier`. The scope is resolved against the
//! registry exactly once, first as a repository name and then as a label,
//! producing a [`ScopeMatch`] that callers branch on instead of
//! re-inspecting the string.

use std::collections::HashSet;
use std::fmt;

use crate::error::{WtError, WtResult};
use crate::registry::{Registry, Repository};

/// A parsed `[scope:]identifier` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedTarget {
    pub scope: Option<String>,
    pub identifier: String,
}

impl ScopedTarget {
    /// Split on the first `:`; a colon at position 0 means "no scope".
    pub fn parse(target: &str) -> Self {
        match target.find(':') {
            Some(idx) if idx > 0 => Self {
                scope: Some(target[..idx].to_string()),
                identifier: target[idx + 1..].to_string(),
            },
            _ => Self {
                scope: None,
                identifier: target.to_string(),
            },
        }
    }
}

impl fmt::Display for ScopedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", scope, self.identifier),
            None => write!(f, "{}", self.identifier),
        }
    }
}

/// Outcome of resolving a scope token against the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatch<'a> {
    /// Exact repository name; always exactly one repository
    Name(&'a Repository),
    /// Label shared by one or more repositories
    Label(Vec<&'a Repository>),
    NotFound,
}

/// Resolve a scope token: name first, label only if no name matches
pub fn match_scope<'a>(registry: &'a Registry, scope: &str) -> ScopeMatch<'a> {
    if let Ok(repo) = registry.find_by_name(scope) {
        return ScopeMatch::Name(repo);
    }
    let labelled = registry.find_by_label(scope);
    if labelled.is_empty() {
        ScopeMatch::NotFound
    } else {
        ScopeMatch::Label(labelled)
    }
}

/// A target resolved to concrete repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// The scope token as given, if any
    pub scope: Option<String>,
    /// Candidate repositories, deduplicated by path
    pub repos: Vec<Repository>,
    pub identifier: String,
    pub matched_by_label: bool,
}

impl ResolvedTarget {
    /// True when the user named a scope explicitly
    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }

    /// Narrow per-repository hits for this target down to the ones to act on.
    ///
    /// No hits is a "not found" error. Hits in several repositories are only
    /// accepted when the user asked for that fan-out through a label scope;
    /// for a bare identifier they are an ambiguity error.
    pub fn select_hits<T>(
        &self,
        hits: Vec<T>,
        repo_name: impl Fn(&T) -> &str,
    ) -> WtResult<Vec<T>> {
        if hits.is_empty() {
            return Err(WtError::BranchNotFound {
                target: self.to_string(),
            });
        }

        if !self.is_scoped() {
            let mut names: Vec<String> = Vec::new();
            for hit in &hits {
                let name = repo_name(hit);
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            if names.len() > 1 {
                return Err(WtError::AmbiguousTarget {
                    identifier: self.identifier.clone(),
                    repos: names,
                });
            }
        }

        Ok(hits)
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{}:{}", scope, self.identifier),
            None => write!(f, "{}", self.identifier),
        }
    }
}

/// Resolve `[scope:]identifier` into the repositories to search.
///
/// Without a scope every reachable registered repository is a candidate.
/// A scope that is neither a name nor a label fails the whole operation.
pub fn resolve_scoped_target(registry: &Registry, target: &str) -> WtResult<ResolvedTarget> {
    let parsed = ScopedTarget::parse(target);

    let (repos, matched_by_label) = match parsed.scope.as_deref() {
        None => (registry.reachable(), false),
        Some(scope) => match match_scope(registry, scope) {
            ScopeMatch::Name(repo) => (vec![repo], false),
            ScopeMatch::Label(repos) => (repos, true),
            ScopeMatch::NotFound => {
                return Err(WtError::RepoOrLabelNotFound {
                    scope: scope.to_string(),
                });
            }
        },
    };

    Ok(ResolvedTarget {
        scope: parsed.scope,
        repos: dedup_by_path(repos.into_iter().cloned()),
        identifier: parsed.identifier,
        matched_by_label,
    })
}

/// Resolve an optional bare scope (no identifier) to a repository set
pub fn resolve_scope(registry: &Registry, scope: Option<&str>) -> WtResult<Vec<Repository>> {
    let repos = match scope {
        None => registry.reachable(),
        Some(scope) => match match_scope(registry, scope) {
            ScopeMatch::Name(repo) => vec![repo],
            ScopeMatch::Label(repos) => repos,
            ScopeMatch::NotFound => {
                return Err(WtError::RepoOrLabelNotFound {
                    scope: scope.to_string(),
                });
            }
        },
    };
    Ok(dedup_by_path(repos.into_iter().cloned()))
}

/// Keep the first repository for each distinct path, preserving order
pub fn dedup_by_path(repos: impl IntoIterator<Item = Repository>) -> Vec<Repository> {
    let mut seen = HashSet::new();
    repos
        .into_iter()
        .filter(|r| seen.insert(r.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(root: &std::path::Path) -> Registry {
        let mk = |name: &str| {
            let p = root.join(name);
            std::fs::create_dir_all(&p).expect("failed to create repo dir");
            p
        };
        Registry::new(vec![
            Repository::new("alpha", mk("alpha")).with_labels(["backend"]),
            Repository::new("beta", mk("beta")).with_labels(["backend"]),
            // A repo named like a label: name must win
            Repository::new("backend-tools", mk("tools")).with_labels(["alpha"]),
        ])
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ScopedTarget::parse("alpha:feature"),
            ScopedTarget {
                scope: Some("alpha".to_string()),
                identifier: "feature".to_string()
            }
        );
        assert_eq!(ScopedTarget::parse("feature").scope, None);

        let leading = ScopedTarget::parse(":feature");
        assert_eq!(leading.scope, None);
        assert_eq!(leading.identifier, ":feature");

        let nested = ScopedTarget::parse("alpha:feat:x");
        assert_eq!(nested.scope.as_deref(), Some("alpha"));
        assert_eq!(nested.identifier, "feat:x");
    }

    #[test]
    fn test_name_wins_over_label() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());

        // "alpha" is both a repo name and a label on backend-tools
        let resolved = resolve_scoped_target(&reg, "alpha:feature").expect("resolves");
        assert!(!resolved.matched_by_label);
        assert_eq!(resolved.repos.len(), 1);
        assert_eq!(resolved.repos[0].name, "alpha");
    }

    #[test]
    fn test_label_fans_out() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());

        let resolved = resolve_scoped_target(&reg, "backend:feature").expect("resolves");
        assert!(resolved.matched_by_label);
        let names: Vec<_> = resolved.repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(resolved.identifier, "feature");
    }

    #[test]
    fn test_unknown_scope_is_error() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());

        let err = resolve_scoped_target(&reg, "nope:feature").unwrap_err();
        assert!(matches!(err, WtError::RepoOrLabelNotFound { ref scope } if scope == "nope"));
    }

    #[test]
    fn test_no_scope_searches_reachable() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let mut reg = registry(temp.path());
        reg.repos.push(Repository::new("gone", temp.path().join("missing")));

        let resolved = resolve_scoped_target(&reg, "feature").expect("resolves");
        assert_eq!(resolved.repos.len(), 3);
        assert!(resolved.repos.iter().all(|r| r.name != "gone"));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());
        let a = resolve_scoped_target(&reg, "backend:x").expect("resolves");
        let b = resolve_scoped_target(&reg, "backend:x").expect("resolves");
        assert_eq!(a, b);
    }

    #[test]
    fn test_dedup_by_path() {
        let repos = vec![
            Repository::new("a", "/p/one"),
            Repository::new("b", "/p/two"),
            Repository::new("c", "/p/one"),
        ];
        let names: Vec<_> = dedup_by_path(repos).into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_select_hits_ambiguity() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());

        let bare = resolve_scoped_target(&reg, "feature").expect("resolves");
        let err = bare
            .select_hits(vec!["alpha", "beta"], |s| *s)
            .unwrap_err();
        assert!(matches!(err, WtError::AmbiguousTarget { .. }));
        assert_eq!(bare.select_hits(vec!["alpha"], |s| *s).expect("unique").len(), 1);

        let labelled = resolve_scoped_target(&reg, "backend:feature").expect("resolves");
        assert_eq!(
            labelled
                .select_hits(vec!["alpha", "beta"], |s| *s)
                .expect("label fan-out")
                .len(),
            2
        );

        let err = labelled.select_hits(Vec::<&str>::new(), |s| *s).unwrap_err();
        assert!(matches!(err, WtError::BranchNotFound { ref target } if target == "backend:feature"));
    }

    #[test]
    fn test_resolve_scope() {
        let temp = tempfile::tempdir().expect("failed to create temp dir");
        let reg = registry(temp.path());
        assert_eq!(resolve_scope(&reg, None).expect("all").len(), 3);
        assert_eq!(resolve_scope(&reg, Some("backend")).expect("label").len(), 2);
        assert!(resolve_scope(&reg, Some("missing")).is_err());
    }
}
