// src/resolver/conflict.rs

//! Resolution problems
//!
//! A [`Problem`] explains why an attempt failed. Requirement problems carry
//! the selection chain from the failing package back to the spec that
//! pulled it in, rendered one link per package.

use std::fmt;

/// Why a resolution attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// Every candidate of a spec was excluded or banned
    SpecUnavailable { spec: String },
    /// Every candidate of a spec clashes with an already selected package
    SpecConflict { spec: String, clash: String },
    /// No package provides a requirement
    NothingProvides { dependency: String, chain: Vec<String> },
    /// Every provider of a requirement clashes with the selection
    Conflict {
        dependency: String,
        chain: Vec<String>,
        clash: String,
    },
}

impl Problem {
    pub fn spec_unavailable(spec: &str) -> Self {
        Problem::SpecUnavailable {
            spec: spec.to_string(),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::SpecUnavailable { spec } => {
                write!(f, "no remaining candidate can be installed for '{}'", spec)
            }
            Problem::SpecConflict { spec, clash } => {
                write!(f, "cannot install any candidate for '{}': {}", spec, clash)
            }
            Problem::NothingProvides { dependency, chain } => write!(
                f,
                "nothing provides {} needed by {}",
                dependency,
                chain.join(" <- ")
            ),
            Problem::Conflict {
                dependency,
                chain,
                clash,
            } => write!(
                f,
                "cannot satisfy {} needed by {}: {}",
                dependency,
                chain.join(" <- "),
                clash
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_problem_messages() {
        let problem = Problem::NothingProvides {
            dependency: "libmissing.so.1()(64bit)".to_string(),
            chain: vec![
                "bar-2-1.noarch (required by foo-1.0-1.x86_64 via 'libbar')".to_string(),
                "foo-1.0-1.x86_64 (requested as 'foo')".to_string(),
            ],
        };
        assert_eq!(
            problem.to_string(),
            "nothing provides libmissing.so.1()(64bit) needed by bar-2-1.noarch \
             (required by foo-1.0-1.x86_64 via 'libbar') <- foo-1.0-1.x86_64 (requested as 'foo')"
        );

        let problem = Problem::spec_unavailable("foo");
        assert!(problem.to_string().contains("'foo'"));
    }
}
