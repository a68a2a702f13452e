// src/resolver/mod.rs

//! Dependency resolution
//!
//! Entry point for `depsolve`: match specs and excludes against the
//! catalog, then run the [`Solver`] to produce an ordered [`Transaction`].
//!
//! Failures are split in two classes:
//! - [`Error::MarkingError`]: a spec matches no usable package
//! - [`Error::DepsolveError`]: candidates exist but no consistent set does

pub mod conflict;
pub mod engine;
pub mod plan;
pub mod spec;

pub use conflict::Problem;
pub use engine::{Solver, SpecGoal, MAX_ATTEMPTS};
pub use plan::{Reason, Transaction, TransactionItem};

use crate::catalog::{PackageCatalog, PackageId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::packages::ArchPolicy;
use std::collections::HashSet;
use tracing::{info, warn};

/// Resolve `specs` minus `excludes` into a transaction
pub fn resolve<'a>(
    catalog: &PackageCatalog<'a>,
    specs: &[String],
    excludes: &[String],
    config: &Config,
) -> Result<Transaction<'a>> {
    let policy = &config.arch;
    let excluded = excluded_packages(catalog, excludes, policy);
    let usable =
        |id: PackageId| !excluded.contains(&id) && policy.is_installable(&catalog.get(id).arch);

    let mut goals = Vec::new();
    let mut unmatched = Vec::new();
    for spec in specs {
        let matched = spec::match_spec(catalog, spec, policy, usable);
        if matched.is_empty() {
            unmatched.push(spec.clone());
            continue;
        }
        goals.extend(matched.into_iter().map(|candidates| SpecGoal {
            spec: spec.clone(),
            candidates,
        }));
    }

    if !unmatched.is_empty() {
        return Err(Error::MarkingError { specs: unmatched });
    }

    info!(
        "Resolving {} specs ({} goals, {} excluded packages) for {}",
        specs.len(),
        goals.len(),
        excluded.len(),
        policy.base()
    );

    Solver::new(catalog, policy, config.install_weak_deps, excluded)
        .solve(&goals)
        .map_err(|problem| Error::DepsolveError {
            specs: specs.to_vec(),
            problems: vec![problem.to_string()],
        })
}

/// Packages matched by any exclude spec (names and NEVRA forms only)
fn excluded_packages(
    catalog: &PackageCatalog<'_>,
    excludes: &[String],
    policy: &ArchPolicy,
) -> HashSet<PackageId> {
    let mut excluded = HashSet::new();
    for exclude in excludes {
        let matched = spec::match_nevra(catalog, exclude.trim(), policy, |_| true);
        if matched.is_empty() {
            warn!("Exclude spec '{}' matches no package", exclude);
        }
        excluded.extend(matched);
    }
    excluded
}
