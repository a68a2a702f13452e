// src/catalog.rs

//! In-memory package catalog
//!
//! The catalog concatenates the packages of every loaded repository in
//! enablement order and indexes them by name, provided capability and
//! listed file. Every query returns ids in catalog order, which the
//! resolver uses as its final tie-break.

use crate::packages::{Capability, Package};
use crate::repository::RepositoryHandle;
use std::collections::HashMap;
use tracing::debug;

/// Dense index of a package within a [`PackageCatalog`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub usize);

/// Packages of all enabled repositories with lookup indexes
#[derive(Debug, Default)]
pub struct PackageCatalog<'a> {
    packages: Vec<&'a Package>,
    /// Repository id and id range, in enablement order
    repos: Vec<(&'a str, std::ops::Range<usize>)>,
    names: Vec<&'a str>,
    by_name: HashMap<&'a str, Vec<PackageId>>,
    by_provide: HashMap<&'a str, Vec<PackageId>>,
    by_file: HashMap<&'a str, Vec<PackageId>>,
}

impl<'a> PackageCatalog<'a> {
    /// Build the catalog from loaded repositories, preserving their order
    pub fn build(handles: &'a [RepositoryHandle]) -> Self {
        let mut catalog = PackageCatalog::default();

        for handle in handles {
            let start = catalog.packages.len();
            for package in handle.packages() {
                catalog.insert(package);
            }
            catalog
                .repos
                .push((handle.id(), start..catalog.packages.len()));
        }

        debug!(
            "Catalog holds {} packages ({} names) from {} repositories",
            catalog.packages.len(),
            catalog.names.len(),
            catalog.repos.len()
        );
        catalog
    }

    /// Build a catalog over packages that do not come from loaded handles
    pub fn from_packages(packages: &'a [Package]) -> Self {
        let mut catalog = PackageCatalog::default();
        for package in packages {
            catalog.insert(package);
        }
        catalog
    }

    fn insert(&mut self, package: &'a Package) {
        let id = PackageId(self.packages.len());
        self.packages.push(package);

        let entry = self.by_name.entry(package.name.as_str()).or_default();
        if entry.is_empty() {
            self.names.push(package.name.as_str());
        }
        entry.push(id);

        for provide in &package.provides {
            let ids = self.by_provide.entry(provide.name.as_str()).or_default();
            // A package may list the same name with several ranges
            if ids.last() != Some(&id) {
                ids.push(id);
            }
        }
        for file in &package.files {
            self.by_file.entry(file.as_str()).or_default().push(id);
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, id: PackageId) -> &'a Package {
        self.packages[id.0]
    }

    /// Every package; there is no installed system to subtract
    pub fn available(&self) -> impl Iterator<Item = (PackageId, &'a Package)> + '_ {
        self.packages
            .iter()
            .enumerate()
            .map(|(i, pkg)| (PackageId(i), *pkg))
    }

    /// Packages contributed by one repository, in primary.xml order
    pub fn repository(&self, repo_id: &str) -> &[&'a Package] {
        self.repos
            .iter()
            .find(|(id, _)| *id == repo_id)
            .map(|(_, range)| &self.packages[range.clone()])
            .unwrap_or_default()
    }

    /// Distinct package names in first-seen order
    pub fn names(&self) -> &[&'a str] {
        &self.names
    }

    pub fn by_name(&self, name: &str) -> &[PackageId] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Packages with an explicit provide named `name` (any range)
    pub fn by_provides(&self, name: &str) -> &[PackageId] {
        self.by_provide.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn by_file(&self, path: &str) -> &[PackageId] {
        self.by_file.get(path).map(Vec::as_slice).unwrap_or_default()
    }

    /// Packages satisfying `cap` through name, provides or files
    pub fn what_provides(&self, cap: &Capability) -> Vec<PackageId> {
        let mut ids: Vec<PackageId> = self
            .by_name(&cap.name)
            .iter()
            .chain(self.by_provides(&cap.name))
            .chain(if cap.is_file() {
                self.by_file(&cap.name)
            } else {
                &[]
            })
            .copied()
            .filter(|id| self.get(*id).satisfies(cap))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
