// src/resolver/spec.rs

//! Package spec matching
//!
//! Turns request strings such as `bash`, `bash >= 5`, `bash-5.2.26-3.fc40`,
//! `bash.x86_64`, `python3-*` or `/usr/bin/bash` into candidate packages.
//! Each spec yields one or more goals: a glob over names installs the best
//! candidate of every matching name, other forms install one package.

use crate::catalog::{PackageCatalog, PackageId};
use crate::packages::{ArchPolicy, Capability, Package};
use glob::Pattern;

/// Candidates for one package to install, in catalog order
pub type Goal = Vec<PackageId>;

/// A parsed `name[-[epoch:]version[-release]][.arch]` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Nevra<'s> {
    name: &'s str,
    epoch: Option<u64>,
    version: Option<&'s str>,
    release: Option<&'s str>,
    arch: Option<&'s str>,
}

impl<'s> Nevra<'s> {
    fn matches(&self, pkg: &Package) -> bool {
        self.epoch.is_none_or(|e| e == pkg.epoch())
            && self.version.is_none_or(|v| v == pkg.version())
            && self.release.is_none_or(|r| r == pkg.release())
            && self.arch.is_none_or(|a| a == pkg.arch)
    }
}

/// `name-[epoch:]version`
fn split_nev(s: &str) -> Option<Nevra<'_>> {
    let (name, ev) = s.rsplit_once('-')?;
    if name.is_empty() || ev.is_empty() {
        return None;
    }
    let (epoch, version) = match ev.split_once(':') {
        Some((epoch, version)) => (Some(epoch.parse().ok()?), version),
        None => (None, ev),
    };
    if version.is_empty() {
        return None;
    }
    Some(Nevra {
        name,
        epoch,
        version: Some(version),
        ..Nevra::default()
    })
}

/// `name-[epoch:]version-release`
fn split_nevr(s: &str) -> Option<Nevra<'_>> {
    let (nev, release) = s.rsplit_once('-')?;
    if release.is_empty() {
        return None;
    }
    Some(Nevra {
        release: Some(release),
        ..split_nev(nev)?
    })
}

/// Interpretations of a spec, most specific first
fn nevra_forms<'s>(spec: &'s str, policy: &ArchPolicy) -> Vec<Nevra<'s>> {
    let mut forms = Vec::new();
    let with_arch = spec
        .rsplit_once('.')
        .filter(|(name, arch)| !name.is_empty() && policy.is_known(arch));

    if let Some((nevr, arch)) = with_arch {
        if let Some(form) = split_nevr(nevr) {
            forms.push(Nevra {
                arch: Some(arch),
                ..form
            });
        }
    }
    forms.extend(split_nevr(spec));
    forms.extend(split_nev(spec));
    if let Some((name, arch)) = with_arch {
        forms.push(Nevra {
            name,
            arch: Some(arch),
            ..Nevra::default()
        });
    }
    forms.push(Nevra {
        name: spec,
        ..Nevra::default()
    });
    forms
}

fn is_glob(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// Packages whose name equals or glob-matches `name`, in catalog order
fn packages_named(catalog: &PackageCatalog<'_>, name: &str) -> Vec<PackageId> {
    if !is_glob(name) {
        return catalog.by_name(name).to_vec();
    }
    let Ok(pattern) = Pattern::new(name) else {
        return Vec::new();
    };
    let mut ids: Vec<PackageId> = catalog
        .names()
        .iter()
        .filter(|n| pattern.matches(n))
        .flat_map(|n| catalog.by_name(n).iter().copied())
        .collect();
    ids.sort_unstable();
    ids
}

/// Match a spec against package names and NEVRA forms only
///
/// The first form that matches a usable package wins.
pub fn match_nevra(
    catalog: &PackageCatalog<'_>,
    spec: &str,
    policy: &ArchPolicy,
    usable: impl Fn(PackageId) -> bool,
) -> Vec<PackageId> {
    for form in nevra_forms(spec, policy) {
        let ids: Vec<PackageId> = packages_named(catalog, form.name)
            .into_iter()
            .filter(|id| usable(*id) && form.matches(catalog.get(*id)))
            .collect();
        if !ids.is_empty() {
            return ids;
        }
    }
    Vec::new()
}

/// Split candidates into one goal per package name, first-seen order
fn group_by_name(catalog: &PackageCatalog<'_>, ids: Vec<PackageId>) -> Vec<Goal> {
    let mut goals: Vec<(&str, Goal)> = Vec::new();
    for id in ids {
        let name = catalog.get(id).name.as_str();
        match goals.iter_mut().find(|(n, _)| *n == name) {
            Some((_, goal)) => goal.push(id),
            None => goals.push((name, vec![id])),
        }
    }
    goals.into_iter().map(|(_, goal)| goal).collect()
}

/// Resolve a package spec into install goals
///
/// Order of attempts: relational `NAME OP EVR` (spaces around OP are
/// optional), NEVRA forms (with name globs), provided capability, then
/// file path. An empty result means the spec matches nothing usable.
pub fn match_spec(
    catalog: &PackageCatalog<'_>,
    spec: &str,
    policy: &ArchPolicy,
    usable: impl Fn(PackageId) -> bool,
) -> Vec<Goal> {
    let spec = spec.trim();
    if spec.is_empty() || spec.starts_with('@') {
        return Vec::new();
    }

    if Capability::is_relational(spec) || spec.contains(char::is_whitespace) {
        let Ok(cap) = Capability::parse(spec) else {
            return Vec::new();
        };
        let by_name: Goal = catalog
            .by_name(&cap.name)
            .iter()
            .copied()
            .filter(|id| usable(*id) && catalog.get(*id).matches_name_and_version(&cap))
            .collect();
        if !by_name.is_empty() {
            return vec![by_name];
        }
        let providers: Goal = catalog
            .what_provides(&cap)
            .into_iter()
            .filter(|id| usable(*id))
            .collect();
        return if providers.is_empty() {
            Vec::new()
        } else {
            vec![providers]
        };
    }

    let by_nevra = match_nevra(catalog, spec, policy, &usable);
    if !by_nevra.is_empty() {
        return group_by_name(catalog, by_nevra);
    }

    let cap = Capability::unversioned(spec);
    let providers: Goal = catalog
        .by_provides(spec)
        .iter()
        .copied()
        .filter(|id| usable(*id))
        .collect();
    if !providers.is_empty() {
        return vec![providers];
    }

    if cap.is_file() {
        let owners: Goal = catalog
            .what_provides(&cap)
            .into_iter()
            .filter(|id| usable(*id))
            .collect();
        if !owners.is_empty() {
            return vec![owners];
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::tests::package;

    fn catalog_of(pkgs: &[Package]) -> PackageCatalog<'_> {
        PackageCatalog::from_packages(pkgs)
    }

    fn fixture() -> Vec<Package> {
        let mut bash = package("bash", "5.2.26-3.fc40", "x86_64");
        bash.files.push("/usr/bin/bash".to_string());
        bash.provides.push(Capability::unversioned("/bin/sh"));
        vec![
            bash,
            package("bash", "1:4.4-1", "x86_64"),
            package("bash", "5.2.26-3.fc40", "i686"),
            package("python3-six", "1.16-1", "noarch"),
            package("python3-idna", "3.6-1", "noarch"),
            package("python3.12", "3.12.1-1", "x86_64"),
            package("bash", "5.2.26-3.fc40", "src"),
        ]
    }

    fn names(catalog: &PackageCatalog<'_>, goals: &[Goal]) -> Vec<Vec<String>> {
        goals
            .iter()
            .map(|g| g.iter().map(|id| catalog.get(*id).nevra()).collect())
            .collect()
    }

    #[test]
    fn test_match_plain_name() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");
        let goals = match_spec(&catalog, "bash", &policy, |_| true);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].len(), 4);
    }

    #[test]
    fn test_match_nevra_forms() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");

        let goals = match_spec(&catalog, "bash-5.2.26-3.fc40.i686", &policy, |_| true);
        assert_eq!(names(&catalog, &goals), vec![vec!["bash-5.2.26-3.fc40.i686"]]);

        let goals = match_spec(&catalog, "bash.x86_64", &policy, |_| true);
        assert_eq!(goals[0].len(), 2);

        let goals = match_spec(&catalog, "bash-1:4.4", &policy, |_| true);
        assert_eq!(names(&catalog, &goals), vec![vec!["bash-1:4.4-1.x86_64"]]);

        // Dots in names are not mistaken for an arch
        let goals = match_spec(&catalog, "python3.12", &policy, |_| true);
        assert_eq!(goals.len(), 1);
    }

    #[test]
    fn test_match_glob_groups_by_name() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");
        let goals = match_spec(&catalog, "python3-*", &policy, |_| true);
        assert_eq!(
            names(&catalog, &goals),
            vec![vec!["python3-six-1.16-1.noarch"], vec!["python3-idna-3.6-1.noarch"]]
        );
    }

    #[test]
    fn test_match_relational() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");

        let goals = match_spec(&catalog, "bash < 5", &policy, |_| true);
        assert!(goals.is_empty(), "epoch 1 makes 4.4 newer than 5");

        let goals = match_spec(&catalog, "bash >= 1:4", &policy, |_| true);
        assert_eq!(names(&catalog, &goals), vec![vec!["bash-1:4.4-1.x86_64"]]);

        assert!(match_spec(&catalog, "bash ~> 5", &policy, |_| true).is_empty());

        let goals = match_spec(&catalog, "bash>=1:4", &policy, |_| true);
        assert_eq!(names(&catalog, &goals), vec![vec!["bash-1:4.4-1.x86_64"]]);
    }

    #[test]
    fn test_match_provides_and_files() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");

        let goals = match_spec(&catalog, "/bin/sh", &policy, |_| true);
        assert_eq!(names(&catalog, &goals), vec![vec!["bash-5.2.26-3.fc40.x86_64"]]);

        let goals = match_spec(&catalog, "/usr/bin/bash", &policy, |_| true);
        assert_eq!(goals[0], vec![PackageId(0)]);
    }

    #[test]
    fn test_usable_filter_and_unmatched() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");

        let goals = match_spec(&catalog, "bash.src", &policy, |id| {
            policy.is_installable(&catalog.get(id).arch)
        });
        assert!(goals.is_empty());

        assert!(match_spec(&catalog, "zsh", &policy, |_| true).is_empty());
        assert!(match_spec(&catalog, "@core", &policy, |_| true).is_empty());
        assert!(match_spec(&catalog, "", &policy, |_| true).is_empty());
    }

    #[test]
    fn test_match_nevra_ignores_provides() {
        let pkgs = fixture();
        let catalog = catalog_of(&pkgs);
        let policy = ArchPolicy::new("x86_64");
        assert!(match_nevra(&catalog, "/bin/sh", &policy, |_| true).is_empty());
        assert_eq!(match_nevra(&catalog, "python3-s*", &policy, |_| true), vec![PackageId(3)]);
    }
}
