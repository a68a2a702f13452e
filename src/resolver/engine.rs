// src/resolver/engine.rs

//! Resolution engine
//!
//! Selects one candidate per spec goal, then expands requirements to a
//! fixed point. Candidates are ranked deterministically; a candidate is
//! only taken when it can coexist with everything already selected.
//!
//! When a requirement cannot be met the attempt fails with the package to
//! blame. That package is banned and resolution restarts from scratch, up
//! to [`MAX_ATTEMPTS`] times. The first failure is the one reported.

use super::conflict::Problem;
use super::plan::{Reason, Transaction, TransactionItem};
use super::spec::Goal;
use crate::catalog::{PackageCatalog, PackageId};
use crate::packages::{ArchPolicy, Capability, Dependency, Package};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Maximum number of restarts before giving up
pub const MAX_ATTEMPTS: usize = 64;

/// Candidates for one requested spec
#[derive(Debug, Clone)]
pub struct SpecGoal {
    pub spec: String,
    pub candidates: Goal,
}

/// How a package entered the selection
#[derive(Debug, Clone)]
enum Origin {
    Spec(String),
    Requires { by: PackageId, dependency: String },
    Recommends { by: PackageId, dependency: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strength {
    Requires,
    Recommends,
}

/// Selection of one attempt
#[derive(Debug, Clone, Default)]
struct State {
    selected: Vec<(PackageId, Origin)>,
    index: HashMap<PackageId, usize>,
    /// Selections below this index have had their plain requirements handled
    cursor: usize,
}

impl State {
    fn contains(&self, id: PackageId) -> bool {
        self.index.contains_key(&id)
    }

    fn push(&mut self, id: PackageId, origin: Origin) {
        self.index.insert(id, self.selected.len());
        self.selected.push((id, origin));
    }
}

/// A selected package that prevents a candidate from being installed
#[derive(Debug)]
struct Blocked {
    by: PackageId,
    clash: String,
}

/// A failed attempt and the package to ban before retrying
#[derive(Debug)]
struct Failure {
    problem: Problem,
    culprit: Option<PackageId>,
}

/// Dependency solver over a package catalog
pub struct Solver<'c, 'a> {
    catalog: &'c PackageCatalog<'a>,
    policy: &'c ArchPolicy,
    install_weak_deps: bool,
    excluded: HashSet<PackageId>,
    banned: HashSet<PackageId>,
}

impl<'c, 'a> Solver<'c, 'a> {
    pub fn new(
        catalog: &'c PackageCatalog<'a>,
        policy: &'c ArchPolicy,
        install_weak_deps: bool,
        excluded: HashSet<PackageId>,
    ) -> Self {
        Self {
            catalog,
            policy,
            install_weak_deps,
            excluded,
            banned: HashSet::new(),
        }
    }

    /// Resolve the goals into an ordered transaction
    pub fn solve(mut self, goals: &[SpecGoal]) -> Result<Transaction<'a>, Problem> {
        let mut first_problem: Option<Problem> = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let failure = match self.attempt(goals) {
                Ok(state) => {
                    info!(
                        "Resolved {} packages in {} attempt(s)",
                        state.selected.len(),
                        attempt
                    );
                    return Ok(self.transaction(&state));
                }
                Err(failure) => failure,
            };

            debug!("Attempt {} failed: {}", attempt, failure.problem);
            let culprit = failure.culprit.filter(|id| !self.banned.contains(id));
            let first = first_problem.get_or_insert(failure.problem);

            match culprit {
                Some(id) if attempt < MAX_ATTEMPTS => {
                    debug!("Banning {} and retrying", self.catalog.get(id).nevra());
                    self.banned.insert(id);
                }
                _ => return Err(first.clone()),
            }
        }

        Err(first_problem.unwrap_or_else(|| Problem::spec_unavailable("")))
    }

    fn attempt(&self, goals: &[SpecGoal]) -> Result<State, Failure> {
        let mut state = State::default();
        for goal in goals {
            self.install_goal(&mut state, goal)?;
        }
        self.expand(&mut state)?;
        if self.install_weak_deps {
            self.add_weak_deps(&mut state);
        }
        Ok(state)
    }

    fn install_goal(&self, state: &mut State, goal: &SpecGoal) -> Result<(), Failure> {
        let candidates: Vec<PackageId> = goal
            .candidates
            .iter()
            .copied()
            .filter(|id| !self.banned.contains(id))
            .collect();
        if candidates.iter().any(|id| state.contains(*id)) {
            return Ok(());
        }

        let ranked = self.rank(candidates, None, None);
        match self.first_installable(state, &ranked) {
            Ok(id) => {
                state.push(id, Origin::Spec(goal.spec.clone()));
                Ok(())
            }
            Err(None) => Err(Failure {
                problem: Problem::spec_unavailable(&goal.spec),
                culprit: None,
            }),
            Err(Some(blocked)) => Err(Failure {
                problem: Problem::SpecConflict {
                    spec: goal.spec.clone(),
                    clash: blocked.clash,
                },
                culprit: Some(blocked.by),
            }),
        }
    }

    /// Install requirements of every selected package until nothing changes
    fn expand(&self, state: &mut State) -> Result<(), Failure> {
        loop {
            let mut changed = false;
            let mut i = 0;
            while i < state.selected.len() {
                let id = state.selected[i].0;
                let plain_done = i < state.cursor;
                for dep in &self.catalog.get(id).requires {
                    if dep.is_rpmlib() || (plain_done && dep.as_capability().is_some()) {
                        continue;
                    }
                    changed |= self.install_dep(state, dep, id, Strength::Requires)?;
                }
                state.cursor = state.cursor.max(i + 1);
                i += 1;
            }
            if !changed {
                return Ok(());
            }
        }
    }

    /// Try each weak dependency on a copy of the state; keep what closes
    fn add_weak_deps(&self, state: &mut State) {
        let mut i = 0;
        while i < state.selected.len() {
            let id = state.selected[i].0;
            let pkg = self.catalog.get(id);
            for dep in &pkg.recommends {
                if dep.is_rpmlib() || self.is_satisfied(state, dep) {
                    continue;
                }
                let mut trial = state.clone();
                let outcome = self
                    .install_dep(&mut trial, dep, id, Strength::Recommends)
                    .and_then(|_| self.expand(&mut trial));
                match outcome {
                    Ok(()) => *state = trial,
                    Err(failure) => debug!(
                        "Skipping weak dependency {} of {}: {}",
                        dep,
                        pkg.nevra(),
                        failure.problem
                    ),
                }
            }
            i += 1;
        }
    }

    /// Install whatever `dep` still needs; returns whether anything was added
    fn install_dep(
        &self,
        state: &mut State,
        dep: &Dependency,
        requirer: PackageId,
        strength: Strength,
    ) -> Result<bool, Failure> {
        if self.is_satisfied(state, dep) {
            return Ok(false);
        }

        match dep {
            Dependency::Capability(cap) => {
                let providers = self.providers(cap);
                let arch = &self.catalog.get(requirer).arch;
                let ranked = self.rank(providers, Some(cap.name.as_str()), Some(arch.as_str()));
                self.install_provider(state, dep, &ranked, requirer, strength)
            }
            Dependency::And(items) => {
                let mut changed = false;
                for item in items {
                    changed |= self.install_dep(state, item, requirer, strength)?;
                }
                Ok(changed)
            }
            Dependency::Or(items) => {
                let mut first_failure = None;
                for item in items {
                    let mut trial = state.clone();
                    let outcome = self
                        .install_dep(&mut trial, item, requirer, strength)
                        .and_then(|_| {
                            if self.is_satisfied(&trial, item) {
                                self.expand(&mut trial)
                            } else {
                                Err(self.nothing_provides(&trial, item, requirer))
                            }
                        });
                    match outcome {
                        Ok(()) => {
                            *state = trial;
                            return Ok(true);
                        }
                        Err(failure) => {
                            first_failure.get_or_insert(failure);
                        }
                    }
                }
                Err(first_failure.unwrap_or_else(|| self.nothing_provides(state, dep, requirer)))
            }
            Dependency::If {
                then,
                cond,
                otherwise,
            } => {
                if self.is_satisfied(state, cond) {
                    self.install_dep(state, then, requirer, strength)
                } else if let Some(otherwise) = otherwise {
                    self.install_dep(state, otherwise, requirer, strength)
                } else {
                    Ok(false)
                }
            }
            Dependency::Unless {
                then,
                cond,
                otherwise,
            } => {
                if !self.is_satisfied(state, cond) {
                    self.install_dep(state, then, requirer, strength)
                } else if let Some(otherwise) = otherwise {
                    self.install_dep(state, otherwise, requirer, strength)
                } else {
                    Ok(false)
                }
            }
            Dependency::With(_) | Dependency::Without(..) => {
                let providers = first_capability(dep)
                    .map(|cap| self.providers(cap))
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|id| package_satisfies(self.catalog.get(*id), dep))
                    .collect();
                let arch = &self.catalog.get(requirer).arch;
                let ranked = self.rank(providers, None, Some(arch.as_str()));
                self.install_provider(state, dep, &ranked, requirer, strength)
            }
        }
    }

    fn install_provider(
        &self,
        state: &mut State,
        dep: &Dependency,
        ranked: &[PackageId],
        requirer: PackageId,
        strength: Strength,
    ) -> Result<bool, Failure> {
        match self.first_installable(state, ranked) {
            Ok(id) => {
                let dependency = dep.to_string();
                let origin = match strength {
                    Strength::Requires => Origin::Requires {
                        by: requirer,
                        dependency,
                    },
                    Strength::Recommends => Origin::Recommends {
                        by: requirer,
                        dependency,
                    },
                };
                state.push(id, origin);
                Ok(true)
            }
            Err(None) => Err(self.nothing_provides(state, dep, requirer)),
            Err(Some(blocked)) => Err(Failure {
                problem: Problem::Conflict {
                    dependency: dep.to_string(),
                    chain: self.chain(state, requirer),
                    clash: blocked.clash,
                },
                culprit: Some(blocked.by),
            }),
        }
    }

    fn nothing_provides(&self, state: &State, dep: &Dependency, requirer: PackageId) -> Failure {
        Failure {
            problem: Problem::NothingProvides {
                dependency: dep.to_string(),
                chain: self.chain(state, requirer),
            },
            culprit: Some(requirer),
        }
    }

    /// Whether the current selection satisfies `dep`
    fn is_satisfied(&self, state: &State, dep: &Dependency) -> bool {
        match dep {
            Dependency::Capability(cap) => {
                cap.is_rpmlib()
                    || self
                        .catalog
                        .what_provides(cap)
                        .iter()
                        .any(|id| state.contains(*id))
            }
            Dependency::And(items) => items.iter().all(|d| self.is_satisfied(state, d)),
            Dependency::Or(items) => items.iter().any(|d| self.is_satisfied(state, d)),
            Dependency::If {
                then,
                cond,
                otherwise,
            } => {
                if self.is_satisfied(state, cond) {
                    self.is_satisfied(state, then)
                } else {
                    otherwise.as_ref().is_none_or(|o| self.is_satisfied(state, o))
                }
            }
            Dependency::Unless {
                then,
                cond,
                otherwise,
            } => {
                if !self.is_satisfied(state, cond) {
                    self.is_satisfied(state, then)
                } else {
                    otherwise.as_ref().is_none_or(|o| self.is_satisfied(state, o))
                }
            }
            Dependency::With(_) | Dependency::Without(..) => state
                .selected
                .iter()
                .any(|(id, _)| package_satisfies(self.catalog.get(*id), dep)),
        }
    }

    /// Usable packages satisfying `cap`, in catalog order
    fn providers(&self, cap: &Capability) -> Vec<PackageId> {
        self.catalog
            .what_provides(cap)
            .into_iter()
            .filter(|id| self.is_usable(*id))
            .collect()
    }

    fn is_usable(&self, id: PackageId) -> bool {
        !self.excluded.contains(&id)
            && !self.banned.contains(&id)
            && self.policy.is_installable(&self.catalog.get(id).arch)
    }

    /// Order candidates: exact name first, newest, best arch, catalog order
    fn rank(
        &self,
        mut ids: Vec<PackageId>,
        wanted_name: Option<&str>,
        requirer_arch: Option<&str>,
    ) -> Vec<PackageId> {
        let other_name = |p: &Package| wanted_name.is_some_and(|n| p.name != n);
        let arch_score = |p: &Package| match requirer_arch {
            Some(arch) => self.policy.score_for(&p.arch, arch),
            None => self.policy.score(&p.arch),
        };

        ids.sort_by(|a, b| {
            let (pa, pb) = (self.catalog.get(*a), self.catalog.get(*b));
            other_name(pa)
                .cmp(&other_name(pb))
                .then_with(|| pb.evr.cmp(&pa.evr))
                .then_with(|| arch_score(pa).cmp(&arch_score(pb)))
                .then_with(|| a.cmp(b))
        });
        ids
    }

    /// First ranked candidate that can coexist with the selection
    ///
    /// `Err(None)` when there are no candidates, otherwise the first clash.
    fn first_installable(
        &self,
        state: &State,
        ranked: &[PackageId],
    ) -> Result<PackageId, Option<Blocked>> {
        let mut first_clash = None;
        for &id in ranked {
            match self.blocker(state, id) {
                None => return Ok(id),
                Some(blocked) => {
                    first_clash.get_or_insert(blocked);
                }
            }
        }
        Err(first_clash)
    }

    fn blocker(&self, state: &State, candidate: PackageId) -> Option<Blocked> {
        let pkg = self.catalog.get(candidate);
        state.selected.iter().find_map(|(id, _)| {
            pkg.clash_with(self.catalog.get(*id)).map(|clash| Blocked { by: *id, clash })
        })
    }

    fn reason(&self, origin: &Origin) -> Reason {
        match origin {
            Origin::Spec(spec) => Reason::Requested { spec: spec.clone() },
            Origin::Requires { by, dependency } => Reason::Required {
                by: self.catalog.get(*by).nevra(),
                dependency: dependency.clone(),
            },
            Origin::Recommends { by, dependency } => Reason::Recommended {
                by: self.catalog.get(*by).nevra(),
                dependency: dependency.clone(),
            },
        }
    }

    /// Selection chain from `from` back to the spec that pulled it in
    fn chain(&self, state: &State, from: PackageId) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(from);

        while let Some(id) = current {
            let Some(&idx) = state.index.get(&id) else {
                break;
            };
            if !seen.insert(id) {
                break;
            }
            let origin = &state.selected[idx].1;
            chain.push(format!(
                "{} ({})",
                self.catalog.get(id).nevra(),
                self.reason(origin)
            ));
            current = match origin {
                Origin::Spec(_) => None,
                Origin::Requires { by, .. } | Origin::Recommends { by, .. } => Some(*by),
            };
        }
        chain
    }

    fn transaction(&self, state: &State) -> Transaction<'a> {
        Transaction::new(
            state
                .selected
                .iter()
                .map(|(id, origin)| TransactionItem {
                    package: self.catalog.get(*id),
                    reason: self.reason(origin),
                })
                .collect(),
        )
    }
}

/// Leftmost plain capability of an expression, used to seed provider lookup
fn first_capability(dep: &Dependency) -> Option<&Capability> {
    match dep {
        Dependency::Capability(cap) => Some(cap),
        Dependency::And(items) | Dependency::Or(items) | Dependency::With(items) => {
            items.iter().find_map(first_capability)
        }
        Dependency::Without(dep, _) => first_capability(dep),
        Dependency::If { then, .. } | Dependency::Unless { then, .. } => first_capability(then),
    }
}

/// Whether one package on its own satisfies an expression
fn package_satisfies(pkg: &Package, dep: &Dependency) -> bool {
    match dep {
        Dependency::Capability(cap) => pkg.satisfies(cap),
        Dependency::And(items) | Dependency::With(items) => {
            items.iter().all(|d| package_satisfies(pkg, d))
        }
        Dependency::Or(items) => items.iter().any(|d| package_satisfies(pkg, d)),
        Dependency::Without(a, b) => package_satisfies(pkg, a) && !package_satisfies(pkg, b),
        Dependency::If { then, .. } | Dependency::Unless { then, .. } => {
            package_satisfies(pkg, then)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packages::tests::package;

    fn cap(s: &str) -> Dependency {
        Capability::parse(s).unwrap().into()
    }

    fn rich(s: &str) -> Dependency {
        Dependency::parse_rich(s).unwrap()
    }

    fn goal(catalog: &PackageCatalog<'_>, spec: &str) -> SpecGoal {
        SpecGoal {
            spec: spec.to_string(),
            candidates: catalog.by_name(spec).to_vec(),
        }
    }

    fn solve(pkgs: &[Package], specs: &[&str], weak: bool) -> Result<Vec<String>, Problem> {
        let catalog = PackageCatalog::from_packages(pkgs);
        let policy = ArchPolicy::new("x86_64");
        let goals: Vec<SpecGoal> = specs.iter().map(|s| goal(&catalog, s)).collect();
        Solver::new(&catalog, &policy, weak, HashSet::new())
            .solve(&goals)
            .map(|tx| tx.packages().map(Package::nevra).collect())
    }

    #[test]
    fn test_selection_order_follows_traversal() {
        let mut foo = package("foo", "1.0-1", "x86_64");
        foo.requires.push(cap("libbar"));
        foo.requires.push(cap("baz"));
        let mut bar = package("bar", "2-1", "noarch");
        bar.provides.push(Capability::unversioned("libbar"));
        bar.requires.push(cap("qux"));
        let pkgs = vec![
            package("qux", "1-1", "noarch"),
            package("baz", "1-1", "x86_64"),
            bar,
            foo,
        ];

        let result = solve(&pkgs, &["foo"], false).unwrap();
        assert_eq!(
            result,
            vec![
                "foo-1.0-1.x86_64",
                "bar-2-1.noarch",
                "baz-1-1.x86_64",
                "qux-1-1.noarch"
            ]
        );
    }

    #[test]
    fn test_prefers_newest_then_native_arch() {
        let pkgs = vec![
            package("foo", "1.0-1", "x86_64"),
            package("foo", "2.0-1", "i686"),
            package("foo", "2.0-1", "x86_64"),
        ];
        assert_eq!(solve(&pkgs, &["foo"], false).unwrap(), vec!["foo-2.0-1.x86_64"]);
    }

    #[test]
    fn test_equal_versions_tie_break_on_catalog_order() {
        let mut a = package("impl-a", "1-1", "noarch");
        a.provides.push(Capability::unversioned("service"));
        let mut b = package("impl-b", "1-1", "noarch");
        b.provides.push(Capability::unversioned("service"));
        let mut app = package("app", "1-1", "noarch");
        app.requires.push(cap("service"));
        let pkgs = vec![app, b, a];

        let result = solve(&pkgs, &["app"], false).unwrap();
        assert_eq!(result, vec!["app-1-1.noarch", "impl-b-1-1.noarch"]);
    }

    #[test]
    fn test_nothing_provides_reports_chain() {
        let mut foo = package("foo", "1.0-1", "x86_64");
        foo.requires.push(cap("bar"));
        let mut bar = package("bar", "2-1", "noarch");
        bar.requires.push(cap("libmissing"));
        let pkgs = vec![foo, bar];

        let problem = solve(&pkgs, &["foo"], false).unwrap_err();
        assert_eq!(
            problem.to_string(),
            "nothing provides libmissing needed by bar-2-1.noarch \
             (required by foo-1.0-1.x86_64 via 'bar') <- foo-1.0-1.x86_64 (requested as 'foo')"
        );
    }

    #[test]
    fn test_falls_back_to_older_version_after_ban() {
        let mut new = package("foo", "2.0-1", "x86_64");
        new.requires.push(cap("libgone"));
        let old = package("foo", "1.0-1", "x86_64");
        let pkgs = vec![new, old];

        assert_eq!(solve(&pkgs, &["foo"], false).unwrap(), vec!["foo-1.0-1.x86_64"]);
    }

    #[test]
    fn test_conflicting_specs_fail() {
        let mut a = package("postfix", "3-1", "x86_64");
        a.conflicts.push(Capability::unversioned("sendmail"));
        let b = package("sendmail", "8-1", "x86_64");
        let pkgs = vec![a, b];

        let problem = solve(&pkgs, &["postfix", "sendmail"], false).unwrap_err();
        assert!(matches!(problem, Problem::SpecConflict { .. }));
        assert!(problem.to_string().contains("conflicts with sendmail"));
    }

    #[test]
    fn test_restart_picks_compatible_provider() {
        // mta-a is the best provider but clashes with a later requirement
        let mut app = package("app", "1-1", "noarch");
        app.requires.push(cap("mta"));
        app.requires.push(cap("tool"));
        let mut mta_a = package("mta-a", "2-1", "noarch");
        mta_a.provides.push(Capability::unversioned("mta"));
        let mut mta_b = package("mta-b", "1-1", "noarch");
        mta_b.provides.push(Capability::unversioned("mta"));
        let mut tool = package("tool", "1-1", "noarch");
        tool.conflicts.push(Capability::unversioned("mta-a"));
        let pkgs = vec![app, mta_a, mta_b, tool];

        let result = solve(&pkgs, &["app"], false).unwrap();
        assert_eq!(result, vec!["app-1-1.noarch", "mta-b-1-1.noarch", "tool-1-1.noarch"]);
    }

    #[test]
    fn test_rich_dependencies() {
        let mut app = package("app", "1-1", "x86_64");
        app.requires.push(rich("(backend-a or backend-b)"));
        app.requires.push(rich("(langpack-en if glibc)"));
        app.requires.push(cap("glibc"));
        let pkgs = vec![
            app,
            package("backend-b", "1-1", "x86_64"),
            package("glibc", "2.39-1", "x86_64"),
            package("langpack-en", "1-1", "noarch"),
        ];

        let result = solve(&pkgs, &["app"], false).unwrap();
        assert_eq!(
            result,
            vec![
                "app-1-1.x86_64",
                "backend-b-1-1.x86_64",
                "glibc-2.39-1.x86_64",
                "langpack-en-1-1.noarch"
            ]
        );
    }

    #[test]
    fn test_with_and_without() {
        let mut app = package("app", "1-1", "noarch");
        app.requires.push(rich("(python3-lib with python3-lib >= 2)"));
        app.requires.push(rich("(editor without emacs)"));
        let mut emacs = package("emacs", "29-1", "x86_64");
        emacs.provides.push(Capability::unversioned("editor"));
        let mut vim = package("vim", "9-1", "x86_64");
        vim.provides.push(Capability::unversioned("editor"));
        let pkgs = vec![
            app,
            package("python3-lib", "1-1", "noarch"),
            package("python3-lib", "2-1", "noarch"),
            emacs,
            vim,
        ];

        let result = solve(&pkgs, &["app"], false).unwrap();
        assert_eq!(
            result,
            vec!["app-1-1.noarch", "python3-lib-2-1.noarch", "vim-9-1.x86_64"]
        );
    }

    #[test]
    fn test_weak_deps() {
        let mut app = package("app", "1-1", "noarch");
        app.recommends.push(cap("docs"));
        app.recommends.push(cap("missing-extra"));
        let pkgs = vec![app, package("docs", "1-1", "noarch")];

        assert_eq!(
            solve(&pkgs, &["app"], true).unwrap(),
            vec!["app-1-1.noarch", "docs-1-1.noarch"]
        );
        assert_eq!(solve(&pkgs, &["app"], false).unwrap(), vec!["app-1-1.noarch"]);
    }

    #[test]
    fn test_rpmlib_and_multilib() {
        let mut app = package("app", "1-1", "x86_64");
        app.requires.push(cap("rpmlib(PayloadIsZstd)"));
        app.requires.push(cap("libc"));
        let mut libc64 = package("libc", "2-1", "x86_64");
        libc64.provides.push(Capability::unversioned("libc"));
        let libc32 = package("libc", "2-1", "i686");
        let pkgs = vec![app, libc32, libc64];

        assert_eq!(
            solve(&pkgs, &["app"], false).unwrap(),
            vec!["app-1-1.x86_64", "libc-2-1.x86_64"]
        );
    }
}
