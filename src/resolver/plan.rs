// src/resolver/plan.rs

//! Resolution result
//!
//! A [`Transaction`] lists the packages to install in the order the
//! resolver first selected them, each with the reason it was selected.

use crate::packages::Package;
use std::fmt;

/// Why a package is part of the transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// Matched a requested spec
    Requested { spec: String },
    /// Satisfies a hard requirement of another selected package
    Required { by: String, dependency: String },
    /// Satisfies a weak (`Recommends`) dependency
    Recommended { by: String, dependency: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Requested { spec } => write!(f, "requested as '{}'", spec),
            Reason::Required { by, dependency } => {
                write!(f, "required by {} via '{}'", by, dependency)
            }
            Reason::Recommended { by, dependency } => {
                write!(f, "recommended by {} via '{}'", by, dependency)
            }
        }
    }
}

/// One package of a transaction
#[derive(Debug, Clone)]
pub struct TransactionItem<'a> {
    pub package: &'a Package,
    pub reason: Reason,
}

/// Ordered install set
#[derive(Debug, Clone, Default)]
pub struct Transaction<'a> {
    items: Vec<TransactionItem<'a>>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(items: Vec<TransactionItem<'a>>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TransactionItem<'a>] {
        &self.items
    }

    /// Packages in selection order
    pub fn packages(&self) -> impl Iterator<Item = &'a Package> + '_ {
        self.items.iter().map(|item| item.package)
    }
}
