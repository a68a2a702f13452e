// src/lib.rs

//! depsolve
//!
//! Repository metadata query and RPM dependency resolution.
//!
//! # Architecture
//!
//! - Stateless: one JSON request in, one JSON document out
//! - Cache: rpm-md metadata per repository under the caller's cachedir,
//!   reused while fresh and replaced atomically when not
//! - Catalog: every package from every enabled repository, indexed by
//!   name, provide and file
//! - Resolver: spec matching plus a backtracking install-set solver

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod dispatch;
mod error;
pub mod packages;
pub mod repository;
pub mod resolver;
pub mod version;

pub use error::{Error, Result, DNF_ERROR_EXIT_CODE};
