//! Formulary - a formula-driven installer for binaries fetched from Git
//! sources.
//!
//! A package is described by a declarative TOML formula: name, version,
//! source URL with a branch/tag/rev selector, dependencies, the binaries
//! to install, optional caveats, and a post-install test. Installing a
//! package runs a strictly sequential pipeline:
//!
//! ```text
//! Formula → Resolver → Fetcher → Installer → Verifier
//! ```
//!
//! - [`formula`] loads and validates descriptors
//! - [`resolver`] turns a source selector into a concrete revision
//! - [`fetcher`] materializes that revision into a disposable workspace,
//!   backed by the shared clone [`cache`]
//! - [`installer`] places declared binaries into the target layout,
//!   atomically per package
//! - [`verifier`] runs the formula's test command against the result
//!
//! The [`pipeline`] module wires the stages together for one package;
//! [`cli`] adds the `install` / `test` / `list` / `cache` commands and
//! fans independent packages out concurrently, one workspace each.
//!
//! Like Cargo, formulary drives the system `git` binary ([`git`]) rather
//! than linking a git library, so credentials and transports behave
//! exactly as the user's git does.

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod fetcher;
pub mod formula;
pub mod git;
pub mod installer;
pub mod pipeline;
pub mod resolver;
pub mod utils;
pub mod verifier;
