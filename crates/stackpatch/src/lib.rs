//! Stackpatch - format-preserving updates of CloudFormation templates.
//!
//! Templates are loaded into a tree that remembers how they were written, so
//! an update only changes the lines it touches. On top of that tree this
//! crate finds and rewrites references between resources, removes resources
//! together with their dependents, adds new versions of a resource, and
//! drives a [`TemplateUpdater`](updaters::TemplateUpdater) over files with the
//! [`Runner`](runner::Runner).
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use stackpatch::{config::AppConfig, runner::Runner, updaters::ResourceRemover};
//!
//! let config = AppConfig::default();
//! let mut remover = ResourceRemover::new(vec!["LegacyBucket".to_string()]);
//!
//! let summary = Runner::new(&config)
//!     .with_dry_run(true)
//!     .run(&[PathBuf::from("templates")], &mut remover)
//!     .expect("Failed to update templates");
//! println!("{} template(s) would change", summary.changed);
//! ```

pub mod catalog;
pub mod config;
pub mod merge;
pub mod references;
pub mod remove;
pub mod runner;
pub mod updaters;
pub mod versions;

mod error;

#[cfg(test)]
mod test_utils;

pub use stackpatch_core::{Document, Format, Node, Section};
pub use stackpatch_parser::{Diagnostic, ParseError, Span, error::Label};

pub use error::StackpatchError;
