//! Stackpatch Core Types
//!
//! This crate provides the document model shared by the loader, the writer
//! and the mutation engine. It includes:
//!
//! - **Nodes**: The mapping/sequence/scalar tree ([`node`] module)
//! - **Scalars**: Leaf values and their resolved kinds ([`scalar`] module)
//! - **Tags**: Intrinsic function short tags ([`tag::Tag`])
//! - **Decor**: Comments, spacing and layout recorded from the source ([`decor`] module)
//! - **Document**: A loaded template with its format and dirty flag ([`document`] module)

pub mod decor;
pub mod document;
pub mod node;
pub mod scalar;
pub mod tag;

pub use document::{Document, Format, Section};
pub use node::{Entry, Mapping, Node, Sequence};
pub use scalar::{Scalar, ScalarKind, ScalarStyle};
pub use tag::Tag;
