//! # APISURFACE
//!
//! Public API surface extraction from compiled JVM class files.
//!
//! APISURFACE reads jars and class files, works out which types are part of
//! the public API of the primary archives (directly, or because a public
//! signature drags them in), and assembles them into a tree ready for
//! version-to-version compatibility checks.
//!
//! ## Pipeline
//!
//! - **Class files** are decoded into immutable facts ([`parsers`])
//! - **Use edges** between types feed a graph that closes over API membership
//! - **Supplementary archives** are scanned only until every API type is found
//! - **The tree** places member types under their owners

pub mod config;
pub mod core;
pub mod parsers;
