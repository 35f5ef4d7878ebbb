//! This crate provides common funcionality

#![deny(unused_imports, unused_crate_dependencies)]
#![warn(missing_docs)]

mod rc_trait;

pub use rc_trait::{RCParams, ReservoirComputer};
