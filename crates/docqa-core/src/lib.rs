//! docqa-core
//!
//! Shared vocabulary of the question-answering pipeline: domain types, the
//! error taxonomy, collaborator traits, layered configuration, Reciprocal
//! Rank Fusion and the external call policy.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod fusion;
pub mod logging;
pub mod policy;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
