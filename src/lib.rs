//! Cluster node initialization action that provisions a Jupyter notebook
//! server for the Hail toolkit on the master node.

pub mod anaconda;
pub mod artifacts;
pub mod command;
pub mod config;
pub mod errors;
pub mod files;
pub mod metadata;
pub mod packages;
pub mod provision;
pub mod service;

pub use provision::{provision, Outcome};
