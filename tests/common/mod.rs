//! Common test utilities for siaet-dl HTTP tests

#![allow(dead_code)]

pub mod fixtures;

pub use fixtures::*;
