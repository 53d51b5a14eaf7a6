//! Test utilities shared by the integration tests

#![allow(dead_code)]

mod mirror;

pub use mirror::*;
