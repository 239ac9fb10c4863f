//! Shared fixtures and harnesses for the workspace's integration tests.

pub mod common;
pub mod support;
