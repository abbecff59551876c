//! # gxyarchiver
//!
//! Retires old Galaxy histories from a running server and consolidates
//! their exports into size-bounded tar bundles.
//!
//! - **Archive**: export a history to a content-addressed target, wait for the
//!   export task, verify the export record and purge the live history
//! - **Bundle**: select the oldest exports of retired histories under a size
//!   budget, write a JSON manifest and an atomically renamed tar
//! - **Verify**: re-check staged exports against the server and quarantine
//!   the ones whose history is not archived and purged

pub mod bundler;
pub mod cli;
pub mod common;
pub mod fixture;
pub mod lifecycle;
pub mod remote;
