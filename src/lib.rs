//! depimpact - breaking dependency upgrade impact analysis for Python repositories
//!
//! This library provides:
//! - Version classification of pinned dependencies against their latest release
//! - Static scanning of Python sources for usages of imported packages
//! - Impact mapping of breaking upgrades onto source lines
//! - A polling update stream that pushes version change events to subscribers

pub mod classify;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod fixer;
pub mod impact;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod scanner;
pub mod stream;
