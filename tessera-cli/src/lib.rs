//! Tessera CLI - Command-line interface for Tessera migration synthesis.
//!
//! This crate provides the `tessera` tool for generating reversible
//! migration records from model definitions and inspecting history.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
