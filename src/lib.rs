//! tunesync - mirror an iTunes-style music library into SQLite
//!
//! This crate provides the core functionality for the `tunesync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Track, Playlist, external records, ids)
//! - [`smart`] - Smart playlist rule codec and SQL compiler
//! - [`storage`] - SQLite database layer and snapshot tables
//! - [`sync`] - Library sync engine, track-order merge, change events
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod smart;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
