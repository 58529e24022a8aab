//! Core library for the `hatchery` load generator.
//!
//! Virtual users are described by weighted [`user::UserSpec`]s and hatched at
//! a paced rate by the [`hatch`] scheduler. A [`runner::LocalRunner`] runs
//! them in-process; a [`distributed::Coordinator`] splits the population
//! across [`distributed::Worker`]s over a [`distributed::MessageChannel`] and
//! merges their [`stats`] and [`exceptions`] reports.
pub mod args;
pub mod behavior;
pub mod config;
pub mod distributed;
pub mod entry;
pub mod error;
pub mod exceptions;
pub mod hatch;
pub mod logger;
pub mod runner;
pub mod shutdown;
pub mod stats;
pub mod user;

#[cfg(feature = "fuzzing")]
pub mod fuzzing;
