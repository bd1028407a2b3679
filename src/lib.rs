//! Feature flag evaluation service.
//!
//! [`evaluation`] holds the engine; [`catalog`], [`routes`] and [`config`]
//! wrap it into an HTTP service that evaluates flags loaded from a JSON
//! catalog file.

pub mod catalog;
pub mod config;
pub mod evaluation;
pub mod routes;
pub mod state;
pub mod telemetry;
