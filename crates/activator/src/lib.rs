//! On-demand activation gateway for managed cluster services.
//!
//! This crate provides:
//! - HTTP clients for the cluster-orchestration and virtual-network APIs
//! - An activation workflow that scales the first idle service to one
//!   replica, waits for its task to run, and resolves its public address
//! - Per-service start/stop controls and a cluster-wide status report
//! - The HTTP server exposing all of the above (standalone service)
//!
//! # Modules
//!
//! - [`config`] - Environment-backed configuration, read once at startup
//! - [`models`] - Wire types for the platform APIs
//! - [`client`] - Platform API clients and the error taxonomy
//! - [`backend`] - The [`backend::ClusterBackend`] trait and its live impl
//! - [`activation`] - The idle-service activation workflow
//! - [`status`] - Cluster-wide status aggregation
//! - [`server`] - Router and handlers
//! - [`templates`] - Welcome page rendering

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // Many async API methods can fail

pub mod activation;
pub mod backend;
pub mod client;
pub mod config;
pub mod models;
pub mod server;
pub mod status;
pub mod templates;

pub use activation::{activate, Activation, ActivationOptions, ActivationOutcome};
pub use backend::{ClusterBackend, PlatformBackend};
pub use client::{BackendError, ClusterApiClient, NetworkApiClient};
pub use config::Config;
pub use server::{build_router, run_server, AppState};
pub use templates::TemplateEngine;
