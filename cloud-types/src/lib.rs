//! # cloudfuzz-types
//!
//! Data model and wire types for the cloudfuzz cluster harness.
//!
//! This crate provides the foundational types used across all cloudfuzz crates:
//! - [`NodeAddr`], [`DestinationKey`], [`JobKind`], [`RunId`] - Identity types
//! - [`ParameterDomain`], [`ParamValue`], [`JobConfig`] - Typed job parameters
//! - [`Cluster`], [`NodeHandle`] - Provisioned and stabilized cloud state
//! - [`JobResult`], [`FailureRecord`] - Dispatch outcomes
//! - [`CloudStatus`], [`SubmitResponse`], [`ProgressResponse`] - REST wire shapes
//! - [`DomainError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cluster;
mod error;
mod ids;
mod job;
mod messages;
mod params;

pub use cluster::{Cluster, NodeHandle};
pub use error::DomainError;
pub use ids::{DestinationKey, JobKind, NodeAddr, RunId};
pub use job::{CompletionStatus, DispatchOutcome, FailureKind, FailureRecord, JobResult};
pub use messages::{CloudStatus, ProgressResponse, RemoteJobState, SubmitResponse};
pub use params::{JobConfig, JobConfigBuilder, Origin, ParamValue, ParameterDomain};
