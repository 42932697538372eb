//! # cloudfuzz-core
//!
//! Pure logic for cloudfuzz (no I/O, instant tests).
//!
//! This crate implements the algorithms and state machines of the harness
//! without any network or process I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same seed → same trials)
//! - Easy reasoning about job state transitions
//!
//! The actual I/O (ssh, HTTP polling) is performed by `cloudfuzz-client`,
//! which interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatch;
pub mod fuzzer;
pub mod retry;
pub mod sandbox;
pub mod stabilize;
pub mod validate;

pub use dispatch::{DispatchAction, DispatchEvent, DispatchPolicy, JobState};
pub use fuzzer::ParameterFuzzer;
pub use retry::RetryPolicy;
pub use sandbox::{SandboxFinding, SandboxScanner};
pub use stabilize::StabilizationTracker;
pub use validate::{
    MetricBounds, RequireFields, ResultValidator, ValidationOutcome, ValidatorRegistry,
};
