//! # cloudfuzz-scenarios
//!
//! Scenario tests for cloudfuzz.
//!
//! - `simulated` - an in-process cloud: mock hosts plus a fake leader whose
//!   member count grows poll by poll
//! - `assertions` - pure checks over run reports
//! - `distributed` - environment-driven setup for real hosts over ssh
//!
//! Real-host tests are `#[ignore = "requires distributed"]`:
//!
//! ```bash
//! CLOUDFUZZ_HOSTS=ops@10.0.0.5,ops@10.0.0.6 CLOUDFUZZ_ARTIFACT=target/worker.jar \
//!     cargo test -p cloudfuzz-scenarios distributed -- --ignored
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod distributed;
pub mod simulated;
