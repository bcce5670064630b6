//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod credential;
pub mod error;
pub mod hardening;
pub mod host;
pub mod remote;
pub mod result;
pub mod ssh;
pub mod state;

#[allow(unused_imports)]
pub use config::HardhostConfig;
#[allow(unused_imports)]
pub use error::{ConfigError, ErrorKind, ProvisionError, ProvisionFailure};
#[allow(unused_imports)]
pub use hardening::{HardeningPlan, HardeningStep};
#[allow(unused_imports)]
pub use result::{ProvisioningResult, ResultAccumulator, StepResult};
#[allow(unused_imports)]
pub use state::{Lifecycle, ProvisionState};
