//! Forgeflow build engine
//!
//! This crate turns normalized step inputs into a `depot build` invocation:
//! input normalization, secret materialization, argument synthesis,
//! credential resolution via OIDC exchange, child process execution with
//! buildx fallback, and result extraction from the temp-dir side effects.

pub mod args;
pub mod artifacts;
pub mod auth;
pub mod error;
pub mod exec;
pub mod inputs;
pub mod record;
pub mod secret;

pub use args::{BuildPlan, plan_build};
pub use artifacts::BuildArtifacts;
pub use auth::{Credential, CredentialSource};
pub use error::{BuildError, BuildResult};
pub use inputs::BuildRequest;
