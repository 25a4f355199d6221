//! Provider-facing descriptors (data), strategies (behavior), and the registry.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering
//! HTTPS-only endpoints, supported grant flags, client authentication
//! preferences, per-provider quirks (PKCE requirement, scope delimiter), and
//! the provider's rate-limit envelope. `strategy` defines
//! [`ProviderStrategy`], the transport-agnostic hook that classifies failing
//! responses into the crate error taxonomy. `registry` binds descriptors to
//! client credentials and a shared per-provider limiter.

pub mod descriptor;
pub mod registry;
pub mod strategy;

pub use descriptor::*;
pub use registry::*;
pub use strategy::*;
