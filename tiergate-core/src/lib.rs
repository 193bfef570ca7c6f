//! # Tiergate Core
//!
//! `tiergate-core` enforces per-method caller tiers on `tonic` servers. The minimum tier
//! of each RPC is declared in the `.proto` schema as a custom method option:
//!
//! ```proto
//! extend google.protobuf.MethodOptions {
//!   optional uint32 min_tier = 50501;
//! }
//!
//! service ShowcaseService {
//!   rpc GetPremiumInsights(InsightsRequest) returns (Insights) {
//!     option (tier.v1.min_tier) = 2;
//!   }
//! }
//! ```
//!
//! and read back at runtime from the encoded `FileDescriptorSet` via `prost-reflect`.
//! Callers announce their tier in the `tier` request metadata entry.
//!
//! ## Key Components
//!
//! * **[`TierOption`](options::TierOption):** Resolves the custom option in a `DescriptorPool`
//!   and reads it from method descriptors.
//! * **[`TierPolicy`]:** The per-path table of minimum tiers, and the authorization decision.
//! * **[`TierLayer`]:** A `tower` middleware that rejects requests before they reach the service.
//! * **[`TierClient`](client::TierClient):** A dynamic JSON client that attaches the caller's tier.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiergate_core::{PolicyConfig, TierLayer, TierPolicy};
//!
//! # fn run(descriptor_set: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let policy = TierPolicy::from_file_descriptor_set(descriptor_set, &PolicyConfig::default())?;
//!
//! let server = tonic::transport::Server::builder().layer(TierLayer::new(policy));
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod layer;
pub mod metadata;
pub mod options;
pub mod policy;

pub use layer::{TierLayer, TierService};
pub use policy::{PolicyConfig, PolicyError, Requirement, TierError, TierPolicy, UnknownMethod};

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
