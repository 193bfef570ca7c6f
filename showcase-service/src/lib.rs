//! # Showcase Service
//!
//! A small gRPC service whose methods are annotated with the `(tier.v1.min_tier)`
//! method option. It ships the `.proto` definitions, the generated server bindings
//! and the encoded `FileDescriptorSet` (including `tier/v1/options.proto` and
//! `google/protobuf/descriptor.proto`) that `tiergate` reads the options from.
mod service;

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/showcase.v1.rs"));
}

pub use pb::showcase_service_server::{ShowcaseService, ShowcaseServiceServer};
pub use service::ShowcaseServiceImpl;

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("descriptors");

/// Fully qualified name of the showcase service.
pub const SERVICE_NAME: &str = "showcase.v1.ShowcaseService";
