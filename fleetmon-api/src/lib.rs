//! fleetmon gRPC API
//!
//! This crate defines the wire contract between worker agents, the manager
//! daemon, and operator tooling. The protobuf definitions live in
//! `proto/fleetmon.proto` and are code-generated via `tonic-build`.

// Include the generated code
pub mod fleetmon {
    pub mod v1 {
        tonic::include_proto!("fleetmon.v1");
    }
}
