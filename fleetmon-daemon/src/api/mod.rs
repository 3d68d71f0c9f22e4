//! gRPC API surface

mod server;

pub use server::serve;
