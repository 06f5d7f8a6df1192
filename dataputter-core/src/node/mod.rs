//! Write node RPC surface: the service each storage host runs and the
//! client the router uses to reach it.

pub mod client;
pub mod messages;
pub mod service;

pub use client::{NodeClientPool, WriteNodeClient, RPC_TIMEOUT};
pub use messages::{
    NodeDeleteRequest, NodeDeleteResponse, NodeReadRequest, NodeReadResponse, NodeWriteRequest,
    NodeWriteResponse, STATUS_FAILED, STATUS_OK,
};
pub use service::{run_write_node, serve_write_node, write_node_app, WriteNodeState};
