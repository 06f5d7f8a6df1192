//! Write Node RPC messages. Chunk bodies travel as raw request/response
//! bodies; the remaining fields ride in the URL or a JSON envelope.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

pub const STATUS_OK: u32 = 0;
pub const STATUS_FAILED: u32 = 1;

#[derive(Debug, Clone)]
pub struct NodeWriteRequest {
    pub object_id: String,
    pub ticket_id: String,
    pub byte_start: i64,
    pub byte_end: i64,
    pub byte_count: i64,
    pub data: Bytes,
}

/// Echoes the request's byte range so the router can record the ticket
/// metadata without a second round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeWriteResponse {
    pub object_id: String,
    pub ticket_id: String,
    pub node_id: String,
    pub byte_start: i64,
    pub byte_end: i64,
    pub byte_count: i64,
    pub status: u32,
}

#[derive(Debug, Clone)]
pub struct NodeReadRequest {
    pub ticket_id: String,
}

#[derive(Debug, Clone)]
pub struct NodeReadResponse {
    pub ticket_id: String,
    pub data: Bytes,
    pub status: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDeleteRequest {
    pub object_id: String,
    pub ticket_id: String,
    pub node_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDeleteResponse {
    pub status: u32,
}
