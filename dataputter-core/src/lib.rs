//! DataPutter Core - Storage plane for a small object store on trusted
//! private networks.
//!
//! A router slices an ingested byte stream into fixed-size chunks and fans
//! them out to write nodes:
//! - Framed TCP ingest with a completion barrier over shared counters
//! - Round-robin chunk dispatch across the configured write nodes
//! - Chunk metadata and secondary indices in a shared Redis store
//! - Per-ticket chunk files under a single-character split directory tree

pub mod barrier;
pub mod client;
pub mod error;
pub mod id_allocator;
pub mod node;
pub mod operations;
pub mod storage;
pub mod wire;

pub use barrier::CompletionBarrier;
pub use client::RouterClient;
pub use error::{PutterError, Result};
pub use id_allocator::{format_id, IdAllocator};
pub use node::{
    run_write_node, serve_write_node, write_node_app, NodeClientPool, NodeDeleteRequest,
    NodeDeleteResponse, NodeReadRequest, NodeReadResponse, NodeWriteRequest, NodeWriteResponse,
    WriteNodeClient, WriteNodeState, RPC_TIMEOUT, STATUS_FAILED, STATUS_OK,
};
pub use operations::{
    DeleteObjectOperation, DeleteObjectOperationResult, IngestObjectOperation,
    IngestObjectOperationResult, NodeRing, ReadObjectOperation, ReadTicketOperation,
};
pub use storage::{
    chunk_dir, chunk_file, chunk_path_components, ChunkStore, MetadataStore, ObjectState, Ticket,
    TicketState, TICKET_WINDOW_BYTES,
};
pub use wire::{
    decode_header, encode_ingest_header, FrameHeader, CHUNK_SIZE, DEFAULT_AUTHENTICITY_TOKEN,
    DELETE_SENTINEL, DELETE_TOKEN_LEN, FAILED_REPLY, ID_LEN,
};
