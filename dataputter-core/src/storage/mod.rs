//! Storage modules for DataPutter.
//!
//! Provides the metadata store adapter and write-node chunk file storage.

pub mod chunk_store;
pub mod metadata_store;

pub use chunk_store::{chunk_dir, chunk_file, chunk_path_components, ChunkStore};
pub use metadata_store::{
    MetadataStore, ObjectState, Ticket, TicketState, TICKET_WINDOW_BYTES,
};
