pub mod delete_object;
pub mod ingest_object;
pub mod read_object;
pub mod read_ticket;

pub use delete_object::{DeleteObjectOperation, DeleteObjectOperationResult};
pub use ingest_object::{IngestObjectOperation, IngestObjectOperationResult, NodeRing};
pub use read_object::ReadObjectOperation;
pub use read_ticket::ReadTicketOperation;
