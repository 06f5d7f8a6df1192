use crate::error::{PutterError, Result};
use crate::node::{NodeClientPool, NodeReadRequest};
use crate::storage::MetadataStore;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Streams an object's chunks to a writer in byte order, windowing the
/// ticket enumeration by byteStart offset.
pub struct ReadObjectOperation {
    metadata: MetadataStore,
    clients: Arc<NodeClientPool>,
}

impl ReadObjectOperation {
    pub fn new(metadata: MetadataStore, clients: Arc<NodeClientPool>) -> Self {
        Self { metadata, clients }
    }

    /// Writes the full object body and returns the number of bytes streamed.
    pub async fn run<W>(&self, object_id: &str, writer: &mut W) -> Result<i64>
    where
        W: AsyncWrite + Unpin,
    {
        let size = self.metadata.get_object_size(object_id).await?;
        let mut offset: i64 = 0;

        while offset < size {
            let tickets = self
                .metadata
                .get_tickets_from_offset(object_id, offset)
                .await?;
            if tickets.is_empty() {
                return Err(PutterError::Metadata(format!(
                    "object {} has no ticket covering offset {}",
                    object_id, offset
                )));
            }

            for ticket_id in tickets {
                let ticket = self.metadata.get_ticket(&ticket_id).await?;
                let client = self.clients.client_for(&ticket.node_id);
                let response = client
                    .read(NodeReadRequest {
                        ticket_id: ticket_id.clone(),
                    })
                    .await?;
                writer.write_all(&response.data).await?;
                offset = ticket.byte_end;
            }
        }

        writer.flush().await?;
        tracing::debug!("Streamed {} bytes of object {}", offset, object_id);
        Ok(offset)
    }
}
