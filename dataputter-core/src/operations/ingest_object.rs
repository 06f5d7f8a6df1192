use crate::barrier::CompletionBarrier;
use crate::error::{PutterError, Result};
use crate::id_allocator::IdAllocator;
use crate::node::{NodeClientPool, NodeWriteRequest};
use crate::storage::{MetadataStore, ObjectState, TicketState};
use crate::wire::CHUNK_SIZE;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Per-ingest round-robin selector over the configured write nodes.
/// The cursor is local to one ingest and never shared.
#[derive(Debug)]
pub struct NodeRing {
    nodes: Vec<String>,
    next: usize,
}

impl NodeRing {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes, next: 0 }
    }

    pub fn next_node(&mut self) -> String {
        let index = self.next;
        self.next = (index + 1) % self.nodes.len();
        self.nodes[index].clone()
    }
}

/// Ingests one blob from a framed connection: slices the stream into
/// chunks, fans them out round-robin across the write nodes, and records
/// the chunk map so the object can be read back in order.
pub struct IngestObjectOperation {
    metadata: MetadataStore,
    ids: IdAllocator,
    clients: Arc<NodeClientPool>,
    nodes: Vec<String>,
    barrier_deadline: Duration,
}

#[derive(Debug, Clone)]
pub struct IngestObjectOperationResult {
    pub object_id: String,
    pub byte_count: i64,
    pub ticket_count: i64,
}

impl IngestObjectOperation {
    pub fn new(
        metadata: MetadataStore,
        ids: IdAllocator,
        clients: Arc<NodeClientPool>,
        nodes: Vec<String>,
        barrier_deadline: Duration,
    ) -> Self {
        Self {
            metadata,
            ids,
            clients,
            nodes,
            barrier_deadline,
        }
    }

    pub async fn run<R>(
        &self,
        reader: &mut R,
        content_length: u64,
    ) -> Result<IngestObjectOperationResult>
    where
        R: AsyncRead + Unpin,
    {
        if content_length == 0 {
            return Err(PutterError::Framing(
                "zero-length ingest is not accepted".to_string(),
            ));
        }
        let total = i64::try_from(content_length)
            .map_err(|_| PutterError::Framing("content length exceeds i64".to_string()))?;
        if self.nodes.is_empty() {
            return Err(PutterError::Config(
                "no write nodes configured".to_string(),
            ));
        }

        let object_id = self.ids.next_object_id().await?;
        let first_ticket_id = self.ids.next_ticket_id().await?;
        self.metadata
            .create_object(&object_id, &first_ticket_id)
            .await?;
        self.metadata
            .set_object_status(&object_id, ObjectState::Writing)
            .await?;

        match self.ingest(reader, total, &object_id, first_ticket_id).await {
            Ok(result) => Ok(result),
            Err(error) => {
                if let Err(status_error) = self
                    .metadata
                    .set_object_status(&object_id, ObjectState::Error)
                    .await
                {
                    tracing::warn!(
                        "Failed to mark object {} as errored: {}",
                        object_id,
                        status_error
                    );
                }
                Err(error)
            }
        }
    }

    async fn ingest<R>(
        &self,
        reader: &mut R,
        total: i64,
        object_id: &str,
        first_ticket_id: String,
    ) -> Result<IngestObjectOperationResult>
    where
        R: AsyncRead + Unpin,
    {
        let barrier = CompletionBarrier::new();
        let mut ring = NodeRing::new(self.nodes.clone());
        let mut pending_ticket = Some(first_ticket_id);
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset: i64 = 0;
        let mut ticket_count: i64 = 0;

        while offset < total {
            let want = CHUNK_SIZE.min((total - offset) as usize);
            let n = read_full(reader, &mut buf[..want]).await?;
            if n == 0 {
                return Err(PutterError::Framing(format!(
                    "connection closed after {} of {} bytes",
                    offset, total
                )));
            }

            let ticket_id = match pending_ticket.take() {
                Some(ticket_id) => ticket_id,
                None => self.ids.next_ticket_id().await?,
            };
            let data = Bytes::copy_from_slice(&buf[..n]);
            self.dispatch_chunk(object_id, &ticket_id, offset, data, &mut ring, &barrier)
                .await?;
            offset += n as i64;
            ticket_count += 1;

            if n < want {
                return Err(PutterError::Framing(format!(
                    "connection closed after {} of {} bytes",
                    offset, total
                )));
            }
        }

        barrier
            .wait(&self.metadata, object_id, self.barrier_deadline)
            .await?;
        self.metadata.set_object_byte_size(object_id, total).await?;
        self.metadata
            .set_object_status(object_id, ObjectState::Saved)
            .await?;
        tracing::info!(
            "Ingested object {} ({} bytes over {} tickets)",
            object_id,
            total,
            ticket_count
        );

        Ok(IngestObjectOperationResult {
            object_id: object_id.to_string(),
            byte_count: total,
            ticket_count,
        })
    }

    /// The ticket counter advances strictly before the write RPC; the write
    /// counter and ticket record land strictly after it returns.
    async fn dispatch_chunk(
        &self,
        object_id: &str,
        ticket_id: &str,
        byte_start: i64,
        data: Bytes,
        ring: &mut NodeRing,
        barrier: &CompletionBarrier,
    ) -> Result<()> {
        let byte_count = data.len() as i64;
        let byte_end = byte_start + byte_count;
        let node_id = ring.next_node();

        self.metadata.touch_ticket_counter(object_id).await?;
        barrier.record_ticket();

        let client = self.clients.client_for(&node_id);
        let response = client
            .write(NodeWriteRequest {
                object_id: object_id.to_string(),
                ticket_id: ticket_id.to_string(),
                byte_start,
                byte_end,
                byte_count,
                data,
            })
            .await?;

        self.metadata
            .create_ticket(
                ticket_id,
                object_id,
                &node_id,
                response.byte_start,
                response.byte_end,
                response.byte_count,
            )
            .await?;
        self.metadata
            .set_ticket_status(ticket_id, TicketState::Saved)
            .await?;
        self.metadata.touch_write_counter(object_id).await?;
        barrier.record_write();

        tracing::debug!(
            "Chunk {} of object {} persisted on {} ({}..{})",
            ticket_id,
            object_id,
            node_id,
            byte_start,
            byte_end
        );
        Ok(())
    }
}

/// Reads until the buffer is full or the stream reaches EOF. Returns the
/// number of bytes read, which is short only at EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
