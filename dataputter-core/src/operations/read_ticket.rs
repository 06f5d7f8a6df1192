use crate::error::Result;
use crate::node::{NodeClientPool, NodeReadRequest};
use crate::storage::MetadataStore;
use bytes::Bytes;
use std::sync::Arc;

/// Fetches a single chunk's bytes by TicketID: resolve the owning node,
/// read the chunk from it.
pub struct ReadTicketOperation {
    metadata: MetadataStore,
    clients: Arc<NodeClientPool>,
}

impl ReadTicketOperation {
    pub fn new(metadata: MetadataStore, clients: Arc<NodeClientPool>) -> Self {
        Self { metadata, clients }
    }

    pub async fn run(&self, ticket_id: &str) -> Result<Bytes> {
        let node_id = self.metadata.get_ticket_node(ticket_id).await?;
        let client = self.clients.client_for(&node_id);
        let response = client
            .read(NodeReadRequest {
                ticket_id: ticket_id.to_string(),
            })
            .await?;
        Ok(response.data)
    }
}
