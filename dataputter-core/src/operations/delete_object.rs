use crate::error::{PutterError, Result};
use crate::node::{NodeClientPool, NodeDeleteRequest};
use crate::storage::{MetadataStore, Ticket};
use std::sync::Arc;

/// Deletes an object: every chunk is removed from its write node, then the
/// ticket rows, and finally the object reference itself once the ticket
/// counter drains to zero.
pub struct DeleteObjectOperation {
    metadata: MetadataStore,
    clients: Arc<NodeClientPool>,
}

#[derive(Debug, Clone)]
pub struct DeleteObjectOperationResult {
    pub object_id: String,
    pub deleted_tickets: Vec<Ticket>,
}

impl DeleteObjectOperation {
    pub fn new(metadata: MetadataStore, clients: Arc<NodeClientPool>) -> Self {
        Self { metadata, clients }
    }

    pub async fn run(&self, object_id: &str) -> Result<DeleteObjectOperationResult> {
        if !self.metadata.object_exists(object_id).await? {
            return Err(PutterError::ObjectNotFound(object_id.to_string()));
        }

        let tickets = self.metadata.get_object_tickets(object_id).await?;
        let mut deleted_tickets = Vec::with_capacity(tickets.len());

        for ticket_id in tickets {
            let ticket = self.metadata.get_ticket(&ticket_id).await?;
            let client = self.clients.client_for(&ticket.node_id);
            client
                .delete(NodeDeleteRequest {
                    object_id: object_id.to_string(),
                    ticket_id: ticket_id.clone(),
                    node_id: ticket.node_id.clone(),
                })
                .await?;

            self.metadata.delete_ticket(object_id, &ticket_id).await?;
            let remaining = self.metadata.reduce_ticket_counter(object_id).await?;
            tracing::debug!(
                "Deleted chunk {} of object {} from {} ({} tickets remain)",
                ticket_id,
                object_id,
                ticket.node_id,
                remaining
            );
            deleted_tickets.push(ticket);

            if remaining <= 0 {
                self.metadata.delete_object_reference(object_id).await?;
                tracing::info!(
                    "All tickets of object {} deleted, reference removed",
                    object_id
                );
            }
        }

        Ok(DeleteObjectOperationResult {
            object_id: object_id.to_string(),
            deleted_tickets,
        })
    }
}
