use crate::error::{PutterError, Result};
use crate::node::messages::{NodeDeleteResponse, NodeWriteResponse, STATUS_FAILED, STATUS_OK};
use crate::storage::ChunkStore;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;

/// State shared by the write node handlers. The write node never consults
/// the metadata store; chunks on one node are independent.
pub struct WriteNodeState {
    pub chunk_store: ChunkStore,
    pub node_id: String,
}

#[derive(Debug, Deserialize)]
struct WriteTicketQuery {
    object_id: String,
    byte_start: i64,
    byte_end: i64,
    byte_count: i64,
}

#[derive(Debug, Deserialize)]
struct DeleteTicketQuery {
    object_id: String,
}

pub fn write_node_app(state: Arc<WriteNodeState>) -> Router {
    Router::new()
        .route(
            "/tickets/:ticket_id",
            get(read_ticket).put(write_ticket).delete(delete_ticket),
        )
        .with_state(state)
}

pub async fn run_write_node(bind_addr: &str, state: Arc<WriteNodeState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("Write node listening on {}", bind_addr);
    serve_write_node(listener, state).await
}

/// Serves the write node on an already-bound listener.
pub async fn serve_write_node(
    listener: tokio::net::TcpListener,
    state: Arc<WriteNodeState>,
) -> Result<()> {
    axum::serve(listener, write_node_app(state))
        .await
        .map_err(PutterError::from)?;
    Ok(())
}

async fn write_ticket(
    State(state): State<Arc<WriteNodeState>>,
    Path(ticket_id): Path<String>,
    Query(query): Query<WriteTicketQuery>,
    body: Bytes,
) -> impl IntoResponse {
    let status = match state.chunk_store.write_chunk(&ticket_id, &body).await {
        Ok(()) => STATUS_OK,
        Err(error) => {
            tracing::warn!("Failed to write chunk for ticket {}: {}", ticket_id, error);
            STATUS_FAILED
        }
    };

    Json(NodeWriteResponse {
        object_id: query.object_id,
        ticket_id,
        node_id: state.node_id.clone(),
        byte_start: query.byte_start,
        byte_end: query.byte_end,
        byte_count: query.byte_count,
        status,
    })
}

async fn read_ticket(
    State(state): State<Arc<WriteNodeState>>,
    Path(ticket_id): Path<String>,
) -> Response {
    match state.chunk_store.read_chunk(&ticket_id).await {
        Ok(data) => (StatusCode::OK, data).into_response(),
        Err(PutterError::TicketNotFound(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(error) => {
            tracing::warn!("Failed to read chunk for ticket {}: {}", ticket_id, error);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn delete_ticket(
    State(state): State<Arc<WriteNodeState>>,
    Path(ticket_id): Path<String>,
    Query(query): Query<DeleteTicketQuery>,
) -> impl IntoResponse {
    let status = match state.chunk_store.delete_chunk(&ticket_id).await {
        Ok(()) => {
            tracing::debug!(
                "Deleted chunk for ticket {} of object {}",
                ticket_id,
                query.object_id
            );
            STATUS_OK
        }
        Err(error) => {
            tracing::warn!("Failed to delete chunk for ticket {}: {}", ticket_id, error);
            STATUS_FAILED
        }
    };

    Json(NodeDeleteResponse { status })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::client::WriteNodeClient;
    use crate::node::messages::{NodeDeleteRequest, NodeReadRequest, NodeWriteRequest};

    async fn spawn_node(data_root: &std::path::Path) -> String {
        let state = Arc::new(WriteNodeState {
            chunk_store: ChunkStore::new(data_root).unwrap(),
            node_id: "test-node".to_string(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            serve_write_node(listener, state).await.unwrap();
        });
        address
    }

    #[tokio::test]
    async fn test_write_read_delete_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let address = spawn_node(temp_dir.path()).await;
        let client = WriteNodeClient::new(&address).unwrap();

        let response = client
            .write(NodeWriteRequest {
                object_id: "00000001".to_string(),
                ticket_id: "00000002".to_string(),
                byte_start: 0,
                byte_end: 21,
                byte_count: 21,
                data: Bytes::from_static(b"so much data to write"),
            })
            .await
            .unwrap();
        assert_eq!(response.status, STATUS_OK);
        assert_eq!(response.byte_end, 21);
        assert_eq!(response.node_id, "test-node");

        let read = client
            .read(NodeReadRequest {
                ticket_id: "00000002".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(read.data.as_ref(), b"so much data to write");

        let deleted = client
            .delete(NodeDeleteRequest {
                object_id: "00000001".to_string(),
                ticket_id: "00000002".to_string(),
                node_id: address.clone(),
            })
            .await
            .unwrap();
        assert_eq!(deleted.status, STATUS_OK);
        assert!(!chunk_file_exists(temp_dir.path(), "00000002"));

        assert!(matches!(
            client
                .read(NodeReadRequest {
                    ticket_id: "00000002".to_string(),
                })
                .await,
            Err(PutterError::TicketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_absent_ticket_succeeds() {
        let temp_dir = tempfile::tempdir().unwrap();
        let address = spawn_node(temp_dir.path()).await;
        let client = WriteNodeClient::new(&address).unwrap();

        let deleted = client
            .delete(NodeDeleteRequest {
                object_id: "00000001".to_string(),
                ticket_id: "00000099".to_string(),
                node_id: address,
            })
            .await
            .unwrap();
        assert_eq!(deleted.status, STATUS_OK);
    }

    fn chunk_file_exists(data_root: &std::path::Path, ticket_id: &str) -> bool {
        crate::storage::chunk_file(data_root, ticket_id).exists()
    }
}
