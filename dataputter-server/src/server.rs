use crate::config::Config;
use dataputter_core::{
    decode_header, DeleteObjectOperation, FrameHeader, IdAllocator, IngestObjectOperation,
    MetadataStore, NodeClientPool, PutterError, ReadObjectOperation, ReadTicketOperation, Result,
    DELETE_TOKEN_LEN, FAILED_REPLY, ID_LEN,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Shared dependencies for the router listeners. The metadata store is
/// built once at process start and injected into every operation.
pub struct RouterState {
    metadata: MetadataStore,
    ids: IdAllocator,
    clients: Arc<NodeClientPool>,
    nodes: Vec<String>,
    delete_token: [u8; DELETE_TOKEN_LEN],
    barrier_timeout: Duration,
}

impl RouterState {
    pub fn new(
        metadata: MetadataStore,
        nodes: Vec<String>,
        delete_token: [u8; DELETE_TOKEN_LEN],
        barrier_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            ids: IdAllocator::new(metadata.clone()),
            clients: Arc::new(NodeClientPool::new()?),
            metadata,
            nodes,
            delete_token,
            barrier_timeout,
        })
    }
}

pub struct RouterListeners {
    pub ingest: TcpListener,
    pub object_read: TcpListener,
    pub ticket_read: TcpListener,
}

pub async fn bind_router(config: &Config) -> Result<RouterListeners> {
    let ingest = TcpListener::bind(&config.router.ingest_bind).await?;
    let object_read = TcpListener::bind(&config.router.object_read_bind).await?;
    let ticket_read = TcpListener::bind(&config.router.ticket_read_bind).await?;
    tracing::info!("Router ingest listening on {}", config.router.ingest_bind);
    tracing::info!(
        "Router object reads listening on {}",
        config.router.object_read_bind
    );
    tracing::info!(
        "Router ticket reads listening on {}",
        config.router.ticket_read_bind
    );
    Ok(RouterListeners {
        ingest,
        object_read,
        ticket_read,
    })
}

pub async fn run_router(config: Config, metadata: MetadataStore) -> Result<()> {
    let listeners = bind_router(&config).await?;
    let state = Arc::new(RouterState::new(
        metadata,
        config.router.nodes.clone(),
        config.router.delete_token_bytes()?,
        config.router.barrier_timeout(),
    )?);
    serve_router(listeners, state).await
}

pub async fn serve_router(listeners: RouterListeners, state: Arc<RouterState>) -> Result<()> {
    let RouterListeners {
        ingest,
        object_read,
        ticket_read,
    } = listeners;

    tokio::try_join!(
        accept_ingest(ingest, state.clone()),
        accept_object_reads(object_read, state.clone()),
        accept_ticket_reads(ticket_read, state),
    )?;
    Ok(())
}

async fn accept_ingest(listener: TcpListener, state: Arc<RouterState>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_ingest_connection(stream, state).await {
                tracing::warn!("Ingest connection from {} failed: {}", peer, error);
            }
        });
    }
}

async fn accept_object_reads(listener: TcpListener, state: Arc<RouterState>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_object_read(stream, state).await {
                tracing::warn!("Object read from {} failed: {}", peer, error);
            }
        });
    }
}

async fn accept_ticket_reads(listener: TcpListener, state: Arc<RouterState>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_ticket_read(stream, state).await {
                tracing::warn!("Ticket read from {} failed: {}", peer, error);
            }
        });
    }
}

/// A connection carries exactly one operation: an ingest announced by a
/// content-length header, or a delete announced by the sentinel.
async fn handle_ingest_connection(mut stream: TcpStream, state: Arc<RouterState>) -> Result<()> {
    let mut header = [0u8; ID_LEN];
    stream
        .read_exact(&mut header)
        .await
        .map_err(|_| PutterError::Framing("connection closed before the header".to_string()))?;

    match decode_header(header) {
        FrameHeader::Delete => handle_delete(stream, state).await,
        FrameHeader::Ingest { content_length } => {
            let operation = IngestObjectOperation::new(
                state.metadata.clone(),
                state.ids.clone(),
                state.clients.clone(),
                state.nodes.clone(),
                state.barrier_timeout,
            );
            match operation.run(&mut stream, content_length).await {
                Ok(result) => {
                    stream.write_all(result.object_id.as_bytes()).await?;
                    Ok(())
                }
                Err(error) => {
                    let _ = stream.write_all(&FAILED_REPLY).await;
                    Err(error)
                }
            }
        }
    }
}

async fn handle_delete(mut stream: TcpStream, state: Arc<RouterState>) -> Result<()> {
    let mut object_id = [0u8; ID_LEN];
    stream
        .read_exact(&mut object_id)
        .await
        .map_err(|_| PutterError::Framing("delete frame missing object id".to_string()))?;
    let mut token = [0u8; DELETE_TOKEN_LEN];
    stream
        .read_exact(&mut token)
        .await
        .map_err(|_| PutterError::Framing("delete frame missing token".to_string()))?;

    if token != state.delete_token {
        let _ = stream.write_all(&FAILED_REPLY).await;
        return Err(PutterError::AuthFailure);
    }

    let object_id = String::from_utf8(object_id.to_vec())
        .map_err(|_| PutterError::Framing("non-ASCII object id in delete frame".to_string()))?;

    let operation = DeleteObjectOperation::new(state.metadata.clone(), state.clients.clone());
    match operation.run(&object_id).await {
        Ok(result) => {
            stream.write_all(result.object_id.as_bytes()).await?;
            Ok(())
        }
        Err(error) => {
            let _ = stream.write_all(&FAILED_REPLY).await;
            Err(error)
        }
    }
}

/// Object reads reply with the raw body in byte order; a failed lookup
/// closes the connection with no data.
async fn handle_object_read(mut stream: TcpStream, state: Arc<RouterState>) -> Result<()> {
    let mut object_id = [0u8; ID_LEN];
    stream
        .read_exact(&mut object_id)
        .await
        .map_err(|_| PutterError::Framing("read frame missing object id".to_string()))?;
    let object_id = String::from_utf8(object_id.to_vec())
        .map_err(|_| PutterError::Framing("non-ASCII object id in read frame".to_string()))?;

    let operation = ReadObjectOperation::new(state.metadata.clone(), state.clients.clone());
    operation.run(&object_id, &mut stream).await?;
    Ok(())
}

async fn handle_ticket_read(mut stream: TcpStream, state: Arc<RouterState>) -> Result<()> {
    let mut ticket_id = [0u8; ID_LEN];
    stream
        .read_exact(&mut ticket_id)
        .await
        .map_err(|_| PutterError::Framing("read frame missing ticket id".to_string()))?;
    let ticket_id = String::from_utf8(ticket_id.to_vec())
        .map_err(|_| PutterError::Framing("non-ASCII ticket id in read frame".to_string()))?;

    let operation = ReadTicketOperation::new(state.metadata.clone(), state.clients.clone());
    let data = operation.run(&ticket_id).await?;
    stream.write_all(&data).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataputter_core::{
        serve_write_node, ChunkStore, RouterClient, WriteNodeState, CHUNK_SIZE,
        DEFAULT_AUTHENTICITY_TOKEN,
    };

    async fn spawn_write_node(data_root: &std::path::Path) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let state = Arc::new(WriteNodeState {
            chunk_store: ChunkStore::new(data_root).unwrap(),
            node_id: address.clone(),
        });
        tokio::spawn(async move {
            serve_write_node(listener, state).await.unwrap();
        });
        address
    }

    async fn spawn_router(nodes: Vec<String>, metadata: MetadataStore) -> RouterClient {
        let listeners = RouterListeners {
            ingest: tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap(),
            object_read: tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap(),
            ticket_read: tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap(),
        };
        let client = RouterClient::new(
            listeners.ingest.local_addr().unwrap().to_string(),
            listeners.object_read.local_addr().unwrap().to_string(),
            listeners.ticket_read.local_addr().unwrap().to_string(),
        );
        let state = Arc::new(
            RouterState::new(
                metadata,
                nodes,
                DEFAULT_AUTHENTICITY_TOKEN,
                Duration::from_secs(5),
            )
            .unwrap(),
        );
        tokio::spawn(async move {
            serve_router(listeners, state).await.unwrap();
        });
        client
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_ingest_read_delete_round_trip() {
        let metadata = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let node = spawn_write_node(temp_dir.path()).await;
        let client = spawn_router(vec![node], metadata.clone()).await;

        // 1451 bytes: one full chunk plus a single trailing byte.
        let mut payload = vec![3u8; CHUNK_SIZE];
        payload.push(9u8);

        let object_id = client.put(&payload).await.unwrap();
        assert_eq!(object_id.len(), 8);
        assert_eq!(
            metadata.get_object_size(&object_id).await.unwrap(),
            payload.len() as i64
        );
        let tickets = metadata.get_object_tickets(&object_id).await.unwrap();
        assert_eq!(tickets.len(), 2);

        let mut sizes: Vec<i64> = Vec::new();
        for ticket_id in &tickets {
            sizes.push(metadata.get_ticket_size(ticket_id).await.unwrap());
        }
        sizes.sort();
        assert_eq!(sizes, vec![1, CHUNK_SIZE as i64]);

        let body = client.read(&object_id).await.unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());

        let deleted = client
            .delete(&object_id, &DEFAULT_AUTHENTICITY_TOKEN)
            .await
            .unwrap();
        assert_eq!(deleted, object_id);
        assert!(!metadata.object_exists(&object_id).await.unwrap());
        assert!(metadata
            .get_object_tickets(&object_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_two_nodes_round_robin() {
        let metadata = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let first_dir = tempfile::tempdir().unwrap();
        let second_dir = tempfile::tempdir().unwrap();
        let first = spawn_write_node(first_dir.path()).await;
        let second = spawn_write_node(second_dir.path()).await;
        let client = spawn_router(vec![first.clone(), second.clone()], metadata.clone()).await;

        let payload = vec![5u8; CHUNK_SIZE * 2];
        let object_id = client.put(&payload).await.unwrap();

        let mut nodes = metadata.get_object_nodes(&object_id).await.unwrap();
        nodes.sort();
        let mut expected = vec![first, second];
        expected.sort();
        assert_eq!(nodes, expected);

        let body = client.read(&object_id).await.unwrap();
        assert_eq!(body.len(), payload.len());
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_delete_with_bad_token_is_rejected() {
        let metadata = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let node = spawn_write_node(temp_dir.path()).await;
        let client = spawn_router(vec![node], metadata.clone()).await;

        let object_id = client.put(b"hold on to this").await.unwrap();

        let result = client.delete(&object_id, b"WrongSharedToken").await;
        assert!(result.is_err());

        // Metadata is untouched and the object still reads back.
        assert!(metadata.object_exists(&object_id).await.unwrap());
        let body = client.read(&object_id).await.unwrap();
        assert_eq!(body.as_ref(), b"hold on to this");
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_zero_length_ingest_is_rejected() {
        let metadata = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let node = spawn_write_node(temp_dir.path()).await;
        let client = spawn_router(vec![node], metadata).await;

        assert!(client.put(b"").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_single_chunk_offsets() {
        let metadata = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let temp_dir = tempfile::tempdir().unwrap();
        let node = spawn_write_node(temp_dir.path()).await;
        let client = spawn_router(vec![node], metadata.clone()).await;

        let payload = vec![1u8; CHUNK_SIZE];
        let object_id = client.put(&payload).await.unwrap();

        let tickets = metadata.get_object_tickets(&object_id).await.unwrap();
        assert_eq!(tickets.len(), 1);
        let ticket = metadata.get_ticket(&tickets[0]).await.unwrap();
        assert_eq!(ticket.byte_start, 0);
        assert_eq!(ticket.byte_end, CHUNK_SIZE as i64);
        assert_eq!(ticket.byte_count, CHUNK_SIZE as i64);

        let chunk = client.read_ticket(&tickets[0]).await.unwrap();
        assert_eq!(chunk.len(), CHUNK_SIZE);
    }
}
