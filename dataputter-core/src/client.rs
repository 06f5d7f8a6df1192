use crate::error::{PutterError, Result};
use crate::wire::{
    encode_ingest_header, DELETE_SENTINEL, DELETE_TOKEN_LEN, FAILED_REPLY, ID_LEN,
};
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Client side of the router wire protocol: upload, read back, and delete
/// objects over the three framed TCP surfaces.
pub struct RouterClient {
    ingest_addr: String,
    object_read_addr: String,
    ticket_read_addr: String,
}

impl RouterClient {
    pub fn new(
        ingest_addr: impl Into<String>,
        object_read_addr: impl Into<String>,
        ticket_read_addr: impl Into<String>,
    ) -> Self {
        Self {
            ingest_addr: ingest_addr.into(),
            object_read_addr: object_read_addr.into(),
            ticket_read_addr: ticket_read_addr.into(),
        }
    }

    /// Streams a payload to the router and returns the minted ObjectID.
    pub async fn put(&self, payload: &[u8]) -> Result<String> {
        let mut stream = TcpStream::connect(&self.ingest_addr).await?;
        stream
            .write_all(&encode_ingest_header(payload.len() as u64))
            .await?;
        stream.write_all(payload).await?;

        read_id_reply(&mut stream, "ingest").await
    }

    /// Reads an object's full body in byte order.
    pub async fn read(&self, object_id: &str) -> Result<Bytes> {
        let id = validate_id(object_id)?;
        let mut stream = TcpStream::connect(&self.object_read_addr).await?;
        stream.write_all(id).await?;

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await?;
        Ok(Bytes::from(body))
    }

    /// Reads a single chunk's bytes.
    pub async fn read_ticket(&self, ticket_id: &str) -> Result<Bytes> {
        let id = validate_id(ticket_id)?;
        let mut stream = TcpStream::connect(&self.ticket_read_addr).await?;
        stream.write_all(id).await?;

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await?;
        Ok(Bytes::from(body))
    }

    /// Deletes an object, authenticating with the preshared token.
    pub async fn delete(
        &self,
        object_id: &str,
        token: &[u8; DELETE_TOKEN_LEN],
    ) -> Result<String> {
        let id = validate_id(object_id)?;
        let mut stream = TcpStream::connect(&self.ingest_addr).await?;
        stream.write_all(&DELETE_SENTINEL).await?;
        stream.write_all(id).await?;
        stream.write_all(token).await?;

        read_id_reply(&mut stream, "delete").await
    }
}

fn validate_id(id: &str) -> Result<&[u8]> {
    let bytes = id.as_bytes();
    if bytes.len() != ID_LEN {
        return Err(PutterError::Framing(format!(
            "id '{}' must be exactly {} bytes",
            id, ID_LEN
        )));
    }
    Ok(bytes)
}

async fn read_id_reply(stream: &mut TcpStream, operation: &str) -> Result<String> {
    let mut reply = [0u8; ID_LEN];
    stream.read_exact(&mut reply).await.map_err(|_| {
        PutterError::Framing(format!(
            "router closed the connection without a {} reply",
            operation
        ))
    })?;

    if reply == FAILED_REPLY {
        return Err(PutterError::RouterFailure(format!("{} rejected", operation)));
    }
    String::from_utf8(reply.to_vec())
        .map_err(|_| PutterError::Framing("non-ASCII object id in reply".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::DEFAULT_AUTHENTICITY_TOKEN;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_read_rejects_malformed_id_before_connecting() {
        let client = RouterClient::new("127.0.0.1:1", "127.0.0.1:1", "127.0.0.1:1");
        assert!(matches!(
            client.read("short").await,
            Err(PutterError::Framing(_))
        ));
        assert!(matches!(
            client.read_ticket("toolongticketid").await,
            Err(PutterError::Framing(_))
        ));
    }

    #[tokio::test]
    async fn test_put_frames_header_then_payload() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0u8; ID_LEN];
            stream.read_exact(&mut header).await.unwrap();
            assert_eq!(u64::from_be_bytes(header), 11);

            let mut payload = vec![0u8; 11];
            stream.read_exact(&mut payload).await.unwrap();
            assert_eq!(&payload, b"hello chunk");

            stream.write_all(b"00000001").await.unwrap();
        });

        let client = RouterClient::new(address.clone(), address.clone(), address);
        let object_id = client.put(b"hello chunk").await.unwrap();
        assert_eq!(object_id, "00000001");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_frames_sentinel_id_and_token() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut frame = [0u8; ID_LEN + ID_LEN + DELETE_TOKEN_LEN];
            stream.read_exact(&mut frame).await.unwrap();
            assert_eq!(&frame[..ID_LEN], &DELETE_SENTINEL);
            assert_eq!(&frame[ID_LEN..2 * ID_LEN], b"00000007");
            assert_eq!(&frame[2 * ID_LEN..], &DEFAULT_AUTHENTICITY_TOKEN);

            stream.write_all(b"00000007").await.unwrap();
        });

        let client = RouterClient::new(address.clone(), address.clone(), address);
        let deleted = client
            .delete("00000007", &DEFAULT_AUTHENTICITY_TOKEN)
            .await
            .unwrap();
        assert_eq!(deleted, "00000007");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_reply_surfaces_as_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut header = [0u8; ID_LEN];
            stream.read_exact(&mut header).await.unwrap();
            stream.write_all(&FAILED_REPLY).await.unwrap();
        });

        let client = RouterClient::new(address.clone(), address.clone(), address);
        assert!(matches!(
            client.put(b"").await,
            Err(PutterError::RouterFailure(_))
        ));
    }
}
