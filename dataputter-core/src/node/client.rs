use crate::error::{PutterError, Result};
use crate::node::messages::{
    NodeDeleteRequest, NodeDeleteResponse, NodeReadRequest, NodeReadResponse, NodeWriteRequest,
    NodeWriteResponse, STATUS_OK,
};
use reqwest::StatusCode;
use std::time::Duration;

/// Per-call timeout for write node RPCs.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// RPC client for one write node, keyed by address. Connections are pooled
/// inside the shared HTTP client and live for the process lifetime.
#[derive(Clone)]
pub struct WriteNodeClient {
    address: String,
    http: reqwest::Client,
}

impl WriteNodeClient {
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self {
            address: address.into(),
            http,
        })
    }

    fn with_http(address: &str, http: reqwest::Client) -> Self {
        Self {
            address: address.to_string(),
            http,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn ticket_url(&self, ticket_id: &str) -> String {
        format!("http://{}/tickets/{}", self.address, ticket_id)
    }

    pub async fn write(&self, request: NodeWriteRequest) -> Result<NodeWriteResponse> {
        let response = self
            .http
            .put(self.ticket_url(&request.ticket_id))
            .query(&[("object_id", request.object_id.as_str())])
            .query(&[
                ("byte_start", request.byte_start),
                ("byte_end", request.byte_end),
                ("byte_count", request.byte_count),
            ])
            .body(request.data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PutterError::NodeRpc(format!(
                "write of ticket {} to {} returned {}",
                request.ticket_id,
                self.address,
                response.status()
            )));
        }

        let payload: NodeWriteResponse = response.json().await?;
        if payload.status != STATUS_OK {
            return Err(PutterError::NodeRpc(format!(
                "node {} failed to store ticket {} (status {})",
                self.address, request.ticket_id, payload.status
            )));
        }
        Ok(payload)
    }

    pub async fn read(&self, request: NodeReadRequest) -> Result<NodeReadResponse> {
        let response = self
            .http
            .get(self.ticket_url(&request.ticket_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PutterError::TicketNotFound(request.ticket_id));
        }
        if !response.status().is_success() {
            return Err(PutterError::NodeRpc(format!(
                "read of ticket {} from {} returned {}",
                request.ticket_id,
                self.address,
                response.status()
            )));
        }

        let data = response.bytes().await?;
        Ok(NodeReadResponse {
            ticket_id: request.ticket_id,
            data,
            status: STATUS_OK,
        })
    }

    pub async fn delete(&self, request: NodeDeleteRequest) -> Result<NodeDeleteResponse> {
        let response = self
            .http
            .delete(self.ticket_url(&request.ticket_id))
            .query(&[
                ("object_id", request.object_id.as_str()),
                ("node_id", request.node_id.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PutterError::NodeRpc(format!(
                "delete of ticket {} on {} returned {}",
                request.ticket_id,
                self.address,
                response.status()
            )));
        }

        let payload: NodeDeleteResponse = response.json().await?;
        if payload.status != STATUS_OK {
            return Err(PutterError::NodeRpc(format!(
                "node {} failed to delete ticket {} (status {})",
                self.address, request.ticket_id, payload.status
            )));
        }
        Ok(payload)
    }
}

/// Hands out write node clients over one shared HTTP connection pool.
pub struct NodeClientPool {
    http: reqwest::Client,
}

impl NodeClientPool {
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder().timeout(RPC_TIMEOUT).build()?;
        Ok(Self { http })
    }

    pub fn client_for(&self, address: &str) -> WriteNodeClient {
        WriteNodeClient::with_http(address, self.http.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_clients_keep_their_address() {
        let pool = NodeClientPool::new().unwrap();
        let first = pool.client_for("127.0.0.1:5002");
        let second = pool.client_for("127.0.0.1:5003");
        assert_eq!(first.address(), "127.0.0.1:5002");
        assert_eq!(second.address(), "127.0.0.1:5003");
    }

    #[test]
    fn test_ticket_url_shape() {
        let client = WriteNodeClient::new("127.0.0.1:5002").unwrap();
        assert_eq!(
            client.ticket_url("00000001"),
            "http://127.0.0.1:5002/tickets/00000001"
        );
    }
}
