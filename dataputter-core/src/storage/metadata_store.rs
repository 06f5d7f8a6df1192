use crate::error::{PutterError, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

/// ZRANGEBYSCORE window used when enumerating tickets by byte offset.
pub const TICKET_WINDOW_BYTES: i64 = 512 * 1024;

const OBJECTS_SET_KEY: &str = "objects";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    New,
    Saved,
    Error,
}

impl TicketState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketState::New => "new",
            TicketState::Saved => "saved",
            TicketState::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(TicketState::New),
            "saved" => Some(TicketState::Saved),
            "error" => Some(TicketState::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    New,
    Writing,
    Saved,
    Error,
}

impl ObjectState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectState::New => "new",
            ObjectState::Writing => "writing",
            ObjectState::Saved => "saved",
            ObjectState::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(ObjectState::New),
            "writing" => Some(ObjectState::Writing),
            "saved" => Some(ObjectState::Saved),
            "error" => Some(ObjectState::Error),
            _ => None,
        }
    }
}

/// One chunk's metadata record.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub ticket_id: String,
    pub object_id: String,
    pub node_id: String,
    pub byte_start: i64,
    pub byte_end: i64,
    pub byte_count: i64,
    pub status: Option<TicketState>,
}

fn object_key(object_id: &str, field: &str) -> String {
    format!("/objects/{}/{}", object_id, field)
}

fn ticket_key(ticket_id: &str, field: &str) -> String {
    format!("/tickets/{}/{}", ticket_id, field)
}

fn object_tickets_key(object_id: &str) -> String {
    format!("objectTickets/{}", object_id)
}

fn object_nodes_key(object_id: &str) -> String {
    format!("objectNodes/{}", object_id)
}

fn object_bytes_key(object_id: &str) -> String {
    format!("objectBytes/{}", object_id)
}

const TICKET_FIELDS: [&str; 7] = [
    "ticket",
    "object",
    "node",
    "byteStart",
    "byteEnd",
    "byteCount",
    "status",
];

/// Typed adapter over the shared metadata store. All mutations go through
/// the store's atomic primitives; each key has exactly one logical writer.
#[derive(Clone)]
pub struct MetadataStore {
    conn: MultiplexedConnection,
}

impl MetadataStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|error| PutterError::Config(format!("invalid metadata url {}: {}", url, error)))?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }

    fn conn(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    pub(crate) async fn increment_counter(&self, key: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    /// Registers a new object under its first ticket. Idempotent for a
    /// repeated (object, ticket) pair.
    pub async fn create_object(&self, object_id: &str, first_ticket_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .set(
                object_key(object_id, &format!("tickets/{}", first_ticket_id)),
                first_ticket_id,
            )
            .await?;
        let _: () = conn.sadd(OBJECTS_SET_KEY, object_id).await?;
        let _: () = conn
            .set(object_key(object_id, "status"), ObjectState::New.as_str())
            .await?;
        Ok(())
    }

    /// Writes all ticket fields and the secondary indices. The ticket status
    /// is left unset; the caller sets it once the chunk is durable.
    pub async fn create_ticket(
        &self,
        ticket_id: &str,
        object_id: &str,
        node_id: &str,
        byte_start: i64,
        byte_end: i64,
        byte_count: i64,
    ) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.set(ticket_key(ticket_id, "ticket"), ticket_id).await?;
        let _: () = conn.set(ticket_key(ticket_id, "object"), object_id).await?;
        let _: () = conn.set(ticket_key(ticket_id, "node"), node_id).await?;
        let _: () = conn
            .set(ticket_key(ticket_id, "byteStart"), byte_start)
            .await?;
        let _: () = conn.set(ticket_key(ticket_id, "byteEnd"), byte_end).await?;
        let _: () = conn
            .set(ticket_key(ticket_id, "byteCount"), byte_count)
            .await?;
        let _: () = conn
            .zadd(object_bytes_key(object_id), ticket_id, byte_start)
            .await?;
        let _: () = conn
            .sadd(object_tickets_key(object_id), ticket_id)
            .await?;
        let _: () = conn.sadd(object_nodes_key(object_id), node_id).await?;
        Ok(())
    }

    pub async fn set_object_status(&self, object_id: &str, status: ObjectState) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .set(object_key(object_id, "status"), status.as_str())
            .await?;
        Ok(())
    }

    pub async fn set_ticket_status(&self, ticket_id: &str, status: TicketState) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn
            .set(ticket_key(ticket_id, "status"), status.as_str())
            .await?;
        Ok(())
    }

    pub async fn set_object_byte_size(&self, object_id: &str, size: i64) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.set(object_key(object_id, "size"), size).await?;
        Ok(())
    }

    pub async fn touch_ticket_counter(&self, object_id: &str) -> Result<i64> {
        self.increment_counter(&object_key(object_id, "ticketCounter"))
            .await
    }

    pub async fn touch_write_counter(&self, object_id: &str) -> Result<i64> {
        self.increment_counter(&object_key(object_id, "writeCounter"))
            .await
    }

    pub async fn reduce_ticket_counter(&self, object_id: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: i64 = conn.decr(object_key(object_id, "ticketCounter"), 1).await?;
        Ok(value)
    }

    pub async fn get_ticket_counter_value(&self, object_id: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: Option<i64> = conn.get(object_key(object_id, "ticketCounter")).await?;
        Ok(value.unwrap_or(0))
    }

    pub async fn get_write_counter_value(&self, object_id: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: Option<i64> = conn.get(object_key(object_id, "writeCounter")).await?;
        Ok(value.unwrap_or(0))
    }

    pub async fn get_object_status(&self, object_id: &str) -> Result<Option<ObjectState>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(object_key(object_id, "status")).await?;
        Ok(value.as_deref().and_then(ObjectState::parse))
    }

    pub async fn get_ticket_status(&self, ticket_id: &str) -> Result<Option<TicketState>> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(ticket_key(ticket_id, "status")).await?;
        Ok(value.as_deref().and_then(TicketState::parse))
    }

    pub async fn get_ticket_node(&self, ticket_id: &str) -> Result<String> {
        let mut conn = self.conn();
        let value: Option<String> = conn.get(ticket_key(ticket_id, "node")).await?;
        value.ok_or_else(|| PutterError::TicketNotFound(ticket_id.to_string()))
    }

    pub async fn get_ticket_size(&self, ticket_id: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: Option<i64> = conn.get(ticket_key(ticket_id, "byteCount")).await?;
        value.ok_or_else(|| PutterError::TicketNotFound(ticket_id.to_string()))
    }

    pub async fn get_object_size(&self, object_id: &str) -> Result<i64> {
        let mut conn = self.conn();
        let value: Option<i64> = conn.get(object_key(object_id, "size")).await?;
        value.ok_or_else(|| PutterError::ObjectNotFound(object_id.to_string()))
    }

    pub async fn object_exists(&self, object_id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let member: bool = conn.sismember(OBJECTS_SET_KEY, object_id).await?;
        Ok(member)
    }

    pub async fn get_object_tickets(&self, object_id: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let tickets: Vec<String> = conn.smembers(object_tickets_key(object_id)).await?;
        Ok(tickets)
    }

    /// TicketIDs whose byteStart falls within `[offset, offset + 512 KiB]`,
    /// in file order.
    pub async fn get_tickets_from_offset(
        &self,
        object_id: &str,
        offset: i64,
    ) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let tickets: Vec<String> = conn
            .zrangebyscore(
                object_bytes_key(object_id),
                offset,
                offset + TICKET_WINDOW_BYTES,
            )
            .await?;
        Ok(tickets)
    }

    /// Full ticket record, as written by `create_ticket`.
    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Ticket> {
        let mut conn = self.conn();
        let stored: Option<String> = conn.get(ticket_key(ticket_id, "ticket")).await?;
        if stored.is_none() {
            return Err(PutterError::TicketNotFound(ticket_id.to_string()));
        }

        let object_id: Option<String> = conn.get(ticket_key(ticket_id, "object")).await?;
        let node_id: Option<String> = conn.get(ticket_key(ticket_id, "node")).await?;
        let byte_start: Option<i64> = conn.get(ticket_key(ticket_id, "byteStart")).await?;
        let byte_end: Option<i64> = conn.get(ticket_key(ticket_id, "byteEnd")).await?;
        let byte_count: Option<i64> = conn.get(ticket_key(ticket_id, "byteCount")).await?;
        let status: Option<String> = conn.get(ticket_key(ticket_id, "status")).await?;

        Ok(Ticket {
            ticket_id: ticket_id.to_string(),
            object_id: object_id.unwrap_or_default(),
            node_id: node_id.unwrap_or_default(),
            byte_start: byte_start.unwrap_or(0),
            byte_end: byte_end.unwrap_or(0),
            byte_count: byte_count.unwrap_or(0),
            status: status.as_deref().and_then(TicketState::parse),
        })
    }

    /// Removes one ticket's record and index entries. Refused unless the
    /// ticket has reached the saved state: its chunk must be gone from the
    /// node before the record may disappear.
    pub async fn delete_ticket(&self, object_id: &str, ticket_id: &str) -> Result<()> {
        match self.get_ticket_status(ticket_id).await? {
            Some(TicketState::Saved) => {}
            _ => return Err(PutterError::TicketNotSaved(ticket_id.to_string())),
        }

        let mut conn = self.conn();
        let _: () = conn
            .srem(object_tickets_key(object_id), ticket_id)
            .await?;
        let _: () = conn.zrem(object_bytes_key(object_id), ticket_id).await?;
        let _: () = conn
            .del(object_key(object_id, &format!("tickets/{}", ticket_id)))
            .await?;
        for field in TICKET_FIELDS {
            let _: () = conn.del(ticket_key(ticket_id, field)).await?;
        }
        Ok(())
    }

    /// Removes every object-scoped key and the object's membership in the
    /// global set. Ticket rows are expected to already be gone.
    pub async fn delete_object_reference(&self, object_id: &str) -> Result<()> {
        let mut conn = self.conn();
        for field in ["status", "size", "ticketCounter", "writeCounter"] {
            let _: () = conn.del(object_key(object_id, field)).await?;
        }
        let _: () = conn.del(object_tickets_key(object_id)).await?;
        let _: () = conn.del(object_nodes_key(object_id)).await?;
        let _: () = conn.del(object_bytes_key(object_id)).await?;
        let _: () = conn.srem(OBJECTS_SET_KEY, object_id).await?;
        Ok(())
    }

    pub async fn get_object_nodes(&self, object_id: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let nodes: Vec<String> = conn.smembers(object_nodes_key(object_id)).await?;
        Ok(nodes)
    }
}
