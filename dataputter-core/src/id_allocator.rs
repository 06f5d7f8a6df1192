use crate::error::Result;
use crate::storage::MetadataStore;

const OBJECT_ID_COUNTER_KEY: &str = "objectIDCounter";
const TICKET_ID_COUNTER_KEY: &str = "ticketIDCounter";

/// Zero-pads a counter value to the 8-digit ASCII ID form.
pub fn format_id(value: i64) -> String {
    format!("{:08}", value)
}

/// Mints ObjectIDs and TicketIDs from atomic counters in the metadata
/// store. IDs are monotonic and never reused within the store's lifetime.
/// A counter failure aborts the caller before any unnamed object exists.
#[derive(Clone)]
pub struct IdAllocator {
    store: MetadataStore,
}

impl IdAllocator {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    pub async fn next_object_id(&self) -> Result<String> {
        let value = self.store.increment_counter(OBJECT_ID_COUNTER_KEY).await?;
        Ok(format_id(value))
    }

    pub async fn next_ticket_id(&self) -> Result<String> {
        let value = self.store.increment_counter(TICKET_ID_COUNTER_KEY).await?;
        Ok(format_id(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_id_width() {
        assert_eq!(format_id(1), "00000001");
        assert_eq!(format_id(42), "00000042");
        assert_eq!(format_id(99_999_999), "99999999");
    }

    #[test]
    fn test_format_id_is_ordered() {
        let mut previous = format_id(0);
        for value in 1..1000 {
            let id = format_id(value);
            assert_eq!(id.len(), 8);
            assert!(id > previous);
            previous = id;
        }
    }

    #[tokio::test]
    #[ignore = "requires a running redis at localhost:6379"]
    async fn test_parallel_ticket_ids_are_distinct() {
        let store = MetadataStore::connect("redis://localhost:6379")
            .await
            .unwrap();
        let ids = IdAllocator::new(store);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ids = ids.clone();
            handles.push(tokio::spawn(async move {
                ids.next_ticket_id().await.unwrap()
            }));
        }

        let mut minted = Vec::new();
        for handle in handles {
            minted.push(handle.await.unwrap());
        }
        minted.sort();
        minted.dedup();
        assert_eq!(minted.len(), 16);
        assert!(minted.iter().all(|id| id.len() == 8));
    }
}
