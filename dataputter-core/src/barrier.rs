use crate::error::{PutterError, Result};
use crate::storage::MetadataStore;
use std::time::Duration;
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// An ingest is durable once every assigned ticket has a confirmed write.
fn counters_match(tickets: i64, writes: i64) -> bool {
    tickets > 0 && tickets == writes
}

#[derive(Debug, Clone, Copy, Default)]
struct Progress {
    tickets: i64,
    writes: i64,
}

/// Completion barrier for one ingest. The dispatch path records each
/// assigned ticket and each confirmed write inline; `wait` releases once
/// `ticketCounter == writeCounter > 0` holds in the metadata store. A slow
/// poll of the store backs up the in-process signal for writes confirmed
/// elsewhere.
pub struct CompletionBarrier {
    progress: watch::Sender<Progress>,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(Progress::default());
        Self { progress }
    }

    pub fn record_ticket(&self) {
        self.progress.send_modify(|p| p.tickets += 1);
    }

    pub fn record_write(&self) {
        self.progress.send_modify(|p| p.writes += 1);
    }

    /// Blocks until the barrier releases or the deadline elapses. The
    /// metadata store stays authoritative: a local match is always
    /// confirmed against the stored counters before releasing.
    pub async fn wait(
        &self,
        store: &MetadataStore,
        object_id: &str,
        deadline: Duration,
    ) -> Result<()> {
        let mut observed = self.progress.subscribe();
        let mut poll = tokio::time::interval(POLL_INTERVAL);

        let released = async {
            loop {
                let local = *observed.borrow_and_update();
                if counters_match(local.tickets, local.writes)
                    && self.confirm(store, object_id).await?
                {
                    return Ok(());
                }

                tokio::select! {
                    _ = observed.changed() => {}
                    _ = poll.tick() => {
                        if self.confirm(store, object_id).await? {
                            return Ok(());
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(deadline, released).await {
            Ok(result) => result,
            Err(_) => Err(PutterError::CompletionTimeout(object_id.to_string())),
        }
    }

    async fn confirm(&self, store: &MetadataStore, object_id: &str) -> Result<bool> {
        let tickets = store.get_ticket_counter_value(object_id).await?;
        if tickets == 0 {
            return Ok(false);
        }
        let writes = store.get_write_counter_value(object_id).await?;
        Ok(counters_match(tickets, writes))
    }
}

impl Default for CompletionBarrier {
    fn default() -> Self {
        Self::new()
    }
}
