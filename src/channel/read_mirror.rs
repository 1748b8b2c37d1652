//! Informational mirror of read traffic (`sparql-read`).
//!
//! Every read operation's canonical text is offered to this channel,
//! fire-and-forget; its consumer only logs the traffic. Read execution never
//! waits on the mirror, and a full mirror drops rather than blocks.

use metrics::counter;
use tokio::sync::mpsc;

use super::QUEUE_SPARQL_READ;

#[derive(Clone)]
pub struct ReadMirror {
    tx: mpsc::Sender<String>,
}

impl ReadMirror {
    /// Spawn the logging consumer and return the publishing handle.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        tokio::spawn(async move {
            while let Some(query) = rx.recv().await {
                tracing::info!(queue = QUEUE_SPARQL_READ, query = %query, "receiving query");
            }
        });
        Self { tx }
    }

    pub fn publish(&self, query: &str) {
        match self.tx.try_send(query.to_string()) {
            Ok(()) => {
                counter!("read_mirror_published_total", "queue" => QUEUE_SPARQL_READ).increment(1)
            }
            Err(e) => {
                counter!("read_mirror_dropped_total", "queue" => QUEUE_SPARQL_READ).increment(1);
                tracing::debug!(error = %e, "read mirror unavailable, dropping");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_never_blocks_even_when_the_mirror_is_saturated() {
        let mirror = ReadMirror::spawn(1);
        // Far more publishes than capacity; every call must return
        // immediately, dropping overflow instead of waiting.
        for n in 0..1000 {
            mirror.publish(&format!("ASK {{ <urn:s:{n}> ?p ?o }}"));
        }
    }
}
