//! Distributor error taxonomy, §7.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DistributorError {
    /// A `guaranteed` subscription's queue exceeded its high-watermark;
    /// the subscription is closed, not merely drained.
    #[error("slow-consumer: client {client_id} exceeded high-watermark {highwatermark}")]
    SlowConsumer { client_id: String, highwatermark: usize },

    /// `max_clients` subscriptions are already active.
    #[error("at capacity: {max_clients} clients already subscribed")]
    AtCapacity { max_clients: usize },

    /// `unsubscribe`/`publish` referenced a client id with no active
    /// subscription.
    #[error("unknown client: {0}")]
    UnknownClient(String),
}
