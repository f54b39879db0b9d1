//! AMQP event-bus relay for outbound notices

use crate::error::{EloServiceError, Result};
use crate::relay::messages::{
    NotificationEnvelope, AVAILABILITY_UPDATED_ROUTING_KEY, ELO_UPDATED_ROUTING_KEY,
    JOB_CLAIMED_ROUTING_KEY, RATINGS_EVENTS_EXCHANGE,
};
use crate::relay::{
    AvailabilityUpdatedNotice, EloUpdatedNotice, JobClaimedNotice, NotificationRelay,
};
use amqprs::{
    channel::{BasicPublishArguments, Channel, ExchangeDeclareArguments},
    BasicProperties,
};
use async_trait::async_trait;
use tracing::{debug, info};

/// AMQP topic-exchange relay
///
/// Publishes exactly once per notice. The callers own the fire-and-forget
/// contract: a publish failure is reported upward to be logged, never
/// retried here.
pub struct AmqpEventRelay {
    channel: Channel,
    exchange: String,
}

impl AmqpEventRelay {
    /// Create a relay and declare its topic exchange
    pub async fn new(channel: Channel, exchange: Option<String>) -> Result<Self> {
        let exchange = exchange.unwrap_or_else(|| RATINGS_EVENTS_EXCHANGE.to_string());

        let args = ExchangeDeclareArguments::new(&exchange, "topic");
        channel.exchange_declare(args).await.map_err(|e| {
            EloServiceError::TransientExternal {
                message: format!("Failed to declare events exchange: {}", e),
            }
        })?;

        info!("Declared AMQP topic exchange '{}'", exchange);
        Ok(Self { channel, exchange })
    }

    async fn publish<T>(&self, envelope: &NotificationEnvelope<T>) -> Result<()>
    where
        T: serde::Serialize + serde::de::DeserializeOwned,
    {
        let payload = envelope.to_bytes()?;

        let args = BasicPublishArguments::new(&self.exchange, &envelope.routing_key);
        let mut properties = BasicProperties::default();
        properties
            .with_message_id(&envelope.correlation_id)
            .with_timestamp(envelope.timestamp.timestamp() as u64)
            .with_content_type("application/json");

        self.channel
            .basic_publish(properties, payload, args)
            .await
            .map_err(|e| EloServiceError::TransientExternal {
                message: format!("Failed to publish notification: {}", e),
            })?;

        debug!(
            "Published message {} to {} with key {}",
            envelope.correlation_id, self.exchange, envelope.routing_key
        );
        Ok(())
    }
}

#[async_trait]
impl NotificationRelay for AmqpEventRelay {
    async fn elo_updated(&self, notice: EloUpdatedNotice) -> Result<()> {
        let envelope = NotificationEnvelope::new(notice, ELO_UPDATED_ROUTING_KEY.to_string());
        self.publish(&envelope).await
    }

    async fn job_claimed(&self, notice: JobClaimedNotice) -> Result<()> {
        let envelope = NotificationEnvelope::new(notice, JOB_CLAIMED_ROUTING_KEY.to_string());
        self.publish(&envelope).await
    }

    async fn availability_updated(&self, notice: AvailabilityUpdatedNotice) -> Result<()> {
        let envelope =
            NotificationEnvelope::new(notice, AVAILABILITY_UPDATED_ROUTING_KEY.to_string());
        self.publish(&envelope).await
    }
}
