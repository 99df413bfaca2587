// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messaging-Protocol Client
//!
//! This module wraps the AMQP channel primitives the sweep workflows need:
//! queue depth inspection, bounded no-ack consumption, republishing through
//! the default exchange, and purging. The `Messaging` and `DrainStream`
//! traits form the seam the workflows are tested against.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::{
        BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions,
        QueuePurgeOptions,
    },
    types::FieldTable,
    BasicProperties, Channel, Consumer,
};
#[cfg(test)]
use mockall::automock;
use tracing::{debug, error};
use uuid::Uuid;

use crate::errors::SweepError;

/// Bounded stream of message bodies taken off a single queue.
///
/// Deliveries are consumed without acknowledgment, so the caller owns every
/// body it receives; nothing is requeued. The subscription is stopped
/// deterministically through `cancel`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DrainStream: Send {
    /// Takes the next message body off the queue.
    async fn next_message(&mut self) -> Result<Vec<u8>, SweepError>;

    /// Stops the subscription.
    async fn cancel(&mut self) -> Result<(), SweepError>;
}

/// Interface to the messaging-protocol side of the broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Messaging: Send + Sync {
    /// Returns the current message count of the queue.
    async fn queue_depth(&self, queue: &str) -> Result<u32, SweepError>;

    /// Opens a no-ack subscription on the queue.
    async fn open_drain(&self, queue: &str) -> Result<Box<dyn DrainStream>, SweepError>;

    /// Publishes a body to the default exchange under the given routing key.
    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), SweepError>;

    /// Discards the queue's entire backlog, returning the removed count.
    async fn purge(&self, queue: &str) -> Result<u32, SweepError>;
}

/// RabbitMQ implementation of the Messaging trait over a lapin channel.
pub struct RabbitMQMessaging {
    channel: Arc<Channel>,
}

impl RabbitMQMessaging {
    pub fn new(channel: Arc<Channel>) -> RabbitMQMessaging {
        RabbitMQMessaging { channel }
    }
}

#[async_trait]
impl Messaging for RabbitMQMessaging {
    async fn queue_depth(&self, queue: &str) -> Result<u32, SweepError> {
        // passive: inspect only, never redeclare with mismatched arguments
        let options = QueueDeclareOptions {
            passive: true,
            ..QueueDeclareOptions::default()
        };

        match self
            .channel
            .queue_declare(queue, options, FieldTable::default())
            .await
        {
            Ok(state) => Ok(state.message_count()),
            Err(err) => {
                error!(error = err.to_string(), queue, "failure to inspect queue");
                Err(SweepError::InspectQueueError(queue.to_owned()))
            }
        }
    }

    async fn open_drain(&self, queue: &str) -> Result<Box<dyn DrainStream>, SweepError> {
        let tag = format!("sweeper-{}", Uuid::new_v4());
        let options = BasicConsumeOptions {
            no_ack: true,
            ..BasicConsumeOptions::default()
        };

        match self
            .channel
            .basic_consume(queue, &tag, options, FieldTable::default())
            .await
        {
            Ok(consumer) => {
                debug!(queue, tag, "drain subscription opened");
                Ok(Box::new(RabbitMQDrain {
                    channel: self.channel.clone(),
                    consumer,
                    tag,
                    queue: queue.to_owned(),
                }))
            }
            Err(err) => {
                error!(error = err.to_string(), queue, "failure to declare consumer");
                Err(SweepError::BindingConsumerError(queue.to_owned()))
            }
        }
    }

    async fn publish(&self, routing_key: &str, body: &[u8]) -> Result<(), SweepError> {
        match self
            .channel
            .basic_publish(
                "",
                routing_key,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), routing_key, "error publishing message");
                Err(SweepError::DrainError(routing_key.to_owned()))
            }
            _ => Ok(()),
        }
    }

    async fn purge(&self, queue: &str) -> Result<u32, SweepError> {
        match self
            .channel
            .queue_purge(queue, QueuePurgeOptions::default())
            .await
        {
            Ok(count) => Ok(count),
            Err(err) => {
                error!(error = err.to_string(), queue, "failure to purge queue");
                Err(SweepError::PurgeError(queue.to_owned()))
            }
        }
    }
}

/// Live no-ack subscription on one queue.
struct RabbitMQDrain {
    channel: Arc<Channel>,
    consumer: Consumer,
    tag: String,
    queue: String,
}

#[async_trait]
impl DrainStream for RabbitMQDrain {
    async fn next_message(&mut self) -> Result<Vec<u8>, SweepError> {
        match self.consumer.next().await {
            Some(Ok(delivery)) => Ok(delivery.data),
            Some(Err(err)) => {
                error!(
                    error = err.to_string(),
                    queue = self.queue,
                    "failure to consume message"
                );
                Err(SweepError::ConsumerError(self.queue.clone()))
            }
            None => {
                error!(
                    queue = self.queue,
                    "consumer closed before the expected count was reached"
                );
                Err(SweepError::ConsumerError(self.queue.clone()))
            }
        }
    }

    async fn cancel(&mut self) -> Result<(), SweepError> {
        match self
            .channel
            .basic_cancel(&self.tag, BasicCancelOptions::default())
            .await
        {
            Ok(_) => {
                debug!(queue = self.queue, "drain subscription cancelled");
                Ok(())
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    queue = self.queue,
                    "failure to cancel consumer"
                );
                Err(SweepError::ConsumerError(self.queue.clone()))
            }
        }
    }
}
