// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Sweep Orchestration
//!
//! This module runs one bounded pass over a vhost's queues: snapshot the
//! listing, select the abandoned queues, and for each one provision its
//! dead-letter path and then apply the terminal operation — drain the
//! backlog through the dead-letter path, or purge it.
//!
//! A failure on one queue is logged and counted; the remaining queues are
//! still processed. Only the initial listing is fatal for the run.

use tracing::{debug, error, info};

use crate::{
    admin::BrokerAdmin,
    config::PoliciesConfig,
    errors::SweepError,
    messaging::Messaging,
    provisioner::{ensure_dead_letter_path, DeadLetterPath},
    selector::select_eligible_queues,
};

/// Terminal operation applied to each selected queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepMode {
    /// Republish the backlog through the dead-letter path.
    Drain,
    /// Discard the backlog.
    Purge,
}

/// Outcome of one sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub swept: usize,
    pub failed: usize,
    /// Messages drained or purged across all swept queues.
    pub messages: u64,
}

/// One-shot sweep over the queues of a single vhost.
pub struct Sweeper<A, M> {
    admin: A,
    messaging: M,
    policies: PoliciesConfig,
}

impl<A, M> Sweeper<A, M>
where
    A: BrokerAdmin,
    M: Messaging,
{
    pub fn new(admin: A, messaging: M, policies: PoliciesConfig) -> Sweeper<A, M> {
        Sweeper {
            admin,
            messaging,
            policies,
        }
    }

    /// Runs one bounded pass in the given mode.
    ///
    /// The queue listing is snapshotted once up front; queues created during
    /// the pass (the dead-letter queues themselves) are not revisited until
    /// the next run, where the selector's name filter excludes them.
    pub async fn run(&self, mode: SweepMode) -> Result<SweepSummary, SweepError> {
        let all_queues = self.admin.list_queues().await?;
        let targets = select_eligible_queues(&all_queues, &self.policies);
        info!(count = targets.len(), "eligible queues selected");

        let mut summary = SweepSummary::default();
        for (queue, vhost) in &targets {
            match self.sweep_queue(vhost, queue, mode).await {
                Ok(messages) => {
                    summary.swept += 1;
                    summary.messages += u64::from(messages);
                }
                Err(err) => {
                    error!(vhost, queue, error = err.to_string(), "failure to sweep queue");
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn sweep_queue(
        &self,
        vhost: &str,
        queue: &str,
        mode: SweepMode,
    ) -> Result<u32, SweepError> {
        let path = ensure_dead_letter_path(&self.admin, vhost, queue, &self.policies).await?;

        match mode {
            SweepMode::Drain => self.drain(queue, &path).await,
            SweepMode::Purge => self.purge(queue).await,
        }
    }

    /// Transfers exactly the backlog observed at the start of the drain.
    ///
    /// The countdown bounds the transfer to the depth read before consuming;
    /// messages arriving mid-drain stay on the queue for the next run. A
    /// republish failure stops this queue's drain; whatever was already
    /// republished stays on the dead-letter queue and the remainder is
    /// picked up by a re-run.
    async fn drain(&self, queue: &str, path: &DeadLetterPath) -> Result<u32, SweepError> {
        let depth = self.messaging.queue_depth(queue).await?;
        if depth == 0 {
            debug!(queue, "queue is empty, nothing to drain");
            return Ok(0);
        }

        info!(queue, depth, dead_letter_queue = path.queue, "draining queue");
        let mut stream = self.messaging.open_drain(queue).await?;

        let mut remaining = depth;
        while remaining > 0 {
            let body = stream.next_message().await?;
            self.messaging.publish(&path.queue, &body).await?;
            remaining -= 1;
        }

        stream.cancel().await?;
        Ok(depth)
    }

    async fn purge(&self, queue: &str) -> Result<u32, SweepError> {
        let removed = self.messaging.purge(queue).await?;
        info!(queue, removed, "queue purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        admin::{MockBrokerAdmin, QueueInfo},
        errors::ProvisioningStep,
        messaging::{DrainStream, MockDrainStream, MockMessaging},
    };

    fn policies() -> PoliciesConfig {
        PoliciesConfig {
            dead_letter_exchange: "dlx".to_owned(),
            dead_letter_routing_key: "dlx.retry".to_owned(),
            message_ttl: 300_000,
            max_length: 10_000,
            expires: 1_800_000,
            ha_mode: "all".to_owned(),
            ha_sync_mode: "automatic".to_owned(),
        }
    }

    fn queue(name: &str, consumers: u32, messages: u32) -> QueueInfo {
        QueueInfo {
            name: name.to_owned(),
            vhost: "prod".to_owned(),
            consumers,
            messages,
        }
    }

    #[tokio::test]
    async fn drains_exactly_the_observed_depth() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("orders.retry", 0, 3)]));
        admin
            .expect_queue_exists()
            .withf(|vhost, queue| vhost == "prod" && queue == "dlx.retry.orders.retry")
            .times(1)
            .returning(|_, _| Ok(true));

        let mut messaging = MockMessaging::new();
        messaging
            .expect_queue_depth()
            .withf(|queue| queue == "orders.retry")
            .times(1)
            .returning(|_| Ok(3));

        let mut stream = MockDrainStream::new();
        stream
            .expect_next_message()
            .times(3)
            .returning(|| Ok(b"payload".to_vec()));
        stream.expect_cancel().times(1).returning(|| Ok(()));
        messaging
            .expect_open_drain()
            .withf(|queue| queue == "orders.retry")
            .times(1)
            .return_once(move |_| Ok(Box::new(stream) as Box<dyn DrainStream>));

        messaging
            .expect_publish()
            .withf(|key, body| key == "dlx.retry.orders.retry" && body == b"payload".as_slice())
            .times(3)
            .returning(|_, _| Ok(()));

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Drain).await.unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                swept: 1,
                failed: 0,
                messages: 3,
            }
        );
    }

    #[tokio::test]
    async fn empty_queue_opens_no_subscription() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("orders.retry", 0, 0)]));
        admin
            .expect_queue_exists()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut messaging = MockMessaging::new();
        messaging.expect_queue_depth().times(1).returning(|_| Ok(0));
        messaging.expect_open_drain().never();
        messaging.expect_publish().never();

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Drain).await.unwrap();

        assert_eq!(summary.swept, 1);
        assert_eq!(summary.messages, 0);
    }

    #[tokio::test]
    async fn publish_failure_stops_that_queue_only() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("alpha", 0, 2), queue("beta", 0, 1)]));
        admin
            .expect_queue_exists()
            .times(2)
            .returning(|_, _| Ok(true));

        let mut messaging = MockMessaging::new();
        messaging
            .expect_queue_depth()
            .withf(|queue| queue == "alpha")
            .times(1)
            .returning(|_| Ok(2));
        messaging
            .expect_queue_depth()
            .withf(|queue| queue == "beta")
            .times(1)
            .returning(|_| Ok(1));

        // alpha: the first republish fails, the drain stops without cancel
        let mut alpha_stream = MockDrainStream::new();
        alpha_stream
            .expect_next_message()
            .times(1)
            .returning(|| Ok(b"lost".to_vec()));
        alpha_stream.expect_cancel().never();
        messaging
            .expect_open_drain()
            .withf(|queue| queue == "alpha")
            .times(1)
            .return_once(move |_| Ok(Box::new(alpha_stream) as Box<dyn DrainStream>));
        messaging
            .expect_publish()
            .withf(|key, _| key == "dlx.retry.alpha")
            .times(1)
            .returning(|key, _| Err(SweepError::DrainError(key.to_owned())));

        let mut beta_stream = MockDrainStream::new();
        beta_stream
            .expect_next_message()
            .times(1)
            .returning(|| Ok(b"ok".to_vec()));
        beta_stream.expect_cancel().times(1).returning(|| Ok(()));
        messaging
            .expect_open_drain()
            .withf(|queue| queue == "beta")
            .times(1)
            .return_once(move |_| Ok(Box::new(beta_stream) as Box<dyn DrainStream>));
        messaging
            .expect_publish()
            .withf(|key, _| key == "dlx.retry.beta")
            .times(1)
            .returning(|_, _| Ok(()));

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Drain).await.unwrap();

        assert_eq!(summary.swept, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.messages, 1);
    }

    #[tokio::test]
    async fn purge_mode_discards_the_backlog() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("orders.retry", 0, 5)]));
        admin
            .expect_queue_exists()
            .times(1)
            .returning(|_, _| Ok(true));

        let mut messaging = MockMessaging::new();
        messaging
            .expect_purge()
            .withf(|queue| queue == "orders.retry")
            .times(1)
            .returning(|_| Ok(5));
        messaging.expect_open_drain().never();
        messaging.expect_publish().never();

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Purge).await.unwrap();

        assert_eq!(
            summary,
            SweepSummary {
                swept: 1,
                failed: 0,
                messages: 5,
            }
        );
    }

    #[tokio::test]
    async fn provisioning_failure_isolates_the_queue() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("alpha", 0, 1), queue("beta", 0, 2)]));
        admin
            .expect_queue_exists()
            .withf(|_, queue| queue == "dlx.retry.alpha")
            .times(1)
            .returning(|_, queue| {
                Err(SweepError::ProvisioningError {
                    step: ProvisioningStep::Queue,
                    name: queue.to_owned(),
                    status: 503,
                })
            });
        admin
            .expect_queue_exists()
            .withf(|_, queue| queue == "dlx.retry.beta")
            .times(1)
            .returning(|_, _| Ok(true));

        let mut messaging = MockMessaging::new();
        messaging
            .expect_purge()
            .withf(|queue| queue == "beta")
            .times(1)
            .returning(|_| Ok(2));

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Purge).await.unwrap();

        assert_eq!(summary.swept, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.messages, 2);
    }

    #[tokio::test]
    async fn queues_with_consumers_trigger_no_broker_mutation() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Ok(vec![queue("busy", 1, 10)]));
        admin.expect_queue_exists().never();

        let mut messaging = MockMessaging::new();
        messaging.expect_queue_depth().never();
        messaging.expect_purge().never();

        let sweeper = Sweeper::new(admin, messaging, policies());
        let summary = sweeper.run(SweepMode::Drain).await.unwrap();

        assert_eq!(summary, SweepSummary::default());
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_run() {
        let mut admin = MockBrokerAdmin::new();
        admin
            .expect_list_queues()
            .times(1)
            .returning(|| Err(SweepError::ListQueuesError(503)));

        let sweeper = Sweeper::new(admin, MockMessaging::new(), policies());
        let err = sweeper.run(SweepMode::Drain).await.unwrap_err();

        assert_eq!(err, SweepError::ListQueuesError(503));
    }
}
