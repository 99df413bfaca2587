// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Dead-Letter Provisioning
//!
//! This module derives the dead-letter names for a source queue and makes
//! sure the supporting infrastructure exists: the per-vhost dead-letter
//! exchange, the per-queue dead-letter queue, the binding between them, and
//! the TTL/length/mirroring policy on the source queue.
//!
//! Every step is check-then-create, so re-running against the same broker
//! state issues no additional create calls. There is no rollback on partial
//! failure; re-invocation is the recovery path.

use tracing::{debug, info};

use crate::{admin::BrokerAdmin, config::PoliciesConfig, errors::SweepError};

/// Names of the dead-letter infrastructure serving one source queue.
///
/// Derived, never persisted: the exchange is shared per vhost, the queue is
/// per source queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterPath {
    pub exchange: String,
    pub queue: String,
}

impl DeadLetterPath {
    /// Derives the dead-letter names for a queue.
    ///
    /// A pure function of the configured prefixes, the vhost, and the queue
    /// name, so repeated runs always address the same infrastructure.
    pub fn derive(policies: &PoliciesConfig, vhost: &str, queue: &str) -> DeadLetterPath {
        DeadLetterPath {
            exchange: format!("{}.{}", policies.dead_letter_exchange, vhost),
            queue: format!("{}.{}", policies.dead_letter_routing_key, queue),
        }
    }
}

/// Makes sure the queue's dead-letter path exists, creating what is missing.
///
/// The dead-letter queue is the gate: when it already exists the whole path
/// is considered provisioned and no further management calls are made. When
/// it is missing, the exchange is created if absent, then the queue, the
/// binding (routing key equal to the dead-letter queue name), and the policy
/// on the source queue.
pub async fn ensure_dead_letter_path(
    admin: &dyn BrokerAdmin,
    vhost: &str,
    queue: &str,
    policies: &PoliciesConfig,
) -> Result<DeadLetterPath, SweepError> {
    let path = DeadLetterPath::derive(policies, vhost, queue);

    if admin.queue_exists(vhost, &path.queue).await? {
        debug!(vhost, queue = path.queue, "dead letter path already provisioned");
        return Ok(path);
    }

    if !admin.exchange_exists(vhost, &path.exchange).await? {
        info!(vhost, exchange = path.exchange, "dead letter exchange missing, creating");
        admin.create_exchange(vhost, &path.exchange).await?;
    }

    info!(vhost, queue = path.queue, "creating dead letter queue");
    admin.create_queue(vhost, &path.queue).await?;
    admin.create_binding(vhost, &path.exchange, &path.queue).await?;

    info!(vhost, queue, "applying ttl and dead letter policy");
    admin.put_policy(vhost, queue, &path, policies).await?;

    Ok(path)
}
