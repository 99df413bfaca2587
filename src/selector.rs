// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Selection
//!
//! Pure filter over the queue listing snapshot: a queue is eligible for
//! cleanup when nobody is consuming from it and it is not itself a
//! dead-letter queue. Excluding dead-letter queues prevents the sweeper from
//! provisioning dead-letter paths for its own dead-letter queues on the next
//! run.

use std::collections::BTreeMap;

use crate::{admin::QueueInfo, config::PoliciesConfig};

/// Filters the listing down to the name→vhost map of queues to sweep.
///
/// The returned map iterates in name order, so a run processes queues in a
/// reproducible order regardless of how the broker ordered the listing.
pub fn select_eligible_queues(
    all_queues: &[QueueInfo],
    policies: &PoliciesConfig,
) -> BTreeMap<String, String> {
    all_queues
        .iter()
        .filter(|queue| {
            queue.consumers == 0 && !queue.name.contains(&policies.dead_letter_routing_key)
        })
        .map(|queue| (queue.name.clone(), queue.vhost.clone()))
        .collect()
}
