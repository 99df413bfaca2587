// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Queue Sweeper
//!
//! This module provides the set of error types for sweep operations.
//! The `SweepError` enum represents all failure scenarios that can occur during
//! configuration loading, broker connection, dead-letter provisioning, and
//! drain or purge handling.

use std::fmt;

use thiserror::Error;

/// Represents errors that can occur during a sweep run.
///
/// This enum covers all failure scenarios for one pass over a vhost's queues:
/// configuration problems, connection and channel issues, management API
/// provisioning failures, and the drain/purge terminal operations. Each
/// variant provides specific context about what operation failed.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SweepError {
    /// Missing or malformed configuration, raised before any broker contact
    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    /// Error establishing a connection to the broker
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// The management API rejected the queue listing request
    #[error("failure to list queues: status `{0}`")]
    ListQueuesError(u16),

    /// A provisioning call for the dead-letter path failed
    #[error("failure to provision {step} `{name}`: status `{status}`")]
    ProvisioningError {
        step: ProvisioningStep,
        name: String,
        status: u16,
    },

    /// Error parsing a management API response body
    #[error("failure to parse payload")]
    ParsePayloadError,

    /// Error inspecting the depth of the given queue
    #[error("failure to inspect queue `{0}`")]
    InspectQueueError(String),

    /// Error binding a consumer to the given queue
    #[error("failure to declare consumer on queue `{0}`")]
    BindingConsumerError(String),

    /// Error consuming a message from the given queue
    #[error("failure to consume message from queue `{0}`")]
    ConsumerError(String),

    /// Error republishing a drained message to the given dead-letter queue
    #[error("failure to republish to dead letter queue `{0}`")]
    DrainError(String),

    /// Error purging the given queue
    #[error("failure to purge queue `{0}`")]
    PurgeError(String),
}

/// The dead-letter infrastructure element a provisioning call was creating
/// or checking when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningStep {
    Exchange,
    Queue,
    Binding,
    Policy,
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningStep::Exchange => write!(f, "exchange"),
            ProvisioningStep::Queue => write!(f, "queue"),
            ProvisioningStep::Binding => write!(f, "binding"),
            ProvisioningStep::Policy => write!(f, "policy"),
        }
    }
}
