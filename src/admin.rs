// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Management API Client
//!
//! This module wraps the broker's management HTTP API. It provides the queue
//! listing the selector works from, the 200/404 existence checks the
//! provisioner relies on, and the create calls for exchanges, queues,
//! bindings, and policies.
//!
//! Every existence check treats HTTP 200 as "exists" and 404 as "absent";
//! any other status surfaces as a `ProvisioningError` carrying the failed
//! step and status code.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    config::{encode_vhost, PoliciesConfig, ServerConfig},
    errors::{ProvisioningStep, SweepError},
    provisioner::DeadLetterPath,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Priority above the broker default of 0.
const POLICY_PRIORITY: u8 = 10;

/// Snapshot of one queue as reported by `GET /api/queues`.
///
/// Immutable for the duration of one run; the listing is never refreshed
/// mid-pass.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueueInfo {
    pub name: String,
    pub vhost: String,
    pub consumers: u32,
    pub messages: u32,
}

/// Interface to the management HTTP API.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerAdmin: Send + Sync {
    /// Lists every queue visible to the configured credentials.
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, SweepError>;

    /// Checks whether a queue exists in the vhost.
    async fn queue_exists(&self, vhost: &str, queue: &str) -> Result<bool, SweepError>;

    /// Checks whether an exchange exists in the vhost.
    async fn exchange_exists(&self, vhost: &str, exchange: &str) -> Result<bool, SweepError>;

    /// Creates a direct, durable, non-auto-delete exchange.
    async fn create_exchange(&self, vhost: &str, exchange: &str) -> Result<(), SweepError>;

    /// Creates a durable, non-auto-delete queue.
    async fn create_queue(&self, vhost: &str, queue: &str) -> Result<(), SweepError>;

    /// Binds the queue to the exchange using the queue name as routing key.
    async fn create_binding(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
    ) -> Result<(), SweepError>;

    /// Applies the dead-letter policy for the given source queue.
    async fn put_policy(
        &self,
        vhost: &str,
        queue: &str,
        path: &DeadLetterPath,
        policies: &PoliciesConfig,
    ) -> Result<(), SweepError>;
}

/// RabbitMQ implementation of the BrokerAdmin trait over the management
/// HTTP API with basic authentication.
pub struct RabbitMQAdmin {
    client: Client,
    base_url: String,
    user: String,
    password: String,
}

impl RabbitMQAdmin {
    pub fn new(cfg: &ServerConfig) -> Result<RabbitMQAdmin, SweepError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| {
                error!(error = err.to_string(), "failure to build the admin http client");
                SweepError::ConnectionError
            })?;

        Ok(RabbitMQAdmin {
            client,
            base_url: cfg.admin_base_url(),
            user: cfg.user.clone(),
            password: cfg.password.clone(),
        })
    }

    fn queue_url(&self, vhost: &str, queue: &str) -> String {
        format!("{}/queues/{}/{}", self.base_url, encode_vhost(vhost), queue)
    }

    fn exchange_url(&self, vhost: &str, exchange: &str) -> String {
        format!(
            "{}/exchanges/{}/{}",
            self.base_url,
            encode_vhost(vhost),
            exchange
        )
    }

    async fn resource_exists(
        &self,
        url: String,
        step: ProvisioningStep,
        name: &str,
    ) -> Result<bool, SweepError> {
        debug!(url, "verifying resource existence");

        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|err| {
                error!(error = err.to_string(), url, "management api unreachable");
                SweepError::ConnectionError
            })?;

        match resp.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(SweepError::ProvisioningError {
                step,
                name: name.to_owned(),
                status: status.as_u16(),
            }),
        }
    }

    async fn create_resource(
        &self,
        method: reqwest::Method,
        url: String,
        body: serde_json::Value,
        step: ProvisioningStep,
        name: &str,
    ) -> Result<(), SweepError> {
        debug!(url, "creating resource");

        let resp = self
            .client
            .request(method, &url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                error!(error = err.to_string(), url, "management api unreachable");
                SweepError::ConnectionError
            })?;

        if !resp.status().is_success() {
            error!(
                status = resp.status().as_u16(),
                url, "management api rejected the create call"
            );
            return Err(SweepError::ProvisioningError {
                step,
                name: name.to_owned(),
                status: resp.status().as_u16(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl BrokerAdmin for RabbitMQAdmin {
    async fn list_queues(&self) -> Result<Vec<QueueInfo>, SweepError> {
        let url = format!("{}/queues", self.base_url);
        debug!(url, "listing queues");

        let resp = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .map_err(|err| {
                error!(error = err.to_string(), url, "management api unreachable");
                SweepError::ConnectionError
            })?;

        if !resp.status().is_success() {
            error!(status = resp.status().as_u16(), "failure to list queues");
            return Err(SweepError::ListQueuesError(resp.status().as_u16()));
        }

        resp.json::<Vec<QueueInfo>>().await.map_err(|err| {
            error!(error = err.to_string(), "failure to parse the queue listing");
            SweepError::ParsePayloadError
        })
    }

    async fn queue_exists(&self, vhost: &str, queue: &str) -> Result<bool, SweepError> {
        self.resource_exists(self.queue_url(vhost, queue), ProvisioningStep::Queue, queue)
            .await
    }

    async fn exchange_exists(&self, vhost: &str, exchange: &str) -> Result<bool, SweepError> {
        self.resource_exists(
            self.exchange_url(vhost, exchange),
            ProvisioningStep::Exchange,
            exchange,
        )
        .await
    }

    async fn create_exchange(&self, vhost: &str, exchange: &str) -> Result<(), SweepError> {
        let body = serde_json::json!({
            "type": "direct",
            "auto_delete": false,
            "durable": true,
        });

        self.create_resource(
            reqwest::Method::PUT,
            self.exchange_url(vhost, exchange),
            body,
            ProvisioningStep::Exchange,
            exchange,
        )
        .await
    }

    async fn create_queue(&self, vhost: &str, queue: &str) -> Result<(), SweepError> {
        let body = serde_json::json!({
            "auto_delete": false,
            "durable": true,
        });

        self.create_resource(
            reqwest::Method::PUT,
            self.queue_url(vhost, queue),
            body,
            ProvisioningStep::Queue,
            queue,
        )
        .await
    }

    async fn create_binding(
        &self,
        vhost: &str,
        exchange: &str,
        queue: &str,
    ) -> Result<(), SweepError> {
        let url = format!(
            "{}/bindings/{}/e/{}/q/{}",
            self.base_url,
            encode_vhost(vhost),
            exchange,
            queue
        );
        let body = serde_json::json!({ "routing_key": queue });

        self.create_resource(reqwest::Method::POST, url, body, ProvisioningStep::Binding, queue)
            .await
    }

    async fn put_policy(
        &self,
        vhost: &str,
        queue: &str,
        path: &DeadLetterPath,
        policies: &PoliciesConfig,
    ) -> Result<(), SweepError> {
        let url = format!(
            "{}/policies/{}/default-policy-{}",
            self.base_url,
            encode_vhost(vhost),
            queue
        );
        let body = serde_json::json!({
            "pattern": format!("^{queue}"),
            "definition": {
                "message-ttl": policies.message_ttl,
                "dead-letter-exchange": path.exchange,
                "dead-letter-routing-key": path.queue,
                "max-length": policies.max_length,
                "expires": policies.expires,
                "ha-mode": policies.ha_mode,
                "ha-sync-mode": policies.ha_sync_mode,
            },
            "priority": POLICY_PRIORITY,
            "apply-to": "queues",
        });

        self.create_resource(reqwest::Method::PUT, url, body, ProvisioningStep::Policy, queue)
            .await
    }
}
