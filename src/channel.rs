// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! This module handles the creation of the AMQP connection and channel the
//! sweeper holds for the duration of one run. It establishes a named
//! connection to the RabbitMQ server with a bounded connect timeout and
//! creates a channel on that connection.

use std::{sync::Arc, time::Duration};

use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use tokio::time::timeout;
use tracing::{debug, error};

use crate::{config::ServerConfig, errors::SweepError};

/// Connection name shown in the broker's connection listing.
const CONNECTION_NAME: &str = "rabbitmq-sweeper";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates the AMQP connection and channel for one sweep run.
///
/// The connection URI comes from the server configuration, overridable
/// through the `AMQP_URL` environment variable. Both the connection and the
/// channel are wrapped in Arc so the messaging client and the shutdown path
/// can share them.
///
/// # Parameters
/// * `cfg` - Server configuration with host, credentials, and vhost
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), SweepError>` -
///   the connection and channel on success, or an error on failure.
pub async fn new_amqp_channel(
    cfg: &ServerConfig,
) -> Result<(Arc<Connection>, Arc<Channel>), SweepError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(CONNECTION_NAME));

    let uri = cfg.amqp_uri();

    let conn = match timeout(CONNECT_TIMEOUT, Connection::connect(&uri, options)).await {
        Ok(Ok(c)) => Ok(c),
        Ok(Err(err)) => {
            error!(error = err.to_string(), "failure to connect");
            Err(SweepError::ConnectionError)
        }
        Err(_) => {
            error!(
                timeout_secs = CONNECT_TIMEOUT.as_secs(),
                "timed out connecting to the broker"
            );
            Err(SweepError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            Err(SweepError::ChannelError)
        }
    }
}
