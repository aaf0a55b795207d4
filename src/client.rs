//! Replication client: bootstraps a [`ParamStore`] from a param server and
//! optionally keeps it in sync with the server's later snapshots.

use crate::error::ParamError;
use crate::lexer::DEFAULT_MAX_TOKEN_LEN;
use crate::parser::ParseOptions;
use crate::store::{ParamStore, UpdateOutcome};
use crate::transport::{
    ParamRequest, ParamUpdate, SubscriptionId, Transport, PARAM_REQUEST_CHANNEL,
    PARAM_UPDATE_CHANNEL,
};
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub request_channel: String,
    pub update_channel: String,
    /// Requests published before giving up on the server.
    pub bootstrap_attempts: u32,
    /// Time to wait for a snapshot after each request.
    pub retry_delay_ms: u64,
    /// Token limit used when parsing snapshot payloads.
    pub max_token_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_channel: PARAM_REQUEST_CHANNEL.to_string(),
            update_channel: PARAM_UPDATE_CHANNEL.to_string(),
            bootstrap_attempts: 5,
            retry_delay_ms: 1000,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

impl ClientConfig {
    /// Reads a config from JSON; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            source_name: format!("<{}>", self.update_channel),
            max_token_len: self.max_token_len,
        }
    }
}

/// A store populated from a param server.
///
/// With live updates enabled the client stays subscribed to the update
/// channel until it is dropped.
pub struct ParamClient {
    store: Arc<ParamStore>,
    live: Option<(Arc<dyn Transport>, SubscriptionId)>,
}

impl ParamClient {
    /// Requests the server's parameters, retrying up to
    /// `config.bootstrap_attempts` times, and fails with
    /// [`ParamError::BootstrapTimeout`] if no snapshot arrives.
    pub fn from_server(
        transport: Arc<dyn Transport>,
        keep_updated: bool,
        config: &ClientConfig,
    ) -> Result<Self, ParamError> {
        let store = Arc::new(ParamStore::for_snapshots(config.parse_options()));

        let (sender, receiver) = mpsc::channel::<ParamUpdate>();
        let sender = Mutex::new(sender);
        let subscription = transport.subscribe(
            &config.update_channel,
            Arc::new(move |update: &ParamUpdate| {
                // The receiver is gone once bootstrap has finished.
                let _ = sender.lock().send(update.clone());
            }),
        )?;
        let bootstrapped = bootstrap(transport.as_ref(), &store, &receiver, config);
        transport.unsubscribe(subscription);
        bootstrapped?;

        let live = if keep_updated {
            let weak: Weak<ParamStore> = Arc::downgrade(&store);
            let id = transport.subscribe(
                &config.update_channel,
                Arc::new(move |update: &ParamUpdate| {
                    if let Some(store) = weak.upgrade() {
                        store.handle_update(update);
                    }
                }),
            )?;
            Some((transport, id))
        } else {
            None
        };

        Ok(ParamClient { store, live })
    }

    pub fn store(&self) -> Arc<ParamStore> {
        Arc::clone(&self.store)
    }

    /// Whether the client is still subscribed to server updates.
    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }
}

fn bootstrap(
    transport: &dyn Transport,
    store: &ParamStore,
    receiver: &Receiver<ParamUpdate>,
    config: &ClientConfig,
) -> Result<(), ParamError> {
    let attempts = config.bootstrap_attempts;
    for attempt in 1..=attempts {
        debug!("requesting params from server (attempt {attempt} of {attempts})");
        transport.publish_request(&config.request_channel, &ParamRequest::now())?;

        let deadline = Instant::now() + config.retry_delay();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(remaining) {
                Ok(update) => {
                    if store.handle_update(&update) == UpdateOutcome::Applied && !store.is_empty() {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ParamError::Transport {
                        message: format!(
                            "subscription to {} closed during bootstrap",
                            config.update_channel
                        ),
                    })
                }
            }
        }
    }

    warn!("no params received from the param server after {attempts} requests");
    Err(ParamError::BootstrapTimeout { attempts })
}

impl Deref for ParamClient {
    type Target = ParamStore;

    fn deref(&self) -> &ParamStore {
        &self.store
    }
}

impl Drop for ParamClient {
    fn drop(&mut self) {
        if let Some((transport, id)) = self.live.take() {
            transport.unsubscribe(id);
        }
    }
}
