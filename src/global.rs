//! Process-wide shared parameter store.
//!
//! The first [`acquire`] bootstraps a [`ParamClient`]; later calls share it
//! and bump a reference count. The client is torn down when the last
//! [`GlobalParams`] handle is released.

use crate::client::{ClientConfig, ParamClient};
use crate::error::ParamError;
use crate::store::ParamStore;
use crate::transport::Transport;
use log::{debug, warn};
use parking_lot::{const_mutex, Mutex};
use std::ops::Deref;
use std::sync::Arc;

/// Ceiling for the reference count; further acquisitions leave it unchanged.
pub const MAX_REFERENCES: u64 = 1 << 60;

struct GlobalState {
    client: Option<Arc<ParamClient>>,
    refcount: u64,
}

static GLOBAL: Mutex<GlobalState> = const_mutex(GlobalState {
    client: None,
    refcount: 0,
});

/// A counted reference to the process-wide store. Dropping it releases it.
pub struct GlobalParams {
    client: Arc<ParamClient>,
}

impl GlobalParams {
    pub fn store(&self) -> Arc<ParamStore> {
        self.client.store()
    }
}

impl Deref for GlobalParams {
    type Target = ParamStore;

    fn deref(&self) -> &ParamStore {
        &self.client
    }
}

impl Drop for GlobalParams {
    fn drop(&mut self) {
        release_client(&self.client);
    }
}

/// Returns the process-wide store, bootstrapping it with the default
/// [`ClientConfig`] if it does not exist yet.
pub fn acquire(transport: Arc<dyn Transport>, keep_updated: bool) -> Result<GlobalParams, ParamError> {
    acquire_with(transport, keep_updated, &ClientConfig::default())
}

/// Like [`acquire`], with an explicit client config. `transport`,
/// `keep_updated` and `config` only matter for the call that creates the
/// store.
pub fn acquire_with(
    transport: Arc<dyn Transport>,
    keep_updated: bool,
    config: &ClientConfig,
) -> Result<GlobalParams, ParamError> {
    let mut state = GLOBAL.lock();
    let client = match &state.client {
        Some(client) => Arc::clone(client),
        None => {
            debug!("creating process-wide param store");
            let client = Arc::new(ParamClient::from_server(transport, keep_updated, config)?);
            state.client = Some(Arc::clone(&client));
            client
        }
    };
    state.refcount = state.refcount.saturating_add(1).min(MAX_REFERENCES);
    Ok(GlobalParams { client })
}

/// Gives back a handle obtained from [`acquire`].
///
/// A handle whose store is no longer the process-wide one only logs a
/// warning; the reference count is left untouched.
pub fn release(params: GlobalParams) {
    drop(params);
}

/// Number of outstanding handles to the process-wide store.
pub fn reference_count() -> u64 {
    GLOBAL.lock().refcount
}

fn release_client(client: &Arc<ParamClient>) {
    let retired = {
        let mut state = GLOBAL.lock();
        let is_current = state
            .client
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, client));
        if !is_current {
            warn!("releasing a param store that is not the process-wide one");
            return;
        }
        if state.refcount == 0 {
            warn!("process-wide param store released more often than acquired");
            return;
        }
        state.refcount -= 1;
        if state.refcount == 0 {
            debug!("destroying process-wide param store");
            state.client.take()
        } else {
            None
        }
    };
    drop(retired);
}
