use crate::cast::ParamValue;
use crate::error::ParamError;
use crate::lexer::DEFAULT_MAX_TOKEN_LEN;
use crate::parser::{self, ParseOptions};
use crate::serialization::{to_value, Value};
use crate::transport::{timestamp_now, ParamUpdate};
use crate::tree::Tree;
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use std::fmt::{self, Display};
use std::io;
use std::path::Path;

/// What [`ParamStore::handle_update`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The snapshot replaced the tree.
    Applied,
    /// Same server, but not newer than what the store holds.
    Stale,
    /// Sent by a server other than the one the store is bound to.
    Foreign,
    /// The payload did not parse; the previous tree was kept.
    Unparsable,
}

#[derive(Debug)]
struct StoreState {
    tree: Tree,
    server_id: i64,
    sequence_number: i64,
}

impl StoreState {
    fn check_update(&self, update: &ParamUpdate) -> Result<(), ParamError> {
        if update.server_id != self.server_id {
            return Err(ParamError::ForeignServer {
                expected: self.server_id,
                got: update.server_id,
            });
        }
        if update.sequence_number <= self.sequence_number {
            return Err(ParamError::StaleUpdate {
                received: update.sequence_number,
                current: self.sequence_number,
            });
        }
        Ok(())
    }
}

/// A configuration tree shared between threads.
///
/// Every read and write takes the store's single lock for its whole duration,
/// so callers always see either the tree before or after an update.
#[derive(Debug)]
pub struct ParamStore {
    state: Mutex<StoreState>,
    snapshot_options: ParseOptions,
}

impl Default for ParamStore {
    fn default() -> Self {
        ParamStore::from_tree(Tree::new())
    }
}

impl ParamStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: Tree) -> Self {
        ParamStore {
            state: Mutex::new(StoreState {
                tree,
                server_id: 0,
                sequence_number: 0,
            }),
            snapshot_options: ParseOptions {
                source_name: "<snapshot>".to_string(),
                max_token_len: DEFAULT_MAX_TOKEN_LEN,
            },
        }
    }

    /// Empty store whose update handler parses payloads with `options`.
    pub fn for_snapshots(options: ParseOptions) -> Self {
        ParamStore {
            snapshot_options: options,
            ..ParamStore::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParamError> {
        parser::parse_file(path, DEFAULT_MAX_TOKEN_LEN).map(Self::from_tree)
    }

    pub fn from_bytes(bytes: &[u8], options: &ParseOptions) -> Result<Self, ParamError> {
        parser::parse_bytes(bytes, options).map(Self::from_tree)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ParamError> {
        parser::parse_str(text).map(Self::from_tree)
    }

    // === Lookup ===

    pub fn is_empty(&self) -> bool {
        self.state.lock().tree.is_empty()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.state.lock().tree.find(key, true).is_some()
    }

    /// Number of children of the container at `key`; `""` is the root.
    pub fn num_subkeys(&self, key: &str) -> Result<usize, ParamError> {
        Ok(self.state.lock().tree.container(key)?.children().len())
    }

    /// Child names of the container at `key`; `""` is the root.
    pub fn subkeys(&self, key: &str) -> Result<Vec<String>, ParamError> {
        self.state.lock().tree.subkeys(key)
    }

    pub fn array_len(&self, key: &str) -> Result<usize, ParamError> {
        Ok(self.state.lock().tree.array_values(key)?.len())
    }

    /// Every value of the array at `key`, uncast.
    pub fn get_str_array(&self, key: &str) -> Result<Vec<String>, ParamError> {
        Ok(self.state.lock().tree.array_values(key)?.to_vec())
    }

    /// Current tree, cloned out of the store.
    pub fn tree(&self) -> Tree {
        self.state.lock().tree.clone()
    }

    // === Typed getters ===

    /// Casts the first value of the array at `key`.
    pub fn get<T: ParamValue>(&self, key: &str) -> Result<T, ParamError> {
        let state = self.state.lock();
        match state.tree.array_values(key)?.first() {
            Some(raw) => T::cast(key, raw),
            None => Err(ParamError::Cast {
                key: key.to_string(),
                value: String::new(),
                target: T::TYPE_NAME,
            }),
        }
    }

    pub fn get_int(&self, key: &str) -> Result<i64, ParamError> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, ParamError> {
        self.get(key)
    }

    pub fn get_double(&self, key: &str) -> Result<f64, ParamError> {
        self.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<String, ParamError> {
        self.get(key)
    }

    /// Like [`ParamStore::get`], but a missing key or failed cast panics.
    pub fn get_or_fail<T: ParamValue>(&self, key: &str) -> T {
        or_fail(key, self.get(key))
    }

    pub fn get_int_or_fail(&self, key: &str) -> i64 {
        self.get_or_fail(key)
    }

    pub fn get_bool_or_fail(&self, key: &str) -> bool {
        self.get_or_fail(key)
    }

    pub fn get_double_or_fail(&self, key: &str) -> f64 {
        self.get_or_fail(key)
    }

    pub fn get_str_or_fail(&self, key: &str) -> String {
        or_fail(key, self.get_str(key))
    }

    // === Array getters ===

    /// Casts values of the array at `key` into `out`, up to its length.
    ///
    /// Returns how many values were written. A cast failure aborts the read;
    /// slots filled before it keep their new values.
    pub fn get_array_into<T: ParamValue>(&self, key: &str, out: &mut [T]) -> Result<usize, ParamError> {
        let state = self.state.lock();
        let values = state.tree.array_values(key)?;

        let mut count = 0;
        for (slot, raw) in out.iter_mut().zip(values) {
            *slot = T::cast(key, raw).inspect_err(|_| {
                warn!("cast error parsing {} array {key}", T::TYPE_NAME);
            })?;
            count += 1;
        }
        if values.len() != out.len() {
            warn!(
                "{key} holds {} values, read {count} of {} requested {} values",
                values.len(),
                out.len(),
                T::TYPE_NAME
            );
        }
        Ok(count)
    }

    /// Casts every value of the array at `key`.
    pub fn get_array<T: ParamValue>(&self, key: &str) -> Result<Vec<T>, ParamError> {
        let state = self.state.lock();
        state
            .tree
            .array_values(key)?
            .iter()
            .map(|raw| T::cast(key, raw))
            .collect()
    }

    pub fn get_int_array(&self, key: &str, out: &mut [i64]) -> Result<usize, ParamError> {
        self.get_array_into(key, out)
    }

    pub fn get_bool_array(&self, key: &str, out: &mut [bool]) -> Result<usize, ParamError> {
        self.get_array_into(key, out)
    }

    pub fn get_double_array(&self, key: &str, out: &mut [f64]) -> Result<usize, ParamError> {
        self.get_array_into(key, out)
    }

    /// Panics unless exactly `out.len()` values were read.
    pub fn get_array_into_or_fail<T: ParamValue>(&self, key: &str, out: &mut [T]) {
        match self.get_array_into(key, out) {
            Ok(count) if count == out.len() => {}
            Ok(count) => {
                error!(
                    "only read {count} of {} {} values for key: {key}",
                    out.len(),
                    T::TYPE_NAME
                );
                panic!("missing config key: {key}");
            }
            Err(err) => or_fail(key, Err(err)),
        }
    }

    pub fn get_int_array_or_fail(&self, key: &str, out: &mut [i64]) {
        self.get_array_into_or_fail(key, out)
    }

    pub fn get_bool_array_or_fail(&self, key: &str, out: &mut [bool]) {
        self.get_array_into_or_fail(key, out)
    }

    pub fn get_double_array_or_fail(&self, key: &str, out: &mut [f64]) {
        self.get_array_into_or_fail(key, out)
    }

    // === Setters ===

    /// Sets the first value at `key`, creating the key and any enclosing
    /// containers when missing.
    pub fn set_str(&self, key: &str, value: &str) -> Result<(), ParamError> {
        self.state.lock().tree.set_value(key, value)
    }

    pub fn set<T: ParamValue>(&self, key: &str, value: &T) -> Result<(), ParamError> {
        self.set_str(key, &value.render())
    }

    pub fn set_int(&self, key: &str, value: i64) -> Result<(), ParamError> {
        self.set(key, &value)
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), ParamError> {
        self.set(key, &value)
    }

    pub fn set_double(&self, key: &str, value: f64) -> Result<(), ParamError> {
        self.set(key, &value)
    }

    /// Stores `values` joined by `,` as one value.
    ///
    /// The result is not split again until it goes through the parser as
    /// unquoted text, and values containing `,` or `"` do not survive that.
    pub fn set_array<T: ParamValue>(&self, key: &str, values: &[T]) -> Result<(), ParamError> {
        let joined = values
            .iter()
            .map(ParamValue::render)
            .collect::<Vec<_>>()
            .join(",");
        self.set_str(key, &joined)
    }

    pub fn set_int_array(&self, key: &str, values: &[i64]) -> Result<(), ParamError> {
        self.set_array(key, values)
    }

    pub fn set_bool_array(&self, key: &str, values: &[bool]) -> Result<(), ParamError> {
        self.set_array(key, values)
    }

    pub fn set_double_array(&self, key: &str, values: &[f64]) -> Result<(), ParamError> {
        self.set_array(key, values)
    }

    pub fn set_str_array<S: AsRef<str>>(&self, key: &str, values: &[S]) -> Result<(), ParamError> {
        let joined = values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        self.set_str(key, &joined)
    }

    // === Output ===

    /// Writes the tree as param text.
    pub fn write<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let text = self.to_string();
        out.write_all(text.as_bytes())
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        to_value(self.state.lock().tree.root())
    }

    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_value())
    }

    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value())
    }

    // === Replication ===

    /// Server this store accepts updates from, 0 while unbound.
    pub fn server_id(&self) -> i64 {
        self.state.lock().server_id
    }

    pub fn sequence_number(&self) -> i64 {
        self.state.lock().sequence_number
    }

    /// Renders the current tree as an update message from `server_id`.
    pub fn snapshot(&self, server_id: i64, sequence_number: i64) -> ParamUpdate {
        ParamUpdate {
            utime: timestamp_now(),
            server_id,
            sequence_number,
            params: self.to_string(),
        }
    }

    /// Applies a snapshot received from a param server.
    ///
    /// The first message binds the store to its sender. After that only newer
    /// snapshots from the same server replace the tree. The payload is parsed
    /// without holding the lock; the lock is then taken once to swap trees.
    pub fn handle_update(&self, update: &ParamUpdate) -> UpdateOutcome {
        {
            let mut state = self.state.lock();
            if state.server_id <= 0 {
                debug!(
                    "binding to param server {} at sequence {}",
                    update.server_id, update.sequence_number
                );
                state.server_id = update.server_id;
                state.sequence_number = update.sequence_number.saturating_sub(1);
            }
            if let Err(err) = state.check_update(update) {
                return rejected(err);
            }
        }

        let tree = match parser::parse_bytes(update.params.as_bytes(), &self.snapshot_options) {
            Ok(tree) => tree,
            Err(err) => {
                warn!(
                    "could not parse params from server {}: {err}",
                    update.server_id
                );
                return UpdateOutcome::Unparsable;
            }
        };

        let previous = {
            let mut state = self.state.lock();
            if let Err(err) = state.check_update(update) {
                return rejected(err);
            }
            state.sequence_number = update.sequence_number;
            std::mem::replace(&mut state.tree, tree)
        };
        drop(previous);

        debug!(
            "applied params from server {} at sequence {}",
            update.server_id, update.sequence_number
        );
        UpdateOutcome::Applied
    }
}

fn rejected(err: ParamError) -> UpdateOutcome {
    match err {
        ParamError::ForeignServer { .. } => {
            warn!("{err}; ignoring them");
            UpdateOutcome::Foreign
        }
        _ => {
            trace!("dropping update: {err}");
            UpdateOutcome::Stale
        }
    }
}

fn or_fail<T>(key: &str, result: Result<T, ParamError>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!("missing config key {key}: {err}");
            panic!("missing config key: {key}");
        }
    }
}

impl Display for ParamStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        Display::fmt(&state.tree, f)
    }
}

impl Serialize for ParamStore {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
