//! Per-key serialization of commands.
//!
//! A command is a fetch followed by a persist. Two workers applying
//! commands for the same form directly to a port can both fetch the old
//! record, and the second persist then drops the first one's update.
//! [`KeyedExecutor`] prevents that by running commands for one key one at
//! a time, while commands for different keys still run in parallel.
//! Workspace-wide commands wait for all keyed commands to finish.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::commands::Command;
use crate::port::{FormMetadataPort, PortError};
use formsync_types::FormKey;

/// Runs commands against a port, one at a time per form key.
#[derive(Debug, Default)]
pub struct KeyedExecutor<P> {
    port: P,
    workspace: RwLock<()>,
    keys: Mutex<HashMap<FormKey, Arc<Mutex<()>>>>,
}

impl<P: FormMetadataPort> KeyedExecutor<P> {
    /// Wrap a port.
    pub fn new(port: P) -> Self {
        Self {
            port,
            workspace: RwLock::new(()),
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped port, for reads.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Unwrap the port.
    pub fn into_inner(self) -> P {
        self.port
    }

    /// Apply a command while holding its key's lock.
    ///
    /// # Errors
    ///
    /// Returns the port's error unchanged.
    pub fn execute(&self, command: &Command) -> Result<(), PortError> {
        // The locks guard no data, so poisoning carries no meaning here.
        match command.key() {
            Some(key) => {
                let _workspace = self
                    .workspace
                    .read()
                    .unwrap_or_else(PoisonError::into_inner);
                let lock = self.key_lock(key);
                let result = {
                    let _key = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    command.apply(&self.port)
                };
                self.release_key_lock(key, lock);
                result
            }
            None => {
                let _workspace = self
                    .workspace
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                command.apply(&self.port)
            }
        }
    }

    /// Apply commands in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first port error; later commands are not applied.
    pub fn execute_all<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a Command>,
    ) -> Result<(), PortError> {
        commands
            .into_iter()
            .try_for_each(|command| self.execute(command))
    }

    fn key_lock(&self, key: &FormKey) -> Arc<Mutex<()>> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(keys.entry(key.clone()).or_default())
    }

    // Clones are only handed out under the map lock, so a count of two
    // (the map and `lock`) means no other worker holds or waits on it.
    fn release_key_lock(&self, key: &FormKey, lock: Arc<Mutex<()>>) {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            keys.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
