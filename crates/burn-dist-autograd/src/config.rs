use core::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::rpc::WorkerId;

/// Environment variable overriding the worker id, see [from_env](DistAutogradConfig::from_env).
pub const WORKER_ID_ENV: &str = "BURN_DIST_AUTOGRAD_WORKER_ID";
/// Environment variable overriding the worker name, see [from_env](DistAutogradConfig::from_env).
pub const WORKER_NAME_ENV: &str = "BURN_DIST_AUTOGRAD_WORKER_NAME";

/// Configuration of a [container](crate::DistAutogradContainer).
///
/// The worker id must match the id the transport knows the current process by: it is written
/// in every wrapped message and partitions the context and message id spaces between workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistAutogradConfig {
    pub(crate) worker_id: WorkerId,
    pub(crate) worker_name: String,
}

impl Default for DistAutogradConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for DistAutogradConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let worker_id = self.worker_id;
        let worker_name = &self.worker_name;

        write!(
            f,
            r#"
DistAutogradConfig {{
    worker_id: {worker_id:?},
    worker_name: {worker_name:?},
}}
"#
        )
    }
}

impl DistAutogradConfig {
    /// Create the default configuration, for worker `0`.
    pub fn new() -> Self {
        Self {
            worker_id: 0,
            worker_name: String::from("worker0"),
        }
    }

    /// Create the configuration from the environment, falling back on the defaults for missing
    /// or unparsable variables.
    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(worker_id) = std::env::var(WORKER_ID_ENV) {
            match worker_id.parse::<WorkerId>() {
                Ok(worker_id) => {
                    config.worker_id = worker_id;
                    config.worker_name = format!("worker{worker_id}");
                }
                Err(err) => log::warn!("Ignoring {WORKER_ID_ENV}={worker_id:?}: {err}"),
            }
        }

        if let Ok(worker_name) = std::env::var(WORKER_NAME_ENV) {
            config.worker_name = worker_name;
        }

        config
    }

    /// Selects the id of the current worker.
    pub fn with_worker_id(mut self, worker_id: WorkerId) -> Self {
        self.worker_id = worker_id;
        self
    }

    /// Selects the name of the current worker.
    pub fn with_worker_name<S: Into<String>>(mut self, name: S) -> Self {
        self.worker_name = name.into();
        self
    }

    /// The id of the current worker.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// The name of the current worker.
    pub fn worker_name(&self) -> &str {
        &self.worker_name
    }

    /// Returns whether the config is valid.
    pub fn is_valid(&self) -> bool {
        !self.worker_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = DistAutogradConfig::new()
            .with_worker_id(3)
            .with_worker_name("trainer");

        assert_eq!(config.worker_id(), 3);
        assert_eq!(config.worker_name(), "trainer");
        assert!(config.is_valid());
    }

    #[test]
    fn empty_name_is_invalid() {
        let config = DistAutogradConfig::new().with_worker_name("");

        assert!(!config.is_valid());
    }

    #[test]
    fn config_round_trips_through_rmp() {
        let config = DistAutogradConfig::new().with_worker_id(12);
        let bytes = rmp_serde::to_vec(&config).unwrap();

        assert_eq!(
            rmp_serde::from_slice::<DistAutogradConfig>(&bytes).unwrap(),
            config
        );
    }
}
