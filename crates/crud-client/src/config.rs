//! Client configuration.

use std::time::Duration;

/// Settings for [`crate::CrudClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Skip the network and fabricate responses.
    pub mock_mode: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            mock_mode: false,
        }
    }
}

impl ClientConfig {
    /// A configuration that never touches the network.
    pub fn mock() -> Self {
        Self {
            mock_mode: true,
            ..Self::default()
        }
    }
}
