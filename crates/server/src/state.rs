use clipfetch_core::{BinaryLocator, Config, Orchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Orchestrator,
    locator: BinaryLocator,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Orchestrator, locator: BinaryLocator) -> Self {
        Self {
            config,
            orchestrator,
            locator,
        }
    }

    /// Wires the strategy chain and the diagnostics locator from config.
    pub fn from_config(config: Config) -> Self {
        let orchestrator = Orchestrator::from_config(&config);
        let locator = BinaryLocator::from_config(&config.locator);
        Self::new(config, orchestrator, locator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn locator(&self) -> &BinaryLocator {
        &self.locator
    }
}
