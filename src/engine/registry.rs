//! Engine client registry.
//!
//! The registry is the one place engine clients are constructed, and it is
//! passed explicitly to the lifecycle manager - construct once, reuse for
//! the process lifetime. There is deliberately no lazily-initialized global
//! client: everything that holds state is handed to its users.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::domain::EngineKind;

use super::{EngineClient, ReputationClient, SandboxClient, StaticScanClient};

/// Maps each engine kind to its client
#[derive(Clone, Default)]
pub struct EngineRegistry {
    clients: HashMap<EngineKind, Arc<dyn EngineClient>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build clients for every engine configured with a base URL
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        if let Some(settings) = config.engines.get(&EngineKind::Sandbox) {
            let mut client =
                SandboxClient::new(&settings.base_url, settings.api_token.clone());
            if let Some(machine) = &settings.machine {
                client = client.with_machine(machine);
            }
            registry.register(Arc::new(client));
        }

        if let Some(settings) = config.engines.get(&EngineKind::StaticScan) {
            let client = StaticScanClient::new(
                &settings.base_url,
                settings.api_token.clone().unwrap_or_default(),
            );
            registry.register(Arc::new(client));
        }

        if let Some(settings) = config.engines.get(&EngineKind::Reputation) {
            let mut client = ReputationClient::new(
                &settings.base_url,
                settings.api_token.clone().unwrap_or_default(),
            );
            if let Some(limit) = settings.max_upload_bytes {
                client = client.with_max_upload_bytes(limit);
            }
            registry.register(Arc::new(client));
        }

        registry
    }

    /// Register a client under its own kind, replacing any previous one
    pub fn register(&mut self, client: Arc<dyn EngineClient>) {
        self.clients.insert(client.kind(), client);
    }

    pub fn get(&self, kind: EngineKind) -> Option<Arc<dyn EngineClient>> {
        self.clients.get(&kind).cloned()
    }

    /// Kinds with a registered client
    pub fn kinds(&self) -> Vec<EngineKind> {
        let mut kinds: Vec<_> = self.clients.keys().copied().collect();
        kinds.sort();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = EngineRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(EngineKind::Sandbox).is_none());

        registry.register(Arc::new(SandboxClient::new("http://cape.local", None)));
        registry.register(Arc::new(StaticScanClient::new("http://mobsf.local", "k")));

        assert_eq!(registry.kinds(), vec![EngineKind::Sandbox, EngineKind::StaticScan]);
        assert_eq!(
            registry.get(EngineKind::Sandbox).unwrap().kind(),
            EngineKind::Sandbox
        );
        assert!(registry.get(EngineKind::Reputation).is_none());
    }
}
