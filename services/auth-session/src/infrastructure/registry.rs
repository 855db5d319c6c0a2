//! 内存客户端注册表

use std::collections::HashMap;

use authgate_common::ClientId;
use authgate_config::ClientConfig;
use parking_lot::RwLock;

use crate::domain::repositories::ClientRegistry;

/// 基于配置的客户端注册表，支持运行时更新
#[derive(Debug, Default)]
pub struct InMemoryClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientConfig>>,
}

impl InMemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(clients: &HashMap<String, ClientConfig>) -> Self {
        let clients = clients
            .iter()
            .map(|(id, config)| (ClientId::new(id.clone()), config.clone()))
            .collect();
        Self {
            clients: RwLock::new(clients),
        }
    }

    pub fn upsert(&self, client_id: impl Into<ClientId>, config: ClientConfig) {
        self.clients.write().insert(client_id.into(), config);
    }

    pub fn remove(&self, client_id: &ClientId) -> Option<ClientConfig> {
        self.clients.write().remove(client_id)
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

impl ClientRegistry for InMemoryClientRegistry {
    fn get(&self, client_id: &ClientId) -> Option<ClientConfig> {
        self.clients.read().get(client_id).cloned()
    }
}
