//! 客户端注册表 trait

use authgate_common::ClientId;
use authgate_config::ClientConfig;

pub trait ClientRegistry: Send + Sync {
    /// 查找客户端配置
    fn get(&self, client_id: &ClientId) -> Option<ClientConfig>;
}
