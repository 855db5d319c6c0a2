//! 会话 Metrics

use authgate_common::ClientId;
use metrics::counter;

/// 记录会话创建
pub fn record_session_created(client_id: &ClientId) {
    let labels = [("client_id", client_id.to_string())];
    counter!("auth_session_created_total", &labels).increment(1);
}

/// 记录会话撤销
pub fn record_session_invalidated() {
    counter!("auth_session_invalidated_total").increment(1);
}

/// 记录一次会话解析结果
pub fn record_resolve(outcome: &'static str) {
    let labels = [("outcome", outcome)];
    counter!("auth_session_resolve_total", &labels).increment(1);
}
