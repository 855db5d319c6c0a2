//! 会话令牌算法
//!
//! 令牌格式为 `<session id>.<secret>`：先按 ID 直接定位记录，
//! 再以常量时间比较整个令牌

use rand::Rng;
use rand::distributions::Alphanumeric;
use subtle::ConstantTimeEq;

use super::session::SessionId;

/// 随机密文长度
pub const TOKEN_SECRET_LENGTH: usize = 32;

/// ID 与密文之间的分隔符，不会出现在会话 ID 中
pub const TOKEN_DELIMITER: char = '.';

/// 为会话生成新的令牌
pub fn generate_token(id: &SessionId) -> String {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_SECRET_LENGTH)
        .map(char::from)
        .collect();

    format!("{}{}{}", id, TOKEN_DELIMITER, secret)
}

/// 从令牌中取出会话 ID
///
/// ID 或密文为空时返回 None
pub fn parse_session_id(token: &str) -> Option<SessionId> {
    let (id, secret) = token.split_once(TOKEN_DELIMITER)?;
    if id.is_empty() || secret.is_empty() {
        return None;
    }
    Some(SessionId::from(id))
}

/// 比较提交的令牌与存储的令牌
pub fn matches(presented: &str, stored: &str) -> bool {
    if stored.is_empty() {
        return false;
    }
    presented.as_bytes().ct_eq(stored.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_shape() {
        let id = SessionId::generate();
        let token = generate_token(&id);

        assert_eq!(token.len(), id.as_str().len() + 1 + TOKEN_SECRET_LENGTH);
        assert_eq!(parse_session_id(&token), Some(id));
    }

    #[test]
    fn test_generated_tokens_differ() {
        let id = SessionId::generate();
        assert_ne!(generate_token(&id), generate_token(&id));
    }

    #[test]
    fn test_parse_rejects_malformed_tokens() {
        assert_eq!(parse_session_id("no-delimiter"), None);
        assert_eq!(parse_session_id("session-id."), None);
        assert_eq!(parse_session_id(".secret"), None);
        assert_eq!(parse_session_id(""), None);
    }

    #[test]
    fn test_matches() {
        assert!(matches("session-id.access-token", "session-id.access-token"));
        assert!(!matches("session-id.access-token", "session-id.refresh-token"));
        assert!(!matches("session-id.access", "session-id.access-token"));
    }

    #[test]
    fn test_empty_stored_token_never_matches() {
        assert!(!matches("", ""));
        assert!(!matches("session-id.", ""));
    }
}
