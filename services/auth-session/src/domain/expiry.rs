//! 过期策略
//!
//! 过期在读取时计算，存储层 TTL 只用于限制存储增长

use std::time::Duration;

use authgate_config::ClientConfig;
use chrono::{DateTime, TimeDelta, Utc};

use super::repositories::StoreExpiry;
use super::session::{Session, TokenKind};

/// 会话在 `now` 时刻对指定令牌类型是否有效
pub fn is_valid(
    session: &Session,
    config: Option<&ClientConfig>,
    kind: TokenKind,
    now: DateTime<Utc>,
) -> bool {
    // 1. 客户端配置必须存在且未禁用
    let Some(config) = config.filter(|c| !c.disabled) else {
        return false;
    };

    // 2. 刷新被禁用后，已签发的刷新令牌一律失效
    if kind == TokenKind::RefreshToken && config.refresh_token_disabled {
        return false;
    }

    // 3. 空闲超时
    if let Some(idle) = config.session_idle_timeout() {
        if elapsed_beyond(session.accessed_at, idle, now) {
            return false;
        }
    }

    // 4. 当前令牌的绝对有效期
    let (issued_at, lifetime) = match kind {
        TokenKind::AccessToken => (session.access_token_created_at, config.access_token_lifetime()),
        TokenKind::RefreshToken => (session.created_at, config.refresh_token_lifetime()),
    };
    match lifetime {
        Some(lifetime) => !elapsed_beyond(issued_at, lifetime, now),
        None => true,
    }
}

/// 计算写入存储时的 TTL
///
/// 取各令牌类型最晚可能失效时间的最大值；任一类型无上限时不设置 TTL
pub fn store_expiry(config: &ClientConfig, session: &Session, now: DateTime<Utc>) -> StoreExpiry {
    let mut kinds = vec![TokenKind::AccessToken];
    if session.has_refresh_token() && !config.refresh_token_disabled {
        kinds.push(TokenKind::RefreshToken);
    }

    let mut latest: Option<DateTime<Utc>> = None;
    for kind in kinds {
        match expires_at(config, session, kind) {
            Some(at) => latest = Some(latest.map_or(at, |l| l.max(at))),
            None => return StoreExpiry::Persist,
        }
    }

    let Some(latest) = latest else {
        return StoreExpiry::Persist;
    };

    let ttl = (latest - now).to_std().unwrap_or(Duration::ZERO);
    StoreExpiry::After(ttl.max(Duration::from_secs(1)))
}

/// 指定令牌类型的失效时刻，None 表示无上限
///
/// 有绝对有效期时以其为准，否则以空闲超时为准
fn expires_at(config: &ClientConfig, session: &Session, kind: TokenKind) -> Option<DateTime<Utc>> {
    let lifetime = match kind {
        TokenKind::AccessToken => config
            .access_token_lifetime()
            .map(|l| (session.access_token_created_at, l)),
        TokenKind::RefreshToken => config
            .refresh_token_lifetime()
            .map(|l| (session.created_at, l)),
    };

    match lifetime {
        Some((from, lifetime)) => add(from, lifetime),
        None => config
            .session_idle_timeout()
            .and_then(|idle| add(session.accessed_at, idle)),
    }
}

fn add(at: DateTime<Utc>, duration: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
}

fn elapsed_beyond(since: DateTime<Utc>, limit: Duration, now: DateTime<Utc>) -> bool {
    match add(since, limit) {
        Some(deadline) => now > deadline,
        None => false,
    }
}
