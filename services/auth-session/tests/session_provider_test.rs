//! 会话提供者测试
//!
//! 使用内存存储与 MockClock 覆盖：
//! - 创建会话与令牌形状
//! - 按令牌解析（类型、客户端、过期）
//! - 访问记录
//! - 撤销与列表

use std::sync::Arc;

use async_trait::async_trait;
use auth_session::application::{RequestContext, SessionProvider};
use auth_session::domain::repositories::{AccessEventStore, StoreExpiry};
use auth_session::domain::token::TOKEN_SECRET_LENGTH;
use auth_session::domain::{
    AccessEvent, AccessEventExtraInfo, ExtraInfoPolicy, RequestMeta, Session, SessionId, TokenKind,
};
use auth_session::error::SessionError;
use auth_session::infrastructure::persistence::{InMemoryAccessEventStore, InMemorySessionStore};
use auth_session::infrastructure::registry::InMemoryClientRegistry;
use authgate_common::{ClientId, MockClock};
use authgate_config::ClientConfig;
use authgate_errors::{AppError, AppResult};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn initial_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2006, 1, 1, 0, 0, 0).unwrap()
}

struct Fixture {
    provider: SessionProvider,
    store: Arc<InMemorySessionStore>,
    events: Arc<InMemoryAccessEventStore>,
    clients: Arc<InMemoryClientRegistry>,
    clock: MockClock,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemorySessionStore::new());
    let events = Arc::new(InMemoryAccessEventStore::new());
    let clients = Arc::new(InMemoryClientRegistry::new());
    clients.upsert("web-app", ClientConfig::default());
    clients.upsert("mobile-app", ClientConfig::default());
    let clock = MockClock::new(initial_time());

    let provider = SessionProvider::new(
        store.clone(),
        events.clone(),
        clients.clone(),
        Arc::new(clock.clone()),
    );

    Fixture {
        provider,
        store,
        events,
        clients,
        clock,
    }
}

/// 模拟 SDK 发起的请求
fn sdk_context(client_id: &str) -> RequestContext {
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_static("SDK"));
    headers.insert(
        "x-authgate-extra-info",
        HeaderValue::from_static(r#"{ "device_name": "Device" }"#),
    );
    let meta = RequestMeta::from_headers(&headers, None, &ExtraInfoPolicy::default());
    RequestContext::new(Some(ClientId::new(client_id)), meta)
}

fn sdk_access_event(timestamp: DateTime<Utc>) -> AccessEvent {
    let mut extra = AccessEventExtraInfo::new();
    extra.insert("device_name".to_string(), serde_json::json!("Device"));
    AccessEvent {
        user_agent: "SDK".to_string(),
        extra,
        ..AccessEvent::at(timestamp)
    }
}

fn fixture_session() -> Session {
    Session {
        id: SessionId::from("session-id"),
        client_id: ClientId::new("web-app"),
        user_id: "user-id".to_string(),
        principal_id: "principal-id".to_string(),
        access_token: "session-id.access-token".to_string(),
        refresh_token: "session-id.refresh-token".to_string(),
        created_at: initial_time(),
        access_token_created_at: initial_time(),
        accessed_at: initial_time(),
        initial_access: AccessEvent::at(initial_time()),
        last_access: AccessEvent::at(initial_time()),
    }
}

// ============================================================================
// 创建会话
// ============================================================================

#[tokio::test]
async fn test_create_session() {
    let f = fixture();
    let ctx = sdk_context("web-app");

    let session = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();

    let event = sdk_access_event(initial_time());
    assert_eq!(session.client_id, ClientId::new("web-app"));
    assert_eq!(session.user_id, "user-id");
    assert_eq!(session.principal_id, "principal-id");
    assert_eq!(session.created_at, initial_time());
    assert_eq!(session.accessed_at, initial_time());
    assert_eq!(session.access_token_created_at, initial_time());
    assert_eq!(session.initial_access, event);
    assert_eq!(session.last_access, event);
    assert_eq!(
        session.access_token.len(),
        TOKEN_SECRET_LENGTH + session.id.as_str().len() + 1
    );
    assert_eq!(f.events.events(&session.id), vec![event]);
    assert!(f.store.contains(&session.id));
}

#[tokio::test]
async fn test_create_multiple_sessions_for_same_principal() {
    let f = fixture();
    let ctx = sdk_context("web-app");

    let session1 = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    let session2 = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();

    assert_ne!(session1.id, session2.id);
    for session in [&session1, &session2] {
        let found = f
            .provider
            .get_by_token(&ctx, &session.access_token, TokenKind::AccessToken)
            .await
            .unwrap();
        assert_eq!(&found, session);
    }
}

#[tokio::test]
async fn test_create_generates_refresh_token_when_enabled() {
    let f = fixture();

    let session = f
        .provider
        .create(&sdk_context("web-app"), "user-id", "principal-id")
        .await
        .unwrap();

    assert_eq!(
        session.refresh_token.len(),
        TOKEN_SECRET_LENGTH + session.id.as_str().len() + 1
    );
    assert_ne!(session.refresh_token, session.access_token);
}

#[tokio::test]
async fn test_create_skips_refresh_token_when_disabled() {
    let f = fixture();
    f.clients.upsert(
        "web-app",
        ClientConfig {
            refresh_token_disabled: true,
            ..ClientConfig::default()
        },
    );

    let session = f
        .provider
        .create(&sdk_context("web-app"), "user-id", "principal-id")
        .await
        .unwrap();

    assert!(session.refresh_token.is_empty());
    assert_eq!(
        f.store.expiry(&session.id),
        Some(StoreExpiry::After(std::time::Duration::from_secs(1800)))
    );
}

#[tokio::test]
async fn test_create_sets_store_ttl_to_longest_lifetime() {
    let f = fixture();

    let session = f
        .provider
        .create(&sdk_context("web-app"), "user-id", "principal-id")
        .await
        .unwrap();

    assert_eq!(
        f.store.expiry(&session.id),
        Some(StoreExpiry::After(std::time::Duration::from_secs(86400)))
    );
}

#[tokio::test]
async fn test_create_requires_configured_client() {
    let f = fixture();

    let result = f
        .provider
        .create(&sdk_context("unknown-app"), "user-id", "principal-id")
        .await;

    assert!(matches!(
        result,
        Err(SessionError::Store(AppError::FailedPrecondition(_)))
    ));
    assert!(f.store.is_empty());
}

struct UnavailableEventStore;

#[async_trait]
impl AccessEventStore for UnavailableEventStore {
    async fn append(&self, _: &SessionId, _: &AccessEvent, _: StoreExpiry) -> AppResult<()> {
        Err(AppError::external_service("redis down"))
    }

    async fn list(&self, _: &SessionId) -> AppResult<Vec<AccessEvent>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _: &SessionId) -> AppResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_create_rolls_back_session_when_access_event_fails() {
    let f = fixture();
    let provider = SessionProvider::new(
        f.store.clone(),
        Arc::new(UnavailableEventStore),
        f.clients.clone(),
        Arc::new(f.clock.clone()),
    );

    let result = provider
        .create(&sdk_context("web-app"), "user-id", "principal-id")
        .await;

    assert!(matches!(
        result,
        Err(SessionError::Store(AppError::ExternalService(_)))
    ));
    assert!(f.store.is_empty());
    assert!(provider.list("user-id").await.unwrap().is_empty());
}

// ============================================================================
// 按令牌解析
// ============================================================================

#[tokio::test]
async fn test_get_by_access_token() {
    let f = fixture();
    f.store.insert(fixture_session());

    let session = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await
        .unwrap();

    assert_eq!(session, fixture_session());
}

#[tokio::test]
async fn test_get_by_refresh_token() {
    let f = fixture();
    f.store.insert(fixture_session());

    let session = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.refresh-token", TokenKind::RefreshToken)
        .await
        .unwrap();

    assert_eq!(session, fixture_session());
}

#[tokio::test]
async fn test_get_does_not_mix_up_token_kinds() {
    let f = fixture();
    f.store.insert(fixture_session());
    let ctx = sdk_context("web-app");

    let result = f
        .provider
        .get_by_token(&ctx, "session-id.access-token", TokenKind::RefreshToken)
        .await;
    assert!(matches!(result, Err(SessionError::NotFound)));

    let result = f
        .provider
        .get_by_token(&ctx, "session-id.refresh-token", TokenKind::AccessToken)
        .await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test]
async fn test_get_does_not_match_empty_tokens() {
    let f = fixture();
    let ctx = sdk_context("web-app");

    let mut session = fixture_session();
    session.access_token = String::new();
    session.refresh_token = String::new();
    f.store.insert(session);

    for kind in [TokenKind::AccessToken, TokenKind::RefreshToken] {
        let result = f.provider.get_by_token(&ctx, "session-id.", kind).await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }
}

#[tokio::test]
async fn test_get_rejects_session_of_other_client() {
    let f = fixture();
    f.store.insert(fixture_session());

    let result = f
        .provider
        .get_by_token(&sdk_context("mobile-app"), "session-id.access-token", TokenKind::AccessToken)
        .await;

    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test]
async fn test_get_rejects_unknown_or_incorrect_token() {
    let f = fixture();
    f.store.insert(fixture_session());
    let ctx = sdk_context("web-app");

    for token in [
        "session-id-unknown.access-token",
        "session-id.incorrect-token",
        "invalid-token",
        "",
    ] {
        let result = f.provider.get_by_token(&ctx, token, TokenKind::AccessToken).await;
        assert!(matches!(result, Err(SessionError::NotFound)), "token {:?}", token);
    }
}

#[tokio::test]
async fn test_get_rejects_disabled_client() {
    let f = fixture();
    f.store.insert(fixture_session());
    f.clients.upsert(
        "web-app",
        ClientConfig {
            disabled: true,
            ..ClientConfig::default()
        },
    );

    let result = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await;

    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test]
async fn test_get_rejects_refresh_token_after_refresh_disabled() {
    let f = fixture();
    let ctx = sdk_context("web-app");
    let session = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    assert!(session.has_refresh_token());

    f.clients.upsert(
        "web-app",
        ClientConfig {
            refresh_token_disabled: true,
            ..ClientConfig::default()
        },
    );

    let result = f
        .provider
        .get_by_token(&ctx, &session.refresh_token, TokenKind::RefreshToken)
        .await;
    assert!(matches!(result, Err(SessionError::NotFound)));

    f.provider
        .get_by_token(&ctx, &session.access_token, TokenKind::AccessToken)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_rejects_missing_client() {
    let f = fixture();
    f.store.insert(fixture_session());
    f.clients.remove(&ClientId::new("web-app"));

    let result = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await;

    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test]
async fn test_get_rejects_expired_session() {
    let f = fixture();
    f.store.insert(fixture_session());
    f.clock.advance_seconds(1_000_000);

    let result = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await;

    assert!(matches!(result, Err(SessionError::NotFound)));
}

// ============================================================================
// 访问会话
// ============================================================================

#[tokio::test]
async fn test_access_updates_accessed_at_and_last_access() {
    let f = fixture();
    let mut session = fixture_session();
    f.store.insert(session.clone());
    f.clock.advance_seconds(100);
    let now = initial_time() + Duration::seconds(100);

    f.provider
        .access(&sdk_context("web-app"), &mut session)
        .await
        .unwrap();

    let event = sdk_access_event(now);
    assert_eq!(session.accessed_at, now);
    assert_eq!(session.last_access, event);
    assert_eq!(session.initial_access, AccessEvent::at(initial_time()));
    assert_eq!(session.created_at, initial_time());
    assert_eq!(session.access_token, "session-id.access-token");
    assert_eq!(f.events.events(&session.id), vec![event]);

    let stored = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await
        .unwrap();
    assert_eq!(stored.accessed_at, now);
}

#[tokio::test]
async fn test_access_keeps_session_alive_past_idle_timeout() {
    let f = fixture();
    let mut session = fixture_session();
    f.store.insert(session.clone());
    let ctx = sdk_context("web-app");

    // 默认空闲超时 300 秒
    for _ in 0..3 {
        f.clock.advance_seconds(200);
        f.provider.access(&ctx, &mut session).await.unwrap();
    }

    assert!(
        f.provider
            .get_by_token(&ctx, "session-id.access-token", TokenKind::AccessToken)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn test_access_on_deleted_session_is_not_found() {
    let f = fixture();
    let mut session = fixture_session();

    let result = f.provider.access(&sdk_context("web-app"), &mut session).await;

    assert!(matches!(result, Err(SessionError::NotFound)));
}

// ============================================================================
// 刷新访问令牌
// ============================================================================

#[tokio::test]
async fn test_refresh_rotates_access_token() {
    let f = fixture();
    let mut session = fixture_session();
    f.store.insert(session.clone());
    let ctx = sdk_context("web-app");
    f.clock.advance_seconds(60);

    let token = f.provider.refresh(&ctx, &mut session).await.unwrap();

    assert_ne!(token, "session-id.access-token");
    assert!(token.starts_with("session-id."));
    assert_eq!(session.access_token_created_at, initial_time() + Duration::seconds(60));
    assert_eq!(session.created_at, initial_time());

    let old = f
        .provider
        .get_by_token(&ctx, "session-id.access-token", TokenKind::AccessToken)
        .await;
    assert!(matches!(old, Err(SessionError::NotFound)));
    assert!(
        f.provider
            .get_by_token(&ctx, &token, TokenKind::AccessToken)
            .await
            .is_ok()
    );
}

// ============================================================================
// 撤销会话
// ============================================================================

#[tokio::test]
async fn test_invalidate_session() {
    let f = fixture();
    f.store.insert(fixture_session());

    f.provider
        .invalidate(&SessionId::from("session-id"))
        .await
        .unwrap();

    assert!(f.store.is_empty());
    let result = f
        .provider
        .get_by_token(&sdk_context("web-app"), "session-id.access-token", TokenKind::AccessToken)
        .await;
    assert!(matches!(result, Err(SessionError::NotFound)));
}

#[tokio::test]
async fn test_invalidate_removes_access_events() {
    let f = fixture();
    let session = f
        .provider
        .create(&sdk_context("web-app"), "user-id", "principal-id")
        .await
        .unwrap();
    assert_eq!(f.events.events(&session.id).len(), 1);

    f.provider.invalidate(&session.id).await.unwrap();

    assert!(f.events.events(&session.id).is_empty());
}

#[tokio::test]
async fn test_invalidate_clears_leftover_access_events() {
    let f = fixture();
    let id = SessionId::from("session-id");
    f.events
        .append(&id, &AccessEvent::at(initial_time()), StoreExpiry::Persist)
        .await
        .unwrap();

    f.provider.invalidate(&id).await.unwrap();

    assert!(f.events.events(&id).is_empty());
}

#[tokio::test]
async fn test_invalidate_unknown_session_succeeds() {
    let f = fixture();
    f.store.insert(fixture_session());

    f.provider
        .invalidate(&SessionId::from("session-id-unknown"))
        .await
        .unwrap();

    assert_eq!(f.store.len(), 1);
}

#[tokio::test]
async fn test_invalidate_all_keeps_current_session() {
    let f = fixture();
    let ctx = sdk_context("web-app");
    let current = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    let other_user = f.provider.create(&ctx, "other-user", "principal-id").await.unwrap();

    let count = f
        .provider
        .invalidate_all("user-id", Some(&current.id))
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert!(f.store.contains(&current.id));
    assert!(f.store.contains(&other_user.id));
    assert_eq!(f.store.len(), 2);
}

// ============================================================================
// 列出会话
// ============================================================================

fn make_session(id: &str, user_id: &str, client_id: &str, offset: i64) -> Session {
    let at = initial_time() + Duration::seconds(offset);
    Session {
        id: SessionId::from(id),
        client_id: ClientId::new(client_id),
        user_id: user_id.to_string(),
        principal_id: String::new(),
        access_token: String::new(),
        refresh_token: String::new(),
        created_at: at,
        access_token_created_at: at,
        accessed_at: at,
        initial_access: AccessEvent::at(at),
        last_access: AccessEvent::at(at),
    }
}

#[tokio::test]
async fn test_list_is_filtered_and_sorted() {
    let f = fixture();
    f.store.insert(make_session("b", "user-1", "mobile-app", 200));
    f.store.insert(make_session("a", "user-1", "web-app", 100));
    f.store.insert(make_session("c", "user-2", "web-app", -10000));
    f.store.insert(make_session("d", "user-2", "disabled-app", 400));
    f.clock.advance_seconds(500);

    let config = ClientConfig {
        access_token_lifetime: 1000,
        session_idle_timeout: 0,
        refresh_token_disabled: true,
        ..ClientConfig::default()
    };
    f.clients.upsert("web-app", config.clone());
    f.clients.upsert("mobile-app", config);

    let ids: Vec<String> = f
        .provider
        .list("user-1")
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id.0)
        .collect();
    assert_eq!(ids, vec!["a", "b"]);

    let sessions = f.provider.list("user-2").await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_access_events_history() {
    let f = fixture();
    let ctx = sdk_context("web-app");
    let mut session = f.provider.create(&ctx, "user-id", "principal-id").await.unwrap();
    f.clock.advance_seconds(10);
    f.provider.access(&ctx, &mut session).await.unwrap();

    let events = f.provider.access_events(&session.id).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].timestamp, initial_time());
    assert_eq!(events[1].timestamp, initial_time() + Duration::seconds(10));
}
