//! 内存存储实现，用于开发与测试

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use authgate_errors::AppResult;
use parking_lot::RwLock;

use crate::domain::access_event::AccessEvent;
use crate::domain::repositories::{
    ACCESS_EVENT_HISTORY_LIMIT, AccessEventStore, SessionStore, StoreExpiry, UserReadScope,
    UserStore,
};
use crate::domain::session::{Session, SessionId};
use crate::domain::user::UserRecord;

/// 内存会话存储，记录每次写入的过期设置但不主动淘汰
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, (Session, StoreExpiry)>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入记录
    pub fn insert(&self, session: Session) {
        self.sessions
            .write()
            .insert(session.id.clone(), (session, StoreExpiry::Persist));
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// 最近一次写入时的过期设置
    pub fn expiry(&self, id: &SessionId) -> Option<StoreExpiry> {
        self.sessions.read().get(id).map(|(_, expiry)| *expiry)
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &Session, expiry: StoreExpiry) -> AppResult<()> {
        self.sessions
            .write()
            .insert(session.id.clone(), (session.clone(), expiry));
        Ok(())
    }

    async fn update(&self, session: &Session, expiry: StoreExpiry) -> AppResult<bool> {
        let mut sessions = self.sessions.write();
        let Some(entry) = sessions.get_mut(&session.id) else {
            return Ok(false);
        };
        let expiry = match expiry {
            StoreExpiry::Keep => entry.1,
            other => other,
        };
        *entry = (session.clone(), expiry);
        Ok(true)
    }

    async fn get(&self, id: &SessionId) -> AppResult<Option<Session>> {
        Ok(self.sessions.read().get(id).map(|(s, _)| s.clone()))
    }

    async fn delete(&self, id: &SessionId) -> AppResult<bool> {
        Ok(self.sessions.write().remove(id).is_some())
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<Session>> {
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|(s, _)| s.user_id == user_id)
            .map(|(s, _)| s.clone())
            .collect())
    }
}

/// 内存访问事件存储
#[derive(Debug, Default)]
pub struct InMemoryAccessEventStore {
    events: RwLock<HashMap<SessionId, Vec<AccessEvent>>>,
}

impl InMemoryAccessEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self, session_id: &SessionId) -> Vec<AccessEvent> {
        self.events
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl AccessEventStore for InMemoryAccessEventStore {
    async fn append(
        &self,
        session_id: &SessionId,
        event: &AccessEvent,
        _expiry: StoreExpiry,
    ) -> AppResult<()> {
        let mut events = self.events.write();
        let history = events.entry(session_id.clone()).or_default();
        history.push(event.clone());
        if history.len() > ACCESS_EVENT_HISTORY_LIMIT {
            let overflow = history.len() - ACCESS_EVENT_HISTORY_LIMIT;
            history.drain(..overflow);
        }
        Ok(())
    }

    async fn list(&self, session_id: &SessionId) -> AppResult<Vec<AccessEvent>> {
        Ok(self.events(session_id))
    }

    async fn delete(&self, session_id: &SessionId) -> AppResult<()> {
        self.events.write().remove(session_id);
        Ok(())
    }
}

/// 内存用户存储，只读作用域持有开启时的快照
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    open_scopes: Arc<AtomicUsize>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, user: UserRecord) {
        self.users.write().insert(user.id.clone(), user);
    }

    pub fn remove(&self, user_id: &str) {
        self.users.write().remove(user_id);
    }

    /// 尚未结束的只读作用域数量
    pub fn open_scopes(&self) -> usize {
        self.open_scopes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn begin_read_only(&self) -> AppResult<Box<dyn UserReadScope>> {
        self.open_scopes.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SnapshotScope {
            users: self.users.read().clone(),
            open_scopes: self.open_scopes.clone(),
        }))
    }
}

struct SnapshotScope {
    users: HashMap<String, UserRecord>,
    open_scopes: Arc<AtomicUsize>,
}

#[async_trait]
impl UserReadScope for SnapshotScope {
    async fn get_auth(&mut self, user_id: &str) -> AppResult<Option<UserRecord>> {
        Ok(self.users.get(user_id).cloned())
    }

    async fn finish(self: Box<Self>) -> AppResult<()> {
        self.open_scopes.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
