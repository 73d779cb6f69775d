use crate::db::UserRow;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "daycheck_session";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserRow),
}

impl SessionState {
    pub fn user(&self) -> Option<&UserRow> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

// Only logged-in sessions are stored; a missing or unknown id reads as Anonymous.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, UserRow>>,
}

impl SessionStore {
    pub fn state(&self, id: Option<&str>) -> SessionState {
        id.and_then(|id| self.lock().get(id).cloned())
            .map(SessionState::Authenticated)
            .unwrap_or_default()
    }

    pub fn login(&self, user: UserRow) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock().insert(id.clone(), user);
        id
    }

    pub fn logout(&self, id: Option<&str>) -> Option<UserRow> {
        id.and_then(|id| self.lock().remove(id))
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserRow>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub fn session_cookie_header(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

pub fn session_id_from_cookies(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}
