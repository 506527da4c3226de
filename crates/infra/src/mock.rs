//! # テスト用モックセッションストア
//!
//! ハンドラー・ユースケースのテストで使用するインメモリ実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! idbridge-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
   collections::HashMap,
   sync::{Arc, Mutex},
};

use async_trait::async_trait;
use idbridge_domain::{SessionTicket, clock::SharedClock};
use uuid::Uuid;

use crate::{error::InfraError, session::SessionStore};

#[derive(Clone)]
pub struct MockSessionStore {
   sessions: Arc<Mutex<HashMap<String, SessionTicket>>>,
   clock:    SharedClock,
}

impl MockSessionStore {
   pub fn new(clock: SharedClock) -> Self {
      Self {
         sessions: Arc::new(Mutex::new(HashMap::new())),
         clock,
      }
   }

   /// 指定した ID でセッションを登録する
   pub fn insert(&self, session_id: &str, ticket: SessionTicket) {
      self
         .sessions
         .lock()
         .unwrap()
         .insert(session_id.to_string(), ticket);
   }

   pub fn len(&self) -> usize {
      self.sessions.lock().unwrap().len()
   }

   pub fn is_empty(&self) -> bool {
      self.len() == 0
   }
}

#[async_trait]
impl SessionStore for MockSessionStore {
   async fn issue(&self, ticket: &SessionTicket) -> Result<String, InfraError> {
      let session_id = Uuid::new_v4().to_string();
      self.insert(&session_id, ticket.clone());
      Ok(session_id)
   }

   async fn get(&self, session_id: &str) -> Result<Option<SessionTicket>, InfraError> {
      let now = self.clock.now();
      Ok(self
         .sessions
         .lock()
         .unwrap()
         .get(session_id)
         .filter(|ticket| !ticket.is_expired(now))
         .cloned())
   }

   async fn revoke(&self, session_id: &str) -> Result<(), InfraError> {
      self.sessions.lock().unwrap().remove(session_id);
      Ok(())
   }

   async fn get_ttl(&self, session_id: &str) -> Result<Option<i64>, InfraError> {
      let now = self.clock.now();
      Ok(self
         .sessions
         .lock()
         .unwrap()
         .get(session_id)
         .map(|ticket| ticket.remaining_seconds(now) as i64))
   }
}
