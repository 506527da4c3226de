//! # セッションストア
//!
//! 認証フローで組み立てた [`SessionTicket`] を Redis に保存し、ブラウザには
//! 不透明なセッション ID だけを渡す。
//!
//! ## Redis キー設計
//!
//! | キー | 値 | TTL |
//! |-----|-----|-----|
//! | `session:{session_id}` | SessionTicket (JSON) | `expires_at - now`（最低 1 秒） |
//!
//! セッション ID は UUID v4。UUID として解釈できない ID は Redis に問い合わせずに
//! 存在しないものとして扱う。

use async_trait::async_trait;
use idbridge_domain::{SessionTicket, clock::SharedClock};
use redis::{AsyncCommands, aio::ConnectionManager};
use uuid::Uuid;

use crate::InfraError;

/// セッションストアトレイト
///
/// 認証フローの最終成果物を受け取り、Cookie に載せる ID を払い出す。
#[async_trait]
pub trait SessionStore: Send + Sync {
   /// チケットを保存し、セッション ID を返す
   async fn issue(&self, ticket: &SessionTicket) -> Result<String, InfraError>;

   /// セッションを取得する
   ///
   /// 存在しない、または有効期限を過ぎていれば `None`。
   async fn get(&self, session_id: &str) -> Result<Option<SessionTicket>, InfraError>;

   /// セッションを削除する
   ///
   /// 存在しないセッションを削除しても成功とする。
   async fn revoke(&self, session_id: &str) -> Result<(), InfraError>;

   /// セッションの TTL（残り秒数）を取得する（テスト用）
   async fn get_ttl(&self, session_id: &str) -> Result<Option<i64>, InfraError>;
}

/// Redis を使用したセッションストア
pub struct RedisSessionStore {
   conn:  ConnectionManager,
   clock: SharedClock,
}

impl RedisSessionStore {
   /// Redis に接続してセッションストアを作る
   ///
   /// - `redis_url`: Redis 接続 URL（例: `redis://localhost:6379`）
   pub async fn connect(redis_url: &str, clock: SharedClock) -> Result<Self, InfraError> {
      let client = redis::Client::open(redis_url)?;
      let conn = ConnectionManager::new(client).await?;
      Ok(Self { conn, clock })
   }

   /// ヘルスチェック用の接続
   pub fn connection(&self) -> ConnectionManager {
      self.conn.clone()
   }

   fn session_key(session_id: &str) -> Option<String> {
      Uuid::parse_str(session_id)
         .ok()
         .map(|id| format!("session:{id}"))
   }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
   async fn issue(&self, ticket: &SessionTicket) -> Result<String, InfraError> {
      let session_id = Uuid::new_v4().to_string();
      let key = format!("session:{session_id}");
      let json = serde_json::to_string(ticket)?;
      let ttl = ticket.remaining_seconds(self.clock.now());

      let mut conn = self.conn.clone();
      let _: () = conn.set_ex(&key, json, ttl).await?;

      tracing::debug!(ttl_seconds = ttl, "セッションを保存しました");
      Ok(session_id)
   }

   async fn get(&self, session_id: &str) -> Result<Option<SessionTicket>, InfraError> {
      let Some(key) = Self::session_key(session_id) else {
         return Ok(None);
      };
      let mut conn = self.conn.clone();

      let result: Option<String> = conn.get(&key).await?;
      let Some(json) = result else {
         return Ok(None);
      };

      let ticket: SessionTicket = serde_json::from_str(&json)?;
      if ticket.is_expired(self.clock.now()) {
         return Ok(None);
      }
      Ok(Some(ticket))
   }

   async fn revoke(&self, session_id: &str) -> Result<(), InfraError> {
      let Some(key) = Self::session_key(session_id) else {
         return Ok(());
      };
      let mut conn = self.conn.clone();
      let _: () = conn.del(&key).await?;
      Ok(())
   }

   async fn get_ttl(&self, session_id: &str) -> Result<Option<i64>, InfraError> {
      let Some(key) = Self::session_key(session_id) else {
         return Ok(None);
      };
      let mut conn = self.conn.clone();

      let ttl: i64 = conn.ttl(&key).await?;

      // -2: キーが存在しない、-1: TTL 未設定
      if ttl < 0 { Ok(None) } else { Ok(Some(ttl)) }
   }
}
