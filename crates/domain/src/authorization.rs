//! # 認可リクエストコンテキスト
//!
//! ログイン試行ごとに生成され、保護された state としてブラウザ経由で IdP を往復し、
//! コールバックで 1 度だけ復元される。サーバー側には保存しない。

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 未来方向に許容する時計のずれ
const MAX_CLOCK_SKEW_SECONDS: i64 = 60;

/// 認可リクエストコンテキスト
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequestContext {
   /// CSRF 対策のランダムな state トークン
   pub state:         String,
   /// 認証完了後のリダイレクト先（検証済み）
   pub return_url:    String,
   pub issued_at:     DateTime<Utc>,
   /// PKCE の code_verifier（PKCE 無効時は `None`）
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub code_verifier: Option<String>,
}

impl AuthorizationRequestContext {
   pub fn new(
      state: String,
      return_url: String,
      issued_at: DateTime<Utc>,
      code_verifier: Option<String>,
   ) -> Self {
      Self {
         state,
         return_url,
         issued_at,
         code_verifier,
      }
   }

   /// `now` 時点で有効期限内かどうか
   ///
   /// `issued_at + ttl` を過ぎたもの、および許容範囲を超えて未来に発行されたものは無効。
   pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
      let not_expired = now <= self.issued_at + ttl;
      let not_from_future = self.issued_at <= now + Duration::seconds(MAX_CLOCK_SKEW_SECONDS);
      not_expired && not_from_future
   }
}
