//! # セッションチケット
//!
//! 認証フローが成功したときの最終成果物。state 検証・トークン交換・クレーム抽出が
//! この順にすべて成功した場合にのみ [`SessionTicket::assemble`] で組み立てられる。
//! 永続化と Cookie への変換はセッションストア側の責務。

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
   REDACTED,
   authorization::AuthorizationRequestContext,
   claim::{ClaimSet, claim_types},
   token::TokenResponse,
};

/// リダイレクト先が無い場合の既定値
pub const DEFAULT_REDIRECT_URI: &str = "/";

/// `expires_in` として受け付ける上限（1 年）
const MAX_EXPIRES_IN_SECONDS: i64 = 60 * 60 * 24 * 366;

/// チケットに保持する IdP のトークン
///
/// ブラウザには渡さない。`Debug` 出力ではトークン値を伏せる。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
   pub access_token: String,
   pub id_token:     String,
   pub token_type:   String,
   pub expires_at:   DateTime<Utc>,
}

impl fmt::Debug for StoredTokens {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("StoredTokens")
         .field("access_token", &REDACTED)
         .field("id_token", &REDACTED)
         .field("token_type", &self.token_type)
         .field("expires_at", &self.expires_at)
         .finish()
   }
}

/// セッションチケット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTicket {
   pub claims:        ClaimSet,
   /// 認証スキーム名（`authenticationType` として公開される）
   pub scheme:        String,
   pub issued_at:     DateTime<Utc>,
   pub expires_at:    DateTime<Utc>,
   pub redirect_uri:  String,
   pub stored_tokens: StoredTokens,
}

impl SessionTicket {
   /// 成功したフローの結果からチケットを組み立てる
   ///
   /// - `issued_at = now`
   /// - `expires_at = now + token.expires_in`（`expires_in` は 0 〜 1 年に丸める）
   /// - `redirect_uri = context.return_url`（コンテキストが無ければ `/`）
   /// - トークンはそのままコピーする
   pub fn assemble(
      claims: ClaimSet,
      scheme: impl Into<String>,
      token: TokenResponse,
      context: Option<&AuthorizationRequestContext>,
      now: DateTime<Utc>,
   ) -> Self {
      let lifetime = token.expires_in.clamp(0, MAX_EXPIRES_IN_SECONDS);
      let expires_at = now + Duration::seconds(lifetime);
      let redirect_uri = context
         .map(|c| c.return_url.clone())
         .filter(|url| !url.is_empty())
         .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

      Self {
         claims,
         scheme: scheme.into(),
         issued_at: now,
         expires_at,
         redirect_uri,
         stored_tokens: StoredTokens {
            access_token: token.access_token,
            id_token: token.id_token,
            token_type: token.token_type,
            expires_at,
         },
      }
   }

   /// 表示名（正規の Name クレーム、無ければ OIDC の `name`）
   pub fn name(&self) -> Option<&str> {
      self.claims
         .find_first(claim_types::NAME)
         .or_else(|| self.claims.find_first("name"))
   }

   /// 主体識別子（正規の NameIdentifier クレーム、無ければ `sub`）
   pub fn subject(&self) -> Option<&str> {
      self.claims
         .find_first(claim_types::NAME_IDENTIFIER)
         .or_else(|| self.claims.find_first("sub"))
   }

   pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
      now >= self.expires_at
   }

   /// セッションストアに設定する残り秒数（最低 1 秒）
   pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
      let remaining = (self.expires_at - now).num_seconds();
      u64::try_from(remaining).unwrap_or(0).max(1)
   }
}

#[cfg(test)]
mod tests {
   use chrono::TimeZone;
   use pretty_assertions::assert_eq;

   use super::*;
   use crate::claim::Claim;

   fn token(expires_in: i64) -> TokenResponse {
      TokenResponse {
         access_token: "A".to_string(),
         id_token: "header.payload.sig".to_string(),
         token_type: "Bearer".to_string(),
         expires_in,
         scope: Some("openid profile".to_string()),
      }
   }

   fn claims() -> ClaimSet {
      let mut claims = ClaimSet::new();
      claims.insert(Claim::new(claim_types::NAME_IDENTIFIER, "u1"));
      claims.insert(Claim::new("sub", "u1"));
      claims.insert(Claim::new("name", "Taro"));
      claims
   }

   fn now() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
   }

   #[test]
   fn test_assemble_で有効期限とトークンが設定される() {
      let context =
         AuthorizationRequestContext::new("st".into(), "/dashboard".into(), now(), None);

      let ticket = SessionTicket::assemble(claims(), "oidc", token(3600), Some(&context), now());

      assert_eq!(ticket.scheme, "oidc");
      assert_eq!(ticket.issued_at, now());
      assert_eq!(ticket.expires_at, now() + Duration::seconds(3600));
      assert_eq!(ticket.redirect_uri, "/dashboard");
      assert_eq!(ticket.stored_tokens.access_token, "A");
      assert_eq!(ticket.stored_tokens.expires_at, ticket.expires_at);
      assert_eq!(ticket.subject(), Some("u1"));
   }

   #[test]
   fn test_assemble_でコンテキストが無ければルートにリダイレクトする() {
      let ticket = SessionTicket::assemble(claims(), "oidc", token(3600), None, now());

      assert_eq!(ticket.redirect_uri, DEFAULT_REDIRECT_URI);
   }

   #[test]
   fn test_nameは正規クレームが無ければoidcのnameを使う() {
      let ticket = SessionTicket::assemble(claims(), "oidc", token(60), None, now());

      assert_eq!(ticket.name(), Some("Taro"));
   }

   #[test]
   fn test_remaining_secondsは最低1秒() {
      let ticket = SessionTicket::assemble(claims(), "oidc", token(0), None, now());

      assert!(ticket.is_expired(now()));
      assert_eq!(ticket.remaining_seconds(now()), 1);
      assert_eq!(
         SessionTicket::assemble(claims(), "oidc", token(120), None, now())
            .remaining_seconds(now()),
         120
      );
   }

   #[test]
   fn test_debug出力にトークン値が含まれない() {
      let ticket = SessionTicket::assemble(claims(), "oidc", token(60), None, now());

      let debug = format!("{ticket:?}");

      assert!(!debug.contains("header.payload.sig"));
   }

   #[test]
   fn test_jsonで往復できる() {
      let ticket = SessionTicket::assemble(claims(), "oidc", token(60), None, now());

      let json = serde_json::to_string(&ticket).unwrap();
      let restored: SessionTicket = serde_json::from_str(&json).unwrap();

      assert_eq!(restored, ticket);
   }
}
