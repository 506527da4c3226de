//! # トークンレスポンス
//!
//! 認可コード交換に成功したときに IdP のトークンエンドポイントから得られる値。
//! 1 回の交換につき 1 度だけ生成され、再試行もキャッシュもしない。

use std::fmt;

use crate::REDACTED;

/// トークンレスポンス
///
/// `Debug` 出力ではトークン値を伏せる。
#[derive(Clone, PartialEq, Eq)]
pub struct TokenResponse {
   pub access_token: String,
   pub id_token:     String,
   pub token_type:   String,
   /// アクセストークンの有効期間（秒）
   pub expires_in:   i64,
   pub scope:        Option<String>,
}

impl fmt::Debug for TokenResponse {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TokenResponse")
         .field("access_token", &REDACTED)
         .field("id_token", &REDACTED)
         .field("token_type", &self.token_type)
         .field("expires_in", &self.expires_in)
         .field("scope", &self.scope)
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_debug出力にトークン値が含まれない() {
      let response = TokenResponse {
         access_token: "secret-access".to_string(),
         id_token:     "secret-id".to_string(),
         token_type:   "Bearer".to_string(),
         expires_in:   3600,
         scope:        None,
      };

      let debug = format!("{response:?}");

      assert!(!debug.contains("secret-access"));
      assert!(!debug.contains("secret-id"));
      assert!(debug.contains("Bearer"));
   }
}
