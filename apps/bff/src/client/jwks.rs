//! # JWKS 取得
//!
//! ID トークンの署名検証を有効にしたとき、起動時に一度だけ IdP の公開鍵セットを取得する。

use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwksError {
   #[error("JWKS の取得に失敗しました: {0}")]
   Network(#[from] reqwest::Error),

   #[error("JWKS エンドポイントがエラーを返しました: {0}")]
   Status(u16),

   #[error("JWKS に鍵がありません")]
   Empty,
}

/// JWKS エンドポイントから鍵セットを取得する
pub async fn fetch_jwks(jwks_uri: &str, timeout: Duration) -> Result<JwkSet, JwksError> {
   let client = reqwest::Client::builder().timeout(timeout).build()?;
   let response = client.get(jwks_uri).send().await?;

   let status = response.status();
   if !status.is_success() {
      return Err(JwksError::Status(status.as_u16()));
   }

   let jwks = response.json::<JwkSet>().await?;
   if jwks.keys.is_empty() {
      return Err(JwksError::Empty);
   }
   tracing::info!(keys = jwks.keys.len(), "JWKS を取得しました");
   Ok(jwks)
}
