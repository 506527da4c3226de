//! テスト用の共通部品
//!
//! 設定・時刻・state 保護・トークンエンドポイントのスタブをまとめる。

use std::{
   collections::HashMap,
   sync::{
      Arc,
      Mutex,
      atomic::{AtomicUsize, Ordering},
   },
};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use idbridge_domain::{
   TokenResponse,
   clock::{FixedClock, SharedClock},
};
use idbridge_infra::StateProtector;

use crate::{
   client::{CodeExchange, TokenClient, TokenEndpointError},
   config::{BffConfig, OidcConfig},
};

pub const TEST_MASTER_KEY: [u8; 32] = [7u8; 32];

pub fn fixed_now() -> DateTime<Utc> {
   Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

pub fn fixed_clock() -> SharedClock {
   Arc::new(FixedClock::new(fixed_now()))
}

/// 必須項目に加えて `overrides` を設定した BffConfig
pub fn bff_config_with(overrides: &[(&'static str, &'static str)]) -> BffConfig {
   let mut vars: HashMap<&str, &str> = HashMap::from([
      ("BFF_PORT", "13000"),
      ("BFF_PUBLIC_URL", "https://app.example.com"),
      ("REDIS_URL", "redis://localhost:6379"),
      ("OIDC_AUTHORITY", "https://idp.example.com"),
      ("OIDC_CLIENT_ID", "bff-client"),
   ]);
   vars.extend(overrides.iter().copied());
   BffConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
}

pub fn oidc_config_with(overrides: &[(&'static str, &'static str)]) -> Arc<OidcConfig> {
   Arc::new(bff_config_with(overrides).oidc)
}

pub fn state_protector(clock: SharedClock) -> Arc<StateProtector> {
   Arc::new(
      StateProtector::new(&TEST_MASTER_KEY, "oidc", chrono::Duration::seconds(600), clock)
         .unwrap(),
   )
}

/// 署名なしの ID トークン（`header.payload.signature` 形式）
pub fn id_token(payload: serde_json::Value) -> String {
   let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
   let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
   format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn token_response(id_token: String, expires_in: i64) -> TokenResponse {
   TokenResponse {
      access_token: "A".to_string(),
      id_token,
      token_type: "Bearer".to_string(),
      expires_in,
      scope: Some("openid profile".to_string()),
   }
}

/// 呼び出し回数を記録するトークンエンドポイントのスタブ
pub struct StubTokenClient {
   response:          Result<TokenResponse, TokenEndpointError>,
   calls:             AtomicUsize,
   last_verifier:     Mutex<Option<String>>,
   last_redirect_uri: Mutex<Option<String>>,
}

impl StubTokenClient {
   pub fn returning(response: Result<TokenResponse, TokenEndpointError>) -> Self {
      Self {
         response,
         calls: AtomicUsize::new(0),
         last_verifier: Mutex::new(None),
         last_redirect_uri: Mutex::new(None),
      }
   }

   pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
   }

   pub fn last_verifier(&self) -> Option<String> {
      self.last_verifier.lock().unwrap().clone()
   }

   pub fn last_redirect_uri(&self) -> Option<String> {
      self.last_redirect_uri.lock().unwrap().clone()
   }
}

#[async_trait]
impl TokenClient for StubTokenClient {
   async fn exchange_code(
      &self,
      exchange: CodeExchange<'_>,
   ) -> Result<TokenResponse, TokenEndpointError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      *self.last_verifier.lock().unwrap() = exchange.code_verifier.map(str::to_string);
      *self.last_redirect_uri.lock().unwrap() = Some(exchange.redirect_uri.to_string());
      self.response.clone()
   }
}
