//! # Challenge Initiator
//!
//! ログイン開始時に認可リクエストを組み立てる。
//!
//! 1. returnUrl を検証（不正なら警告ログを出して `/` に置き換える）
//! 2. 32 バイトの乱数から state を生成
//! 3. PKCE 有効時は code_verifier を生成
//! 4. [`AuthorizationRequestContext`] を [`StateProtector`] で保護
//! 5. リダイレクト先 URL または自動送信フォームの項目を返す
//!
//! サーバー側には何も保存しない。

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use idbridge_domain::{
   AuthorizationRequestContext,
   clock::SharedClock,
   return_url::{ReturnUrl, ReturnUrlPolicy},
};
use idbridge_infra::{InfraError, StateProtector};
use idbridge_shared::{
   event_log::{error::category, event},
   log_auth_event,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::{AuthorizationTransport, OidcConfig};

/// state のエントロピー（バイト）
const STATE_BYTES: usize = 32;

/// code_verifier の元になる乱数（バイト）。base64url で 64 文字になる。
const CODE_VERIFIER_BYTES: usize = 48;

/// IdP へ送り出す方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Challenge {
   /// 302 リダイレクト
   Redirect { location: String },
   /// 自動送信フォームによる POST
   FormPost {
      action: String,
      fields: Vec<(String, String)>,
   },
}

pub struct ChallengeInitiator {
   config:                 Arc<OidcConfig>,
   protector:              Arc<StateProtector>,
   return_url_policy:      ReturnUrlPolicy,
   authorization_endpoint: Url,
   clock:                  SharedClock,
}

impl ChallengeInitiator {
   pub fn new(
      config: Arc<OidcConfig>,
      protector: Arc<StateProtector>,
      clock: SharedClock,
   ) -> Result<Self, InfraError> {
      let authorization_endpoint = Url::parse(&config.authorization_endpoint).map_err(|e| {
         InfraError::configuration(format!("認可エンドポイントが不正です: {e}"))
      })?;
      let return_url_policy = ReturnUrlPolicy::new(config.allowed_return_hosts.iter().cloned());

      Ok(Self {
         config,
         protector,
         return_url_policy,
         authorization_endpoint,
         clock,
      })
   }

   /// 認可リクエストを組み立てる
   ///
   /// returnUrl が不正でも失敗しない。失敗するのは state の暗号化に失敗した場合のみ。
   pub fn initiate(
      &self,
      return_url: Option<&str>,
      request_host: Option<&str>,
   ) -> Result<Challenge, InfraError> {
      let return_url = self
         .return_url_policy
         .validate(return_url, request_host)
         .unwrap_or_else(|e| {
            tracing::warn!(error.category = category::INPUT, "returnUrl を / に置き換えました: {}", e);
            ReturnUrl::root()
         });

      let state = random_token::<STATE_BYTES>();
      let code_verifier = self.config.use_pkce.then(random_token::<CODE_VERIFIER_BYTES>);
      let code_challenge = code_verifier.as_deref().map(code_challenge_for);

      let context = AuthorizationRequestContext::new(
         state,
         return_url.into_string(),
         self.clock.now(),
         code_verifier,
      );
      let protected_state = self.protector.protect(&context)?;

      let mut params = vec![
         ("client_id", self.config.client_id.clone()),
         ("response_type", self.config.response_type.clone()),
         ("scope", self.config.scope.clone()),
         ("redirect_uri", self.config.redirect_uri.clone()),
         ("state", protected_state),
      ];
      if let Some(challenge) = code_challenge {
         params.push(("code_challenge", challenge));
         params.push(("code_challenge_method", "S256".to_string()));
      }

      log_auth_event!(
         event.action = event::action::CHALLENGE_ISSUED,
         event.result = event::result::SUCCESS,
         event.scheme = %self.config.scheme,
         transport = ?self.config.transport,
         pkce = self.config.use_pkce,
         "認可リクエストを発行しました"
      );

      Ok(match self.config.transport {
         AuthorizationTransport::Redirect => {
            let mut location = self.authorization_endpoint.clone();
            location.query_pairs_mut().extend_pairs(&params);
            Challenge::Redirect {
               location: location.into(),
            }
         }
         AuthorizationTransport::FormPost => Challenge::FormPost {
            action: self.authorization_endpoint.to_string(),
            fields: params
               .into_iter()
               .map(|(name, value)| (name.to_string(), value))
               .collect(),
         },
      })
   }
}

/// N バイトの乱数を base64url（パディングなし）で返す
fn random_token<const N: usize>() -> String {
   let bytes: [u8; N] = rand::rng().random();
   URL_SAFE_NO_PAD.encode(bytes)
}

/// `BASE64URL(SHA256(verifier))`
fn code_challenge_for(verifier: &str) -> String {
   URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
