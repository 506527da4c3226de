//! # Callback Processor
//!
//! IdP からのコールバックを検証し、セッションチケットを組み立てる。
//!
//! ```text
//! AwaitingCallback → StateValidating → CodeExchanging → ClaimsExtracting → TicketIssued
//!        └──────────────────┴────────────────┴─────────────────┴──→ Failed(reason)
//! ```
//!
//! 各段の失敗は [`AuthFailure`] に集約し、呼び出し側には理由コードだけを返す。
//! 無効な state はトークンエンドポイントに到達しない。
//! トークンと認可コードはログに出さない。

use std::{fmt, sync::Arc};

use idbridge_domain::{
   AuthFailure,
   AuthorizationRequestContext,
   REDACTED,
   SessionTicket,
   clock::SharedClock,
};
use idbridge_infra::{IdTokenDecoder, StateProtector};
use idbridge_shared::event_log::error::{category, kind};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
   client::{CodeExchange, TokenClient, TokenEndpointError},
   config::OidcConfig,
};

/// コールバックのパラメータ（クエリ文字列またはフォーム）
///
/// 空文字のパラメータは未指定として扱う。
#[derive(Default, Clone, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
   /// 認可コード
   pub code:              Option<String>,
   /// ログイン開始時に発行した保護済み state
   pub state:             Option<String>,
   /// IdP が返したエラーコード
   pub error:             Option<String>,
   pub error_description: Option<String>,
}

impl CallbackParams {
   fn code(&self) -> Option<&str> {
      non_empty(self.code.as_deref())
   }

   fn state(&self) -> Option<&str> {
      non_empty(self.state.as_deref())
   }

   fn error(&self) -> Option<&str> {
      non_empty(self.error.as_deref())
   }
}

impl fmt::Debug for CallbackParams {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("CallbackParams")
         .field("code", &self.code.as_ref().map(|_| REDACTED))
         .field("state", &self.state.as_ref().map(|_| REDACTED))
         .field("error", &self.error)
         .field("error_description", &self.error_description)
         .finish()
   }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
   value.filter(|v| !v.is_empty())
}

pub struct CallbackProcessor {
   config:           Arc<OidcConfig>,
   protector:        Arc<StateProtector>,
   token_client:     Arc<dyn TokenClient>,
   id_token_decoder: Arc<IdTokenDecoder>,
   clock:            SharedClock,
}

impl CallbackProcessor {
   pub fn new(
      config: Arc<OidcConfig>,
      protector: Arc<StateProtector>,
      token_client: Arc<dyn TokenClient>,
      id_token_decoder: Arc<IdTokenDecoder>,
      clock: SharedClock,
   ) -> Self {
      Self {
         config,
         protector,
         token_client,
         id_token_decoder,
         clock,
      }
   }

   /// コールバックを処理する
   ///
   /// 1. `error` パラメータがあれば即座に失敗（外部呼び出しなし）
   /// 2. `code` が無ければ失敗
   /// 3. `state` があれば復号（失敗すれば交換前に終了）
   /// 4. トークン交換（1 回のみ、再試行なし）
   /// 5. ID トークンからクレームを抽出
   /// 6. セッションチケットを組み立てる
   #[tracing::instrument(skip_all, fields(scheme = %self.config.scheme))]
   pub async fn process(&self, params: &CallbackParams) -> Result<SessionTicket, AuthFailure> {
      if let Some(error) = params.error() {
         let failure = AuthFailure::idp_error(error);
         tracing::warn!(
            error.category = category::INPUT,
            idp_error = %failure.reason_code(),
            error_description = params.error_description.as_deref().unwrap_or(""),
            "IdP がエラーを返しました"
         );
         return Err(failure);
      }

      let Some(code) = params.code() else {
         tracing::warn!(error.category = category::INPUT, "認可コードがありません");
         return Err(AuthFailure::MissingCode);
      };

      let context = self.validate_state(params.state())?;

      let token = self
         .token_client
         .exchange_code(CodeExchange {
            code,
            redirect_uri: &self.config.redirect_uri,
            code_verifier: context.as_ref().and_then(|c| c.code_verifier.as_deref()),
         })
         .await
         .map_err(log_exchange_failure)?;
      tracing::info!(token_type = %token.token_type, expires_in = token.expires_in, "トークンを取得しました");

      let Some(claims) = self.id_token_decoder.extract_claims(&token.id_token) else {
         tracing::warn!(
            error.category = category::TOKEN_PARSE,
            verifying = self.id_token_decoder.is_verifying(),
            "ID トークンからクレームを抽出できませんでした"
         );
         return Err(AuthFailure::ClaimsExtractionFailed);
      };

      let ticket = SessionTicket::assemble(
         claims,
         self.config.scheme.as_str(),
         token,
         context.as_ref(),
         self.clock.now(),
      );
      tracing::info!(
         claims = ticket.claims.len(),
         expires_at = %ticket.expires_at,
         "セッションチケットを組み立てました"
      );
      Ok(ticket)
   }

   fn validate_state(
      &self,
      state: Option<&str>,
   ) -> Result<Option<AuthorizationRequestContext>, AuthFailure> {
      let Some(state) = state else {
         tracing::warn!(error.category = category::STATE, "state がありません。リダイレクト先は / になります");
         return Ok(None);
      };

      match self.protector.unprotect(state) {
         Some(context) => {
            tracing::info!("state を検証しました");
            Ok(Some(context))
         }
         None => {
            tracing::warn!(error.category = category::STATE, "state が不正または期限切れです");
            Err(AuthFailure::InvalidState)
         }
      }
   }
}

fn log_exchange_failure(err: TokenEndpointError) -> AuthFailure {
   if let TokenEndpointError::Rejected { status, body } = &err {
      tracing::debug!(status, body = %body, "トークンエンドポイントの応答");
   }
   tracing::error!(
      error.category = category::EXTERNAL_SERVICE,
      error.kind = kind::TOKEN_EXCHANGE,
      "トークン交換に失敗しました: {}",
      err
   );
   AuthFailure::ExchangeFailed
}
