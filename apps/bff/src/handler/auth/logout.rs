//! ログアウトハンドラ

use std::sync::Arc;

use axum::{
   Json,
   extract::{Query, State},
   response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use idbridge_domain::{SessionTicket, return_url::ReturnUrl};
use idbridge_shared::{
   ErrorResponse,
   event_log::{
      error::{category, kind},
      event,
   },
   log_auth_event,
};
use url::Url;

use super::{AuthState, LogoutResponse, ReturnUrlQuery, build_clear_cookie, found};
use crate::{
   config::OidcConfig,
   error::{find_session, internal_error_response},
};

/// ログアウトの結果
struct LogoutOutcome {
   message:      &'static str,
   redirect_url: String,
}

/// POST /auth/logout
///
/// セッションを破棄し、ブラウザの遷移先を JSON で返す。
/// 未ログインでも 200 を返す。
#[utoipa::path(
   post,
   path = "/auth/logout",
   tag = "auth",
   params(ReturnUrlQuery),
   responses(
      (status = 200, description = "ログアウト完了", body = LogoutResponse),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn logout(
   State(state): State<Arc<AuthState>>,
   jar: CookieJar,
   Query(query): Query<ReturnUrlQuery>,
) -> Response {
   match sign_out(&state, &jar, query.return_url.as_deref()).await {
      Ok(outcome) => (
         jar.add(build_clear_cookie(state.config.secure_cookies())),
         Json(LogoutResponse {
            message:      outcome.message.to_string(),
            redirect_url: outcome.redirect_url,
         }),
      )
         .into_response(),
      Err(response) => response,
   }
}

/// GET /auth/logout
///
/// リンクからのログアウト用。遷移先へ 302 でリダイレクトする。
#[utoipa::path(
   get,
   path = "/auth/logout",
   tag = "auth",
   params(ReturnUrlQuery),
   responses(
      (status = 302, description = "IdP のログアウト URL または returnUrl へリダイレクト"),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn logout_redirect(
   State(state): State<Arc<AuthState>>,
   jar: CookieJar,
   Query(query): Query<ReturnUrlQuery>,
) -> Response {
   match sign_out(&state, &jar, query.return_url.as_deref()).await {
      Ok(outcome) => (
         jar.add(build_clear_cookie(state.config.secure_cookies())),
         found(&outcome.redirect_url),
      )
         .into_response(),
      Err(response) => response,
   }
}

async fn sign_out(
   state: &AuthState,
   jar: &CookieJar,
   return_url: Option<&str>,
) -> Result<LogoutOutcome, Response> {
   let return_url = ReturnUrl::relative_only(return_url).unwrap_or_else(|e| {
      tracing::warn!("returnUrl を / に置き換えます: {}", e);
      ReturnUrl::root()
   });

   let Some((session_id, ticket)) = find_session(state.session_store.as_ref(), jar).await? else {
      return Ok(LogoutOutcome {
         message:      "Already logged out",
         redirect_url: return_url.into_string(),
      });
   };

   if let Err(e) = state.session_store.revoke(&session_id).await {
      tracing::error!(
         error.category = category::INFRASTRUCTURE,
         error.kind = kind::SESSION,
         "セッションの削除に失敗: {}",
         e
      );
      return Err(internal_error_response());
   }

   log_auth_event!(
      event.action = event::action::LOGOUT,
      event.result = event::result::SUCCESS,
      event.scheme = %ticket.scheme,
      federated = state.config.federated_signout,
      "ログアウトしました"
   );

   let redirect_url = if state.config.federated_signout {
      end_session_url(&state.config, &ticket, &return_url).unwrap_or_else(|e| {
         tracing::warn!("IdP のログアウト URL を組み立てられません: {}", e);
         return_url.into_string()
      })
   } else {
      return_url.into_string()
   };

   Ok(LogoutOutcome {
      message: "Logged out successfully",
      redirect_url,
   })
}

/// IdP の end_session エンドポイントへの URL
///
/// ログアウト後は `public_url + returnUrl` に戻ってくるよう指定する。
fn end_session_url(
   config: &OidcConfig,
   ticket: &SessionTicket,
   return_url: &ReturnUrl,
) -> Result<String, url::ParseError> {
   let mut url = Url::parse(&config.end_session_endpoint)?;
   let post_logout_redirect_uri = format!(
      "{}{}",
      config.public_url.trim_end_matches('/'),
      return_url.as_str()
   );

   url.query_pairs_mut()
      .append_pair("id_token_hint", &ticket.stored_tokens.id_token)
      .append_pair("post_logout_redirect_uri", &post_logout_redirect_uri)
      .append_pair("client_id", &config.client_id);

   Ok(url.into())
}
