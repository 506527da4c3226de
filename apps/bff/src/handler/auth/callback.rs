//! コールバックハンドラ
//!
//! IdP からのリダイレクト（GET クエリ）と `form_post` 応答（POST フォーム）を同じ処理に流す。

use std::sync::Arc;

use axum::{
   Form,
   extract::{Query, State},
   http::HeaderMap,
   response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use idbridge_shared::{
   ErrorResponse,
   event_log::{
      error::{category, kind},
      event,
   },
   log_auth_event,
};

use super::{AuthState, build_session_cookie, found};
use crate::{
   error::{authentication_error_response, internal_error_response, is_api_request},
   usecase::CallbackParams,
};

/// GET /signin-oidc
///
/// パスは `OIDC_CALLBACK_PATH` で変更できる。
#[utoipa::path(
   get,
   path = "/signin-oidc",
   tag = "auth",
   params(CallbackParams),
   responses(
      (status = 302, description = "成功時は returnUrl、失敗時は /auth/error へリダイレクト"),
      (status = 401, description = "認証失敗（API クライアント）", body = ErrorResponse),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn callback(
   State(state): State<Arc<AuthState>>,
   headers: HeaderMap,
   jar: CookieJar,
   Query(params): Query<CallbackParams>,
) -> Response {
   complete_sign_in(&state, &headers, jar, params).await
}

/// POST /signin-oidc
///
/// `response_mode=form_post` の IdP 向け。
#[utoipa::path(
   post,
   path = "/signin-oidc",
   tag = "auth",
   request_body(content = CallbackParams, content_type = "application/x-www-form-urlencoded"),
   responses(
      (status = 302, description = "成功時は returnUrl、失敗時は /auth/error へリダイレクト"),
      (status = 401, description = "認証失敗（API クライアント）", body = ErrorResponse),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn callback_form(
   State(state): State<Arc<AuthState>>,
   headers: HeaderMap,
   jar: CookieJar,
   Form(params): Form<CallbackParams>,
) -> Response {
   complete_sign_in(&state, &headers, jar, params).await
}

/// コールバックを処理し、成功ならセッションを発行する
async fn complete_sign_in(
   state: &AuthState,
   headers: &HeaderMap,
   jar: CookieJar,
   params: CallbackParams,
) -> Response {
   let ticket = match state.callback_processor.process(&params).await {
      Ok(ticket) => ticket,
      Err(failure) => {
         let reason = failure.reason_code();
         log_auth_event!(
            event.action = event::action::LOGIN_FAILURE,
            event.result = event::result::FAILURE,
            event.scheme = %state.config.scheme,
            event.reason = %reason,
            error.category = failure.category().as_str(),
            "ログインに失敗しました"
         );

         return if is_api_request(headers, &state.config.callback_path) {
            authentication_error_response(&reason)
         } else {
            found(&format!(
               "/auth/error?message={}",
               urlencoding::encode(&reason)
            ))
         };
      }
   };

   let session_id = match state.session_store.issue(&ticket).await {
      Ok(id) => id,
      Err(e) => {
         tracing::error!(
            error.category = category::INFRASTRUCTURE,
            error.kind = kind::SESSION,
            "セッションの保存に失敗: {}",
            e
         );
         return internal_error_response();
      }
   };

   log_auth_event!(
      event.action = event::action::LOGIN_SUCCESS,
      event.result = event::result::SUCCESS,
      event.scheme = %ticket.scheme,
      claims = ticket.claims.len(),
      "ログインしました"
   );

   let cookie = build_session_cookie(
      session_id,
      ticket.remaining_seconds(state.clock.now()),
      state.config.secure_cookies(),
   );
   (jar.add(cookie), found(&ticket.redirect_uri)).into_response()
}
