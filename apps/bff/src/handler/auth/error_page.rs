//! 認証エラーページハンドラ

use std::sync::Arc;

use axum::{
   extract::{OriginalUri, Query, State},
   http::HeaderMap,
   response::{Html, IntoResponse, Response},
};
use idbridge_domain::AuthFailure;
use idbridge_shared::{
   ErrorResponse,
   event_log::error::{category, kind},
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::AuthState;
use crate::error::{authentication_error_response, internal_error_response, is_api_request};

/// 理由コードが不明なときの表示
const GENERIC_MESSAGE: &str = "認証中にエラーが発生しました";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ErrorPageQuery {
   /// 理由コード（例: `invalid_state`）
   pub message: Option<String>,
}

/// GET /auth/error
///
/// 既知の理由コードのみ表示する。クエリの値をそのまま画面に出さない。
#[utoipa::path(
   get,
   path = "/auth/error",
   tag = "auth",
   params(ErrorPageQuery),
   responses(
      (status = 200, description = "エラーページ", content_type = "text/html", body = String),
      (status = 401, description = "認証失敗（API クライアント）", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn error_page(
   State(state): State<Arc<AuthState>>,
   OriginalUri(uri): OriginalUri,
   headers: HeaderMap,
   Query(query): Query<ErrorPageQuery>,
) -> Response {
   let failure = query
      .message
      .as_deref()
      .and_then(AuthFailure::from_reason_code);
   let reason = failure.as_ref().map(AuthFailure::reason_code);

   if is_api_request(&headers, uri.path()) {
      return authentication_error_response(reason.as_deref().unwrap_or("unknown_error"));
   }

   let message = failure
      .as_ref()
      .map_or_else(|| GENERIC_MESSAGE.to_string(), ToString::to_string);

   match state
      .templates
      .render_error_page(&message, reason.as_deref(), state.clock.now())
   {
      Ok(html) => Html(html).into_response(),
      Err(e) => {
         tracing::error!(
            error.category = category::INFRASTRUCTURE,
            error.kind = kind::TEMPLATE,
            "エラーページの描画に失敗: {}",
            e
         );
         internal_error_response()
      }
   }
}
