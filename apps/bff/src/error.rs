//! # BFF エラーハンドリング
//!
//! Problem Details レスポンスへの変換と、ハンドラーが共通で使うセッション参照ヘルパー。

use axum::{
   Json,
   http::{HeaderMap, StatusCode, header},
   response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use idbridge_domain::SessionTicket;
use idbridge_infra::SessionStore;
use idbridge_shared::{
   ErrorResponse,
   event_log::error::{category, kind},
};

/// セッション Cookie 名
pub const SESSION_COOKIE_NAME: &str = "idbridge_session";

// --- 共通ヘルパー関数 ---

/// Cookie のセッション ID とセッションを取得する
///
/// Cookie が無い、またはセッションが存在しない・期限切れなら `Ok(None)`。
pub async fn find_session(
   session_store: &dyn SessionStore,
   jar: &CookieJar,
) -> Result<Option<(String, SessionTicket)>, Response> {
   let Some(session_id) = jar
      .get(SESSION_COOKIE_NAME)
      .map(|cookie| cookie.value().to_string())
      .filter(|id| !id.is_empty())
   else {
      return Ok(None);
   };

   match session_store.get(&session_id).await {
      Ok(ticket) => Ok(ticket.map(|t| (session_id, t))),
      Err(e) => {
         tracing::error!(
            error.category = category::INFRASTRUCTURE,
            error.kind = kind::SESSION,
            error.transient = e.is_transient(),
            "セッション取得で内部エラー: {}",
            e
         );
         Err(internal_error_response())
      }
   }
}

/// 認証済みセッションを要求する
///
/// セッションが無ければ 401 レスポンスを返す。
pub async fn require_session(
   session_store: &dyn SessionStore,
   jar: &CookieJar,
) -> Result<SessionTicket, Response> {
   find_session(session_store, jar)
      .await?
      .map(|(_, ticket)| ticket)
      .ok_or_else(unauthorized_response)
}

/// API クライアントからのリクエストかどうか
///
/// 次のいずれかに当てはまれば HTML ではなく JSON で応答する。
///
/// - `Accept` に `application/json` を含む
/// - パスが `/api` で始まる
/// - `X-Requested-With` ヘッダーがある
pub fn is_api_request(headers: &HeaderMap, path: &str) -> bool {
   let accepts_json = headers
      .get(header::ACCEPT)
      .and_then(|v| v.to_str().ok())
      .is_some_and(|v| v.contains("application/json"));

   accepts_json || path.starts_with("/api") || headers.contains_key("x-requested-with")
}

// --- レスポンスヘルパー ---

/// 未認証レスポンス
pub fn unauthorized_response() -> Response {
   (
      StatusCode::UNAUTHORIZED,
      Json(ErrorResponse::unauthorized("認証が必要です")),
   )
      .into_response()
}

/// 認証失敗レスポンス（コールバックの失敗）
///
/// `reason` には理由コードのみを渡す。
pub fn authentication_error_response(reason: &str) -> Response {
   (
      StatusCode::UNAUTHORIZED,
      Json(ErrorResponse::authentication_error(reason)),
   )
      .into_response()
}

/// 内部エラーレスポンス
pub fn internal_error_response() -> Response {
   (
      StatusCode::INTERNAL_SERVER_ERROR,
      Json(ErrorResponse::internal_error()),
   )
      .into_response()
}
