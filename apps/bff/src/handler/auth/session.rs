//! セッション参照ハンドラ（status, profile）

use std::sync::Arc;

use axum::{
   Json,
   extract::State,
   response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use idbridge_shared::ErrorResponse;

use super::{AuthState, AuthStatusResponse, ClaimDto, ProfileResponse};
use crate::error::{find_session, require_session};

/// GET /auth/status
///
/// 未認証でも 200 を返す。
#[utoipa::path(
   get,
   path = "/auth/status",
   tag = "auth",
   responses(
      (status = 200, description = "認証状態", body = AuthStatusResponse),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn status(State(state): State<Arc<AuthState>>, jar: CookieJar) -> Response {
   let session = match find_session(state.session_store.as_ref(), &jar).await {
      Ok(session) => session,
      Err(response) => return response,
   };

   let body = match session {
      Some((_, ticket)) => AuthStatusResponse {
         is_authenticated:    true,
         name:                ticket.name().map(str::to_string),
         authentication_type: Some(ticket.scheme.clone()),
         claims_count:        ticket.claims.len(),
      },
      None => AuthStatusResponse {
         is_authenticated:    false,
         name:                None,
         authentication_type: None,
         claims_count:        0,
      },
   };
   Json(body).into_response()
}

/// GET /auth/profile
///
/// セッションに保存されたクレームをすべて返す。トークンは含めない。
#[utoipa::path(
   get,
   path = "/auth/profile",
   tag = "auth",
   security(("session_auth" = [])),
   responses(
      (status = 200, description = "プロファイル", body = ProfileResponse),
      (status = 401, description = "未認証", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn profile(State(state): State<Arc<AuthState>>, jar: CookieJar) -> Response {
   let ticket = match require_session(state.session_store.as_ref(), &jar).await {
      Ok(ticket) => ticket,
      Err(response) => return response,
   };

   let body = ProfileResponse {
      is_authenticated:    true,
      name:                ticket.name().map(str::to_string),
      claims:              ticket
         .claims
         .iter()
         .map(|claim| ClaimDto {
            claim_type: claim.claim_type.clone(),
            value:      claim.value.clone(),
         })
         .collect(),
      authentication_type: ticket.scheme,
   };
   Json(body).into_response()
}
