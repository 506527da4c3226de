//! ログイン開始ハンドラ

use std::sync::Arc;

use axum::{
   extract::{Query, State},
   http::{HeaderMap, header},
   response::{Html, IntoResponse, Response},
};
use idbridge_shared::{
   ErrorResponse,
   event_log::error::{category, kind},
};

use super::{AuthState, ReturnUrlQuery, found};
use crate::{error::internal_error_response, usecase::Challenge};

/// GET /auth/login
///
/// IdP の認可エンドポイントへ送り出す。
///
/// returnUrl は相対パス、またはリクエストのホスト・許可リストのホストを持つ絶対 URL のみ
/// 受け付ける。それ以外は `/` に置き換えて続行する。
#[utoipa::path(
   get,
   path = "/auth/login",
   tag = "auth",
   params(ReturnUrlQuery),
   responses(
      (status = 302, description = "IdP の認可エンドポイントへリダイレクト"),
      (status = 200, description = "認可エンドポイントへ POST する自動送信フォーム", content_type = "text/html", body = String),
      (status = 500, description = "内部エラー", body = ErrorResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn login(
   State(state): State<Arc<AuthState>>,
   headers: HeaderMap,
   Query(query): Query<ReturnUrlQuery>,
) -> Response {
   let request_host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

   let challenge = match state
      .challenge_initiator
      .initiate(query.return_url.as_deref(), request_host)
   {
      Ok(challenge) => challenge,
      Err(e) => {
         tracing::error!(
            error.category = category::INFRASTRUCTURE,
            error.kind = kind::INTERNAL,
            "認可リクエストの組み立てに失敗: {}",
            e
         );
         return internal_error_response();
      }
   };

   match challenge {
      Challenge::Redirect { location } => found(&location),
      Challenge::FormPost { action, fields } => {
         match state.templates.render_authorize_form(&action, &fields) {
            Ok(html) => Html(html).into_response(),
            Err(e) => {
               tracing::error!(
                  error.category = category::INFRASTRUCTURE,
                  error.kind = kind::TEMPLATE,
                  "認可フォームの描画に失敗: {}",
                  e
               );
               internal_error_response()
            }
         }
      }
   }
}
