//! # 認証ハンドラ
//!
//! OIDC 認可コードフローのエンドポイントを提供する。
//!
//! ## エンドポイント
//!
//! - `GET /auth/login` - ログイン開始（IdP へリダイレクト、または自動送信フォーム）
//! - `GET|POST {callback_path}` - IdP からのコールバック（既定: `/signin-oidc`）
//! - `GET /auth/status` - 認証状態
//! - `GET /auth/profile` - クレーム一覧（要認証）
//! - `POST /auth/logout`, `GET /auth/logout` - ログアウト
//! - `GET /auth/error` - 認証エラーページ
//!
//! ブラウザに渡すのは不透明なセッション ID の Cookie のみ。トークンはセッションストアに残る。

mod callback;
mod error_page;
mod login;
mod logout;
mod session;

use std::sync::Arc;

use axum::{
   Router,
   http::{HeaderValue, StatusCode, header},
   response::{IntoResponse, Response},
   routing::get,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
pub use callback::*;
pub use error_page::*;
use idbridge_domain::{clock::SharedClock, return_url::ROOT};
use idbridge_infra::SessionStore;
use idbridge_shared::event_log::error::category;
pub use login::*;
pub use logout::*;
use serde::{Deserialize, Serialize};
pub use session::*;
use utoipa::{IntoParams, ToSchema};

use crate::{
   config::OidcConfig,
   error::SESSION_COOKIE_NAME,
   usecase::{CallbackProcessor, ChallengeInitiator},
   view::TemplateRenderer,
};

/// 認証ハンドラの共有状態
pub struct AuthState {
   pub config:              Arc<OidcConfig>,
   pub challenge_initiator: ChallengeInitiator,
   pub callback_processor:  CallbackProcessor,
   pub session_store:       Arc<dyn SessionStore>,
   pub templates:           TemplateRenderer,
   pub clock:               SharedClock,
}

/// 認証ルートを組み立てる
///
/// コールバックのパスは設定値（`OIDC_CALLBACK_PATH`）に従う。
pub fn routes(state: Arc<AuthState>) -> Router {
   let callback_path = state.config.callback_path.clone();

   Router::new()
      .route("/auth/login", get(login))
      .route(&callback_path, get(callback).post(callback_form))
      .route("/auth/status", get(status))
      .route("/auth/profile", get(profile))
      .route("/auth/logout", get(logout_redirect).post(logout))
      .route("/auth/error", get(error_page))
      .with_state(state)
}

// --- リクエスト/レスポンス型 ---

/// returnUrl クエリ
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReturnUrlQuery {
   /// 認証・ログアウト後のリダイレクト先
   pub return_url: Option<String>,
}

/// 認証状態
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
   pub is_authenticated:    bool,
   pub name:                Option<String>,
   /// 認証スキーム名
   pub authentication_type: Option<String>,
   pub claims_count:        usize,
}

/// クレーム
#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimDto {
   #[serde(rename = "type")]
   pub claim_type: String,
   pub value:      String,
}

/// プロファイル
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
   pub is_authenticated:    bool,
   pub name:                Option<String>,
   pub claims:              Vec<ClaimDto>,
   pub authentication_type: String,
}

/// ログアウト結果
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
   pub message:      String,
   /// ブラウザが次に遷移する先（IdP のログアウト URL または returnUrl）
   pub redirect_url: String,
}

// --- レスポンスヘルパー ---

/// 302 Found
///
/// ヘッダー値にできない行き先は `/` に置き換える。
fn found(location: &str) -> Response {
   let location = HeaderValue::from_str(location).unwrap_or_else(|_| {
      tracing::warn!(
         error.category = category::INPUT,
         "ヘッダーに設定できないリダイレクト先を / に置き換えました"
      );
      HeaderValue::from_static(ROOT)
   });
   (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

// --- Cookie ヘルパー ---

/// セッション Cookie を構築する
///
/// max-age はセッションストアの TTL と揃える。
fn build_session_cookie(session_id: String, max_age_secs: u64, secure: bool) -> Cookie<'static> {
   let max_age = i64::try_from(max_age_secs).unwrap_or(i64::MAX);

   Cookie::build((SESSION_COOKIE_NAME, session_id))
      .path("/")
      .max_age(time::Duration::seconds(max_age))
      .http_only(true)
      .secure(secure)
      .same_site(SameSite::Lax)
      .build()
}

/// Cookie をクリアするための Cookie を構築する
fn build_clear_cookie(secure: bool) -> Cookie<'static> {
   Cookie::build((SESSION_COOKIE_NAME, ""))
      .path("/")
      .max_age(time::Duration::seconds(0))
      .http_only(true)
      .secure(secure)
      .same_site(SameSite::Lax)
      .build()
}

// --- テストユーティリティ ---

#[cfg(test)]
pub(super) mod test_utils {
   use std::sync::Arc;

   use axum::{
      Router,
      body::Body,
      http::{Request, Response},
   };
   use chrono::Duration;
   use idbridge_domain::{
      ClaimSet,
      SessionTicket,
      claim::{Claim, claim_types},
   };
   use idbridge_infra::{IdTokenDecoder, mock::MockSessionStore};

   use super::{AuthState, routes};
   use crate::{
      client::TokenClient,
      test_utils::{fixed_clock, fixed_now, oidc_config_with, state_protector, token_response},
      usecase::{CallbackProcessor, ChallengeInitiator},
      view::TemplateRenderer,
   };

   pub const TEST_SESSION_ID: &str = "0b1d9a4e-5f7c-4c3e-9a51-3e1c2a7d8f00";

   pub fn create_test_app(
      overrides: &[(&'static str, &'static str)],
      token_client: Arc<dyn TokenClient>,
      session_store: MockSessionStore,
   ) -> Router {
      let clock = fixed_clock();
      let config = oidc_config_with(overrides);
      let protector = state_protector(clock.clone());

      let state = Arc::new(AuthState {
         challenge_initiator: ChallengeInitiator::new(
            config.clone(),
            protector.clone(),
            clock.clone(),
         )
         .unwrap(),
         callback_processor: CallbackProcessor::new(
            config.clone(),
            protector,
            token_client,
            Arc::new(IdTokenDecoder::unverified()),
            clock.clone(),
         ),
         session_store: Arc::new(session_store),
         templates: TemplateRenderer::new().unwrap(),
         config,
         clock,
      });

      routes(state)
   }

   pub fn empty_store() -> MockSessionStore {
      MockSessionStore::new(fixed_clock())
   }

   /// `TEST_SESSION_ID` でログイン済みのセッションストア
   pub fn store_with_session() -> MockSessionStore {
      let mut claims = ClaimSet::new();
      claims.insert(Claim::new(claim_types::NAME_IDENTIFIER, "u1"));
      claims.insert(Claim::new("sub", "u1"));
      claims.insert(Claim::new(claim_types::NAME, "Test User"));
      claims.insert(Claim::new("name", "Test User"));
      let ticket = SessionTicket::assemble(
         claims,
         "oidc",
         token_response("header.payload.signature".to_string(), 3600),
         None,
         fixed_now() - Duration::seconds(60),
      );

      let store = empty_store();
      store.insert(TEST_SESSION_ID, ticket);
      store
   }

   pub fn session_cookie_header() -> String {
      format!("{}={TEST_SESSION_ID}", crate::error::SESSION_COOKIE_NAME)
   }

   pub fn get(uri: &str) -> Request<Body> {
      Request::builder().uri(uri).body(Body::empty()).unwrap()
   }

   pub fn get_with_session(uri: &str) -> Request<Body> {
      Request::builder()
         .uri(uri)
         .header("cookie", session_cookie_header())
         .body(Body::empty())
         .unwrap()
   }

   pub async fn body_json(response: Response<Body>) -> serde_json::Value {
      let body = axum::body::to_bytes(response.into_body(), usize::MAX)
         .await
         .unwrap();
      serde_json::from_slice(&body).unwrap()
   }

   pub async fn body_text(response: Response<Body>) -> String {
      let body = axum::body::to_bytes(response.into_body(), usize::MAX)
         .await
         .unwrap();
      String::from_utf8(body.to_vec()).unwrap()
   }

   pub fn location(response: &Response<Body>) -> &str {
      response.headers()["location"].to_str().unwrap()
   }

   pub fn set_cookie(response: &Response<Body>) -> &str {
      response.headers()["set-cookie"].to_str().unwrap()
   }
}
