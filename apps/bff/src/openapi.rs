//! # OpenAPI 仕様定義
//!
//! utoipa を使用して BFF の OpenAPI 仕様を Rust の型から自動生成する。
//! `ApiDoc::openapi()` で OpenAPI ドキュメントを取得できる。

use utoipa::{
   Modify,
   OpenApi,
   openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{
   error::SESSION_COOKIE_NAME,
   handler::{auth, health},
};

#[derive(OpenApi)]
#[openapi(
   info(
      title = "idbridge BFF API",
      version = "0.1.0",
      description = "OIDC 認可コードフローを代行する BFF 認証ゲートウェイ"
   ),
   paths(
      // health
      health::health_check,
      health::readiness_check,
      // auth
      auth::login,
      auth::callback,
      auth::callback_form,
      auth::status,
      auth::profile,
      auth::logout,
      auth::logout_redirect,
      auth::error_page,
   ),
   components(schemas(
      idbridge_shared::ErrorResponse,
      idbridge_shared::HealthResponse,
      idbridge_shared::ReadinessResponse,
      auth::AuthStatusResponse,
      auth::ProfileResponse,
      auth::ClaimDto,
      auth::LogoutResponse,
   )),
   modifiers(&SecurityAddon),
   tags(
      (name = "auth", description = "OIDC 認証"),
      (name = "health", description = "ヘルスチェック"),
   )
)]
pub struct ApiDoc;

/// セッション Cookie 認証のセキュリティスキームを追加する
struct SecurityAddon;

impl Modify for SecurityAddon {
   fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
      let components = openapi.components.get_or_insert_with(Default::default);
      components.add_security_scheme(
         "session_auth",
         SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new(SESSION_COOKIE_NAME))),
      );
   }
}
