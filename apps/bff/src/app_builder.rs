//! # BFF アプリケーション構築
//!
//! ルーター構築とミドルウェアの積み上げを担当する。
//! `main.rs` はインフラ初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
   Router,
   http::{HeaderName, HeaderValue, Method, header},
   middleware::from_fn,
   routing::get,
};
use idbridge_bff::{
   config::CorsConfig,
   handler::{AuthState, ReadinessState, auth, health_check, readiness_check},
   middleware::{no_cache, store_request_id},
};
use idbridge_shared::{
   canonical_log::CanonicalLogLineLayer,
   observability::{MakeRequestUuidV7, make_request_span},
};
use tower_http::{
   cors::{AllowOrigin, Any, CorsLayer},
   request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
   trace::TraceLayer,
};

/// ルーターを組み立てる
pub(crate) fn build_app(
   cors: &CorsConfig,
   auth_state: Arc<AuthState>,
   readiness_state: Arc<ReadinessState>,
) -> Router {
   Router::new()
      .route("/health", get(health_check))
      .merge(
         Router::new()
            .route("/health/ready", get(readiness_check))
            .with_state(readiness_state),
      )
      .merge(auth::routes(auth_state))
      .layer(cors_layer(cors))
      // 認証関連のレスポンスはすべてキャッシュさせない
      .layer(from_fn(no_cache))
      // レイヤー順序: 下に書いたものが外側
      // 1. SetRequestIdLayer（最外）: UUID v7 を生成（またはクライアント提供値を使用）
      // 2. TraceLayer: スパンに request_id を含める
      // 3. CanonicalLogLineLayer: リクエストごとに 1 行のサマリーログ
      // 4. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
      // 5. store_request_id: task-local に保存し、IdP へのリクエストに伝播する
      .layer(from_fn(store_request_id))
      .layer(PropagateRequestIdLayer::x_request_id())
      .layer(CanonicalLogLineLayer)
      .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
      .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
}

/// CORS レイヤー
///
/// 許可オリジンが未設定なら任意のオリジンを許可し、資格情報は送らせない。
fn cors_layer(cors: &CorsConfig) -> CorsLayer {
   let layer = CorsLayer::new()
      .allow_methods([Method::GET, Method::POST])
      .allow_headers([
         header::ACCEPT,
         header::CONTENT_TYPE,
         HeaderName::from_static("x-requested-with"),
      ]);

   if cors.allowed_origins.is_empty() {
      return layer.allow_origin(Any);
   }

   let origins: Vec<HeaderValue> = cors
      .allowed_origins
      .iter()
      .filter_map(|origin| match HeaderValue::from_str(origin) {
         Ok(value) => Some(value),
         Err(e) => {
            tracing::warn!("CORS オリジンを無視します: {} ({})", origin, e);
            None
         }
      })
      .collect();

   layer
      .allow_origin(AllowOrigin::list(origins))
      .allow_credentials(cors.allow_credentials)
}
