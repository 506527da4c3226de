//! # ヘルスチェックハンドラ
//!
//! - `/health`: Liveness Check（常に `"healthy"` を返す）
//! - `/health/ready`: Readiness Check（セッションストアの Redis に PING する）

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use idbridge_shared::{
   CheckStatus,
   HealthResponse,
   ReadinessResponse,
   event_log::error::{category, kind},
};
use redis::aio::ConnectionManager;

/// Redis チェックのタイムアウト
const REDIS_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// BFF のヘルスチェックエンドポイント
#[utoipa::path(
   get,
   path = "/health",
   tag = "health",
   responses(
      (status = 200, description = "サーバー稼働中", body = HealthResponse)
   )
)]
pub async fn health_check() -> Json<HealthResponse> {
   Json(HealthResponse::healthy(env!("CARGO_PKG_VERSION")))
}

/// Readiness Check 用の State
pub struct ReadinessState {
   pub redis_conn: ConnectionManager,
}

/// BFF の Readiness Check エンドポイント
///
/// Redis に到達できれば 200、できなければ 503。
#[utoipa::path(
   get,
   path = "/health/ready",
   tag = "health",
   responses(
      (status = 200, description = "セッションストア稼働中", body = ReadinessResponse),
      (status = 503, description = "セッションストアが利用不可", body = ReadinessResponse)
   )
)]
#[tracing::instrument(skip_all)]
pub async fn readiness_check(State(state): State<Arc<ReadinessState>>) -> impl IntoResponse {
   let redis = ping_redis(state.redis_conn.clone()).await;
   if let Err(reason) = &redis {
      tracing::warn!(
         error.category = category::INFRASTRUCTURE,
         error.kind = kind::SESSION,
         "Readiness: Redis に到達できません: {}",
         reason
      );
   }

   let response = ReadinessResponse::from_checks(HashMap::from([(
      "redis".to_string(),
      CheckStatus::from_outcome(&redis),
   )]));
   let http_status = if response.is_ready() {
      StatusCode::OK
   } else {
      StatusCode::SERVICE_UNAVAILABLE
   };

   (http_status, Json(response))
}

async fn ping_redis(mut conn: ConnectionManager) -> Result<(), String> {
   match tokio::time::timeout(
      REDIS_CHECK_TIMEOUT,
      redis::cmd("PING").query_async::<String>(&mut conn),
   )
   .await
   {
      Ok(Ok(_)) => Ok(()),
      Ok(Err(e)) => Err(e.to_string()),
      Err(_) => Err(format!("{}秒以内に応答がありません", REDIS_CHECK_TIMEOUT.as_secs())),
   }
}

#[cfg(test)]
mod tests {
   use axum::{Router, body::Body, http::Request, routing::get};
   use tower::ServiceExt;

   use super::*;

   #[tokio::test]
   async fn test_health_checkはhealthyとバージョンを返す() {
      let app = Router::new().route("/health", get(health_check));

      let response = app
         .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
         .await
         .unwrap();

      assert_eq!(response.status(), StatusCode::OK);
      let body = axum::body::to_bytes(response.into_body(), usize::MAX)
         .await
         .unwrap();
      let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
      assert_eq!(json["status"], "healthy");
      assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
   }
}
