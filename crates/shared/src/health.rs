//! # ヘルスチェック共通型
//!
//! `/health`（liveness）と `/health/ready`（readiness）のレスポンス型。
//! readiness はセッションストアのように、止まるとログインが成立しなくなる依存先だけを見る。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Liveness のレスポンス
///
/// ```
/// use idbridge_shared::HealthResponse;
///
/// let response = HealthResponse::healthy("0.1.0");
/// assert_eq!(response.status, "healthy");
/// ```
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
   pub status:  String,
   /// Cargo.toml のバージョン
   pub version: String,
}

impl HealthResponse {
   pub fn healthy(version: &str) -> Self {
      Self {
         status:  "healthy".to_string(),
         version: version.to_string(),
      }
   }
}

/// 依存先ごとのチェック結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum CheckStatus {
   Ok,
   Error,
}

impl CheckStatus {
   /// チェック処理の成否から変換する
   pub fn from_outcome<T, E>(outcome: &Result<T, E>) -> Self {
      if outcome.is_ok() { Self::Ok } else { Self::Error }
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum ReadinessStatus {
   Ready,
   NotReady,
}

/// Readiness のレスポンス
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadinessResponse {
   pub status: ReadinessStatus,
   /// キーはチェック名（`redis` など）
   pub checks: HashMap<String, CheckStatus>,
}

impl ReadinessResponse {
   /// 個別の結果から全体ステータスを導出する。1 つでも Error なら NotReady
   pub fn from_checks(checks: HashMap<String, CheckStatus>) -> Self {
      let status = if checks.values().all(|s| *s == CheckStatus::Ok) {
         ReadinessStatus::Ready
      } else {
         ReadinessStatus::NotReady
      };
      Self { status, checks }
   }

   pub fn is_ready(&self) -> bool {
      self.status == ReadinessStatus::Ready
   }
}
