//! # エラーレスポンス（RFC 9457 Problem Details）
//!
//! BFF の JSON エラーはすべてこの形で返す。
//!
//! | 種別 | status | 用途 |
//! |------|--------|------|
//! | [`ProblemKind::Unauthorized`] | 401 | セッションが無い状態での保護エンドポイント呼び出し |
//! | [`ProblemKind::AuthenticationError`] | 401 | コールバックの失敗（`detail` は理由コード） |
//! | [`ProblemKind::InternalError`] | 500 | セッションストア障害など（`detail` は固定文言） |
//!
//! axum の `IntoResponse` 変換は BFF 側で行い、shared には axum 依存を入れない。

use serde::{Deserialize, Serialize};

/// error_type URI のベースパス
const ERROR_TYPE_BASE: &str = "https://idbridge.example.com/errors";

/// 500 の detail
const INTERNAL_ERROR_DETAIL: &str = "内部エラーが発生しました";

/// 問題の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemKind {
   Unauthorized,
   AuthenticationError,
   InternalError,
}

impl ProblemKind {
   fn slug(self) -> &'static str {
      match self {
         Self::Unauthorized => "unauthorized",
         Self::AuthenticationError => "authentication-error",
         Self::InternalError => "internal-error",
      }
   }

   fn title(self) -> &'static str {
      match self {
         Self::Unauthorized => "Unauthorized",
         Self::AuthenticationError => "Authentication Error",
         Self::InternalError => "Internal Server Error",
      }
   }

   pub fn status(self) -> u16 {
      match self {
         Self::Unauthorized | Self::AuthenticationError => 401,
         Self::InternalError => 500,
      }
   }
}

/// エラーレスポンス（RFC 9457 Problem Details）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema), schema(as = ProblemDetails))]
pub struct ErrorResponse {
   /// 問題の種類を識別する URI
   #[serde(rename = "type")]
   pub error_type: String,
   pub title:      String,
   pub status:     u16,
   /// クライアントに見せてよい情報のみ
   pub detail:     String,
}

impl ErrorResponse {
   pub fn of(kind: ProblemKind, detail: impl Into<String>) -> Self {
      Self {
         error_type: format!("{ERROR_TYPE_BASE}/{}", kind.slug()),
         title:      kind.title().to_string(),
         status:     kind.status(),
         detail:     detail.into(),
      }
   }

   pub fn unauthorized(detail: impl Into<String>) -> Self {
      Self::of(ProblemKind::Unauthorized, detail)
   }

   /// コールバック失敗
   ///
   /// `reason` には `invalid_state` のような理由コードのみを渡す。
   pub fn authentication_error(reason: impl Into<String>) -> Self {
      Self::of(ProblemKind::AuthenticationError, reason)
   }

   /// 内部エラー。detail は常に固定文言
   pub fn internal_error() -> Self {
      Self::of(ProblemKind::InternalError, INTERNAL_ERROR_DETAIL)
   }
}

#[cfg(test)]
mod tests {
   use rstest::rstest;

   use super::*;

   #[rstest]
   #[case(ProblemKind::Unauthorized, "unauthorized", "Unauthorized", 401)]
   #[case(
      ProblemKind::AuthenticationError,
      "authentication-error",
      "Authentication Error",
      401
   )]
   #[case(
      ProblemKind::InternalError,
      "internal-error",
      "Internal Server Error",
      500
   )]
   fn test_種別ごとのtypeとtitleとstatus(
      #[case] kind: ProblemKind,
      #[case] slug: &str,
      #[case] title: &str,
      #[case] status: u16,
   ) {
      let error = ErrorResponse::of(kind, "d");

      assert_eq!(
         error.error_type,
         format!("https://idbridge.example.com/errors/{slug}")
      );
      assert_eq!(error.title, title);
      assert_eq!(error.status, status);
   }

   #[test]
   fn test_authentication_errorのdetailは理由コード() {
      let error = ErrorResponse::authentication_error("invalid_state");

      assert_eq!(error.detail, "invalid_state");
   }

   #[test]
   fn test_internal_errorのdetailは固定() {
      assert_eq!(ErrorResponse::internal_error().detail, "内部エラーが発生しました");
   }

   #[test]
   fn test_jsonではtypeというフィールド名になる() {
      let json = serde_json::to_value(ErrorResponse::unauthorized("認証が必要です")).unwrap();

      assert_eq!(json["type"], "https://idbridge.example.com/errors/unauthorized");
      assert_eq!(json["detail"], "認証が必要です");
      assert!(json.get("error_type").is_none());
   }
}
