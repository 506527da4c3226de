//! # インフラ層エラー定義
//!
//! セッションストア（Redis）や暗号・鍵の初期化で発生するエラーを表現する。
//!
//! ## 構造
//!
//! `std::io::Error` と同じ struct + enum パターン:
//! - [`InfraError`]: エラー種別（[`InfraErrorKind`]）と [`SpanTrace`] を保持するラッパー
//! - [`InfraErrorKind`]: エラーの具体的な種別
//!
//! `From` 実装や convenience constructor でエラーを生成した時点のスパン情報が記録される。

use std::fmt;

use derive_more::Display;
use thiserror::Error;
use tracing_error::SpanTrace;

/// インフラ層で発生するエラー
#[derive(Display)]
#[display("{kind}")]
pub struct InfraError {
   kind:       InfraErrorKind,
   span_trace: SpanTrace,
}

/// インフラ層エラーの種別
#[derive(Debug, Error)]
pub enum InfraErrorKind {
   /// Redis への接続失敗、コマンド実行エラーなど
   #[error("Redis エラー: {0}")]
   Redis(#[source] redis::RedisError),

   #[error("シリアライズエラー: {0}")]
   Serialization(#[source] serde_json::Error),

   /// 鍵・JWKS など起動時に与えられた素材が不正
   #[error("設定エラー: {0}")]
   Configuration(String),

   /// 暗号処理の失敗
   #[error("暗号処理エラー: {0}")]
   Crypto(String),
}

impl InfraError {
   pub fn kind(&self) -> &InfraErrorKind {
      &self.kind
   }

   pub fn span_trace(&self) -> &SpanTrace {
      &self.span_trace
   }

   fn with_kind(kind: InfraErrorKind) -> Self {
      Self {
         kind,
         span_trace: SpanTrace::capture(),
      }
   }

   /// 設定エラーを生成する
   pub fn configuration(msg: impl Into<String>) -> Self {
      Self::with_kind(InfraErrorKind::Configuration(msg.into()))
   }

   /// 暗号処理エラーを生成する
   pub fn crypto(msg: impl Into<String>) -> Self {
      Self::with_kind(InfraErrorKind::Crypto(msg.into()))
   }

   /// 再試行で回復しうる障害か
   ///
   /// Redis の接続断・接続拒否・タイムアウトのみ。
   pub fn is_transient(&self) -> bool {
      match &self.kind {
         InfraErrorKind::Redis(e) => {
            e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
         }
         _ => false,
      }
   }
}

impl fmt::Debug for InfraError {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("InfraError")
         .field("kind", &self.kind)
         .field("span_trace", &self.span_trace)
         .finish()
   }
}

impl std::error::Error for InfraError {
   fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
      self.kind.source()
   }
}

impl From<redis::RedisError> for InfraError {
   fn from(source: redis::RedisError) -> Self {
      Self::with_kind(InfraErrorKind::Redis(source))
   }
}

impl From<serde_json::Error> for InfraError {
   fn from(source: serde_json::Error) -> Self {
      Self::with_kind(InfraErrorKind::Serialization(source))
   }
}
