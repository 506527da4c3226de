//! # idbridge 共有ユーティリティ
//!
//! BFF・ドメイン層・インフラ層から共通で使用されるユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - ビジネスロジック（OIDC プロトコル処理）を含まない純粋なユーティリティのみを配置
//! - axum への依存は持ち込まない（HTTP レスポンス変換は BFF の責務）
//! - オブザーバビリティ関連は `observability` feature で有効化する

#[cfg(feature = "observability")]
pub mod canonical_log;
pub mod error_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use error_response::{ErrorResponse, ProblemKind};
pub use health::{CheckStatus, HealthResponse, ReadinessResponse, ReadinessStatus};
