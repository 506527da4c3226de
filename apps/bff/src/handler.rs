//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! - `health`: ヘルスチェック
//! - `auth`: OIDC ログイン・コールバック・セッション参照・ログアウト・エラーページ
//!
//! ハンドラは薄く保ち、プロトコル処理は [`crate::usecase`] に委譲する。

pub mod auth;
pub mod health;

pub use auth::{
   AuthState,
   callback,
   callback_form,
   error_page,
   login,
   logout,
   logout_redirect,
   profile,
   status,
};
pub use health::{ReadinessState, health_check, readiness_check};
