//! # idbridge ドメイン層
//!
//! OIDC 認証フローで扱う値と、その不変条件を定義する。
//!
//! ## 依存関係の方向
//!
//! ```text
//! bff → infra → domain
//!   ↘           ↗
//!     ─────────
//! ```
//!
//! ドメイン層は HTTP・Redis・暗号ライブラリに依存しない。
//!
//! ## モジュール構成
//!
//! - [`authorization`] - 認可リクエストコンテキスト（state として往復する値）
//! - [`auth_failure`] - コールバック処理の失敗と理由コード
//! - [`claim`] - クレームと OIDC → 正規クレーム型の写像
//! - [`clock`] - 時刻プロバイダ
//! - [`return_url`] - リダイレクト先の検証
//! - [`ticket`] - セッションチケット
//! - [`token`] - トークンレスポンス

pub mod auth_failure;
pub mod authorization;
pub mod claim;
pub mod clock;
pub mod return_url;
pub mod ticket;
pub mod token;

pub use auth_failure::{AuthFailure, FailureCategory};
pub use authorization::AuthorizationRequestContext;
pub use claim::{Claim, ClaimSet};
pub use ticket::{SessionTicket, StoredTokens};
pub use token::TokenResponse;

/// ログ・Debug 出力で秘匿値の代わりに出す文字列
pub const REDACTED: &str = "[REDACTED]";
