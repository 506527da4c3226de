//! # ユースケース層
//!
//! OIDC 認可コードフローの 2 つの入口を実装する。
//!
//! - [`challenge`]: 認可リクエストの組み立て（ログイン開始）
//! - [`callback`]: コールバックの検証からセッションチケット組み立てまで
//!
//! 依存はすべて `Arc` で外部から注入し、ハンドラーは薄く保つ。

pub mod callback;
pub mod challenge;

pub use callback::{CallbackParams, CallbackProcessor};
pub use challenge::{Challenge, ChallengeInitiator};
