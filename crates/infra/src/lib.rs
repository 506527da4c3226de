//! # idbridge インフラ層
//!
//! 暗号・トークン・Redis といった外部ライブラリや外部システムに依存する処理を担当する。
//!
//! ## 依存関係
//!
//! ```text
//! bff → infra → domain
//! ```
//!
//! ドメイン層の値（[`idbridge_domain::AuthorizationRequestContext`]、
//! [`idbridge_domain::SessionTicket`] など）を受け取り、暗号化・検証・永続化する。
//!
//! ## モジュール構成
//!
//! - [`error`] - インフラ層エラー定義
//! - [`id_token`] - ID トークンからのクレーム抽出
//! - `mock` - テスト用インメモリ実装（`test-utils` feature）
//! - [`session`] - セッションストア（Redis）
//! - [`state_protector`] - state パラメータの暗号化・復号

pub mod error;
pub mod id_token;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod session;
pub mod state_protector;

pub use error::InfraError;
pub use id_token::IdTokenDecoder;
pub use session::{RedisSessionStore, SessionStore};
pub use state_protector::StateProtector;
