//! # idbridge BFF ライブラリ
//!
//! ブラウザと OIDC プロバイダーの間に立ち、認可コードフローを代行する認証ゲートウェイ。
//!
//! ## モジュール構成
//!
//! - `client`: IdP のトークンエンドポイント・JWKS クライアント
//! - `config`: 環境変数からの設定読み込み
//! - `error`: Problem Details レスポンスとセッション参照ヘルパー
//! - `handler`: HTTP ハンドラ
//! - `middleware`: ミドルウェア（キャッシュ制御、Request ID）
//! - `openapi`: OpenAPI 仕様定義
//! - `usecase`: 認可リクエストの発行とコールバック処理
//! - `view`: HTML テンプレート

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod openapi;
#[cfg(test)]
mod test_utils;
pub mod usecase;
pub mod view;
