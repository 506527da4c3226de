//! # 外部 API クライアント
//!
//! IdP のトークンエンドポイント・JWKS エンドポイントとの通信を担当する。

pub mod jwks;
pub mod token_endpoint;

pub use jwks::{JwksError, fetch_jwks};
pub use token_endpoint::{CodeExchange, TokenClient, TokenClientImpl, TokenEndpointError};
