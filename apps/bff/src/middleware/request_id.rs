//! # Request ID 伝播ミドルウェア
//!
//! ブラウザ → BFF → IdP トークンエンドポイントまで同じ Request ID を引き回す。
//!
//! 1. [`store_request_id`] が `SetRequestIdLayer` の設定した
//!    [`RequestId`](tower_http::request_id::RequestId) を task-local に保存する
//! 2. [`inject_request_id`] が task-local の値を reqwest の `RequestBuilder` に
//!    `x-request-id` ヘッダーとして付与する

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use idbridge_shared::observability::REQUEST_ID_HEADER;
use tower_http::request_id::RequestId;

tokio::task_local! {
   static REQUEST_ID: String;
}

/// 現在のリクエストの Request ID
///
/// task-local スコープ外（起動時の JWKS 取得やテスト）では `None`。
pub fn current_request_id() -> Option<String> {
   REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Request ID を task-local に保存するミドルウェア
pub async fn store_request_id(request: Request<Body>, next: Next) -> Response {
   let request_id = request
      .extensions()
      .get::<RequestId>()
      .and_then(|id| id.header_value().to_str().ok())
      .unwrap_or("-")
      .to_string();

   REQUEST_ID.scope(request_id, next.run(request)).await
}

/// 外部呼び出しに `x-request-id` ヘッダーを付与する
pub fn inject_request_id(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
   match current_request_id() {
      Some(id) => builder.header(REQUEST_ID_HEADER, id),
      None => builder,
   }
}
