//! # キャッシュ制御ミドルウェア
//!
//! 認証状態を含むレスポンスやリダイレクトが共有キャッシュに残らないよう、
//! すべてのレスポンスに `Cache-Control: no-store` を設定する。

use axum::{
   extract::Request,
   http::{HeaderValue, header},
   middleware::Next,
   response::Response,
};

/// `Cache-Control: no-store` を付与する
///
/// ハンドラーが別の値を設定していても上書きする。
pub async fn no_cache(request: Request, next: Next) -> Response {
   let mut response = next.run(request).await;
   response
      .headers_mut()
      .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
   response
}
