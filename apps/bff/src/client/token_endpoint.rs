//! # トークンエンドポイントクライアント
//!
//! 認可コードをトークンに交換する（`grant_type=authorization_code`）。
//!
//! リクエストは `application/x-www-form-urlencoded` の POST。
//! `client_secret` が設定されていればフォームに含め、PKCE の `code_verifier` が
//! あれば併せて送る。タイムアウトは reqwest クライアントに設定し、
//! 呼び出し元が future を破棄すればリクエストも中断される。

use std::time::Duration;

use async_trait::async_trait;
use idbridge_domain::TokenResponse;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::middleware::inject_request_id;

/// `expires_in` が省略されたときの既定値（秒）
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// 既定のトークン種別
const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// エラー応答の本文を読む上限（バイト）
const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

/// トークン交換エラー
///
/// `Display` に IdP のレスポンス本文は含めない。
#[derive(Debug, Clone, Error)]
pub enum TokenEndpointError {
   /// 非 2xx 応答
   #[error("トークンエンドポイントがエラーを返しました: {status}")]
   Rejected { status: u16, body: String },

   #[error("トークンエンドポイントがタイムアウトしました")]
   Timeout,

   #[error("ネットワークエラー: {0}")]
   Network(String),

   /// 2xx だが JSON として解釈できない、または必須項目が無い
   #[error("不正なトークンレスポンス: {0}")]
   InvalidResponse(String),
}

impl From<reqwest::Error> for TokenEndpointError {
   fn from(err: reqwest::Error) -> Self {
      if err.is_timeout() {
         TokenEndpointError::Timeout
      } else if err.is_decode() {
         TokenEndpointError::InvalidResponse(err.to_string())
      } else {
         TokenEndpointError::Network(err.to_string())
      }
   }
}

/// 1 回分のコード交換の入力
#[derive(Debug, Clone, Copy)]
pub struct CodeExchange<'a> {
   pub code:          &'a str,
   /// 認可リクエストで送ったものと同じ redirect_uri
   pub redirect_uri:  &'a str,
   pub code_verifier: Option<&'a str>,
}

/// トークンエンドポイントのレスポンス（RFC 6749 §5.1）
#[derive(Deserialize)]
struct RawTokenResponse {
   access_token: String,
   id_token:     Option<String>,
   token_type:   Option<String>,
   expires_in:   Option<i64>,
   scope:        Option<String>,
}

impl RawTokenResponse {
   fn into_token_response(self) -> Result<TokenResponse, TokenEndpointError> {
      let id_token = self
         .id_token
         .filter(|t| !t.is_empty())
         .ok_or_else(|| TokenEndpointError::InvalidResponse("id_token がありません".to_string()))?;

      Ok(TokenResponse {
         access_token: self.access_token,
         id_token,
         token_type: self
            .token_type
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string()),
         expires_in: self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
         scope: self.scope,
      })
   }
}

/// トークンエンドポイントクライアントトレイト
///
/// テスト時にスタブを使用できるようトレイトで定義。
#[async_trait]
pub trait TokenClient: Send + Sync {
   /// 認可コードをトークンに交換する
   async fn exchange_code(
      &self,
      exchange: CodeExchange<'_>,
   ) -> Result<TokenResponse, TokenEndpointError>;
}

/// トークンエンドポイントクライアント実装
pub struct TokenClientImpl {
   token_endpoint: String,
   client_id:      String,
   client_secret:  Option<String>,
   client:         reqwest::Client,
}

impl TokenClientImpl {
   /// - `timeout`: 接続からレスポンス本文の受信までを含めた上限
   pub fn new(
      token_endpoint: &str,
      client_id: &str,
      client_secret: Option<&str>,
      timeout: Duration,
   ) -> Result<Self, TokenEndpointError> {
      let client = reqwest::Client::builder().timeout(timeout).build()?;
      Ok(Self {
         token_endpoint: token_endpoint.to_string(),
         client_id: client_id.to_string(),
         client_secret: client_secret.map(str::to_string),
         client,
      })
   }
}

#[async_trait]
impl TokenClient for TokenClientImpl {
   async fn exchange_code(
      &self,
      exchange: CodeExchange<'_>,
   ) -> Result<TokenResponse, TokenEndpointError> {
      let mut form = vec![
         ("grant_type", "authorization_code"),
         ("code", exchange.code),
         ("redirect_uri", exchange.redirect_uri),
         ("client_id", self.client_id.as_str()),
      ];
      if let Some(secret) = self.client_secret.as_deref() {
         form.push(("client_secret", secret));
      }
      if let Some(verifier) = exchange.code_verifier {
         form.push(("code_verifier", verifier));
      }

      let response = inject_request_id(self.client.post(&self.token_endpoint))
         .form(&form)
         .send()
         .await?;

      match response.status() {
         status if status.is_success() => {
            let body = response.text().await?;
            serde_json::from_str::<RawTokenResponse>(&body)
               .map_err(|e| TokenEndpointError::InvalidResponse(e.to_string()))?
               .into_token_response()
         }
         StatusCode::GATEWAY_TIMEOUT => Err(TokenEndpointError::Timeout),
         status => Err(TokenEndpointError::Rejected {
            status: status.as_u16(),
            body:   read_capped(response, MAX_ERROR_BODY_BYTES).await,
         }),
      }
   }
}

/// 本文を先頭 `limit` バイトまで読む。残りは受信しない
async fn read_capped(mut response: reqwest::Response, limit: usize) -> String {
   let mut buf = Vec::new();
   while buf.len() < limit {
      match response.chunk().await {
         Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
         Ok(None) | Err(_) => break,
      }
   }
   buf.truncate(limit);
   String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
   use pretty_assertions::assert_eq;
   use serde_json::json;
   use wiremock::{
      Mock,
      MockServer,
      ResponseTemplate,
      matchers::{body_string_contains, header, method, path},
   };

   use super::*;

   fn client_for(server: &MockServer, secret: Option<&str>) -> TokenClientImpl {
      TokenClientImpl::new(
         &format!("{}/connect/token", server.uri()),
         "bff-client",
         secret,
         Duration::from_secs(2),
      )
      .unwrap()
   }

   fn exchange(code_verifier: Option<&str>) -> CodeExchange<'_> {
      CodeExchange {
         code: "auth-code-1",
         redirect_uri: "https://app.example.com/signin-oidc",
         code_verifier,
      }
   }

   #[tokio::test]
   async fn test_成功時にトークンを返す() {
      // Given
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .and(path("/connect/token"))
         .and(header("content-type", "application/x-www-form-urlencoded"))
         .and(body_string_contains("grant_type=authorization_code"))
         .and(body_string_contains("code=auth-code-1"))
         .and(body_string_contains(
            "redirect_uri=https%3A%2F%2Fapp.example.com%2Fsignin-oidc",
         ))
         .and(body_string_contains("client_id=bff-client"))
         .and(body_string_contains("client_secret=s3cret"))
         .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "id_token": "h.p.s",
            "token_type": "Bearer",
            "expires_in": 300,
            "scope": "openid profile"
         })))
         .expect(1)
         .mount(&server)
         .await;
      let sut = client_for(&server, Some("s3cret"));

      // When
      let token = sut.exchange_code(exchange(None)).await.unwrap();

      // Then
      assert_eq!(token.access_token, "at-1");
      assert_eq!(token.id_token, "h.p.s");
      assert_eq!(token.token_type, "Bearer");
      assert_eq!(token.expires_in, 300);
      assert_eq!(token.scope.as_deref(), Some("openid profile"));
   }

   #[tokio::test]
   async fn test_code_verifierがあればフォームに含める() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .and(body_string_contains("code_verifier=verifier-123"))
         .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "id_token": "h.p.s"
         })))
         .expect(1)
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      let token = sut.exchange_code(exchange(Some("verifier-123"))).await.unwrap();

      assert_eq!(token.expires_in, DEFAULT_EXPIRES_IN);
      assert_eq!(token.token_type, DEFAULT_TOKEN_TYPE);
   }

   #[tokio::test]
   async fn test_シークレット未設定ならclient_secretを送らない() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "id_token": "h.p.s"
         })))
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      sut.exchange_code(exchange(None)).await.unwrap();

      let requests = server.received_requests().await.unwrap();
      let body = String::from_utf8(requests[0].body.clone()).unwrap();
      assert!(!body.contains("client_secret"), "body = {body}");
      assert!(!body.contains("code_verifier"), "body = {body}");
   }

   #[tokio::test]
   async fn test_非2xxはrejected() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
         )
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      let result = sut.exchange_code(exchange(None)).await;

      match result {
         Err(TokenEndpointError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
         }
         other => panic!("Rejected を期待: {other:?}"),
      }
   }

   #[tokio::test]
   async fn test_エラー応答の本文は上限までしか保持しない() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(400).set_body_string("x".repeat(64 * 1024)))
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      let result = sut.exchange_code(exchange(None)).await;

      match result {
         Err(TokenEndpointError::Rejected { status, body }) => {
            assert_eq!(status, 400);
            assert_eq!(body.len(), MAX_ERROR_BODY_BYTES);
         }
         other => panic!("Rejected を期待: {other:?}"),
      }
   }

   #[tokio::test]
   async fn test_id_tokenが無ければinvalid_response() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at",
            "token_type": "Bearer"
         })))
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      let result = sut.exchange_code(exchange(None)).await;

      assert!(matches!(result, Err(TokenEndpointError::InvalidResponse(_))));
   }

   #[tokio::test]
   async fn test_jsonでない本文はinvalid_response() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
         .mount(&server)
         .await;
      let sut = client_for(&server, None);

      let result = sut.exchange_code(exchange(None)).await;

      assert!(matches!(result, Err(TokenEndpointError::InvalidResponse(_))));
   }

   #[tokio::test]
   async fn test_応答が遅ければtimeout() {
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(
            ResponseTemplate::new(200)
               .set_delay(Duration::from_millis(500))
               .set_body_json(json!({ "access_token": "at", "id_token": "h.p.s" })),
         )
         .mount(&server)
         .await;
      let sut = TokenClientImpl::new(
         &format!("{}/connect/token", server.uri()),
         "bff-client",
         None,
         Duration::from_millis(50),
      )
      .unwrap();

      let result = sut.exchange_code(exchange(None)).await;

      assert!(matches!(result, Err(TokenEndpointError::Timeout)));
   }

   #[tokio::test]
   async fn test_futureを破棄すれば応答を待たずに戻る() {
      // Given
      let server = MockServer::start().await;
      Mock::given(method("POST"))
         .respond_with(
            ResponseTemplate::new(200)
               .set_delay(Duration::from_secs(1))
               .set_body_json(json!({ "access_token": "at", "id_token": "h.p.s" })),
         )
         .mount(&server)
         .await;
      let sut = client_for(&server, None);
      let started = std::time::Instant::now();

      // When
      let result =
         tokio::time::timeout(Duration::from_millis(50), sut.exchange_code(exchange(None))).await;

      // Then
      assert!(result.is_err(), "破棄前に完了してはならない");
      assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
   }

   #[tokio::test]
   async fn test_接続できなければnetwork() {
      let sut = TokenClientImpl::new(
         "http://127.0.0.1:1/connect/token",
         "bff-client",
         None,
         Duration::from_secs(2),
      )
      .unwrap();

      let result = sut.exchange_code(exchange(None)).await;

      assert!(matches!(result, Err(TokenEndpointError::Network(_))));
   }

   #[test]
   fn test_displayにレスポンス本文を含めない() {
      let err = TokenEndpointError::Rejected {
         status: 400,
         body:   "secret-detail".to_string(),
      };

      assert!(!err.to_string().contains("secret-detail"));
   }
}
