//! # Canonical Log Line ミドルウェア
//!
//! リクエストごとに、メソッド・パス・ステータス・レイテンシ・リダイレクト先を
//! 1 行のサマリーログにまとめる tower Layer。
//!
//! 認証フローはリダイレクトの連続なので、3xx では `Location` の行き先も記録する。
//! `Location` のクエリには state や理由コードが載るため、記録するのはパスまで。
//!
//! | ステータス | レベル |
//! |-----------|--------|
//! | 1xx〜4xx | INFO |
//! | 5xx、サービスエラー | ERROR |
//!
//! TraceLayer のスパン内に置くと、スパンの `request_id` が同じ行に載る。
//!
//! ```text
//! TraceLayer → CanonicalLogLineLayer → [他のミドルウェア] → handler
//! ```

use std::{
   fmt,
   future::Future,
   pin::Pin,
   task::{Context, Poll},
   time::Instant,
};

use http::{Method, Request, Response, StatusCode, header};
use tower::{Layer, Service};

/// Canonical Log Line を出力する Layer
///
/// `/health` 配下は出力しない。
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalLogLineLayer;

impl<S> Layer<S> for CanonicalLogLineLayer {
   type Service = CanonicalLogLineService<S>;

   fn layer(&self, inner: S) -> Self::Service {
      CanonicalLogLineService { inner }
   }
}

#[derive(Clone, Debug)]
pub struct CanonicalLogLineService<S> {
   inner: S,
}

/// 1 リクエスト分のサマリー
struct RequestSummary {
   method:  Method,
   path:    String,
   started: Instant,
}

impl RequestSummary {
   fn begin<B>(request: &Request<B>) -> Option<Self> {
      let path = request.uri().path();
      if path.starts_with("/health") {
         return None;
      }
      Some(Self {
         method:  request.method().clone(),
         path:    path.to_string(),
         started: Instant::now(),
      })
   }

   fn latency_ms(&self) -> u64 {
      u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
   }

   fn completed<B>(self, response: &Response<B>) {
      let status = response.status();
      let redirect_to = redirect_target(response).unwrap_or_default();
      let latency_ms = self.latency_ms();

      if status.is_server_error() {
         tracing::error!(
            log.r#type = "canonical",
            http.method = %self.method,
            http.path = %self.path,
            http.status_code = status.as_u16(),
            http.latency_ms = latency_ms,
            "リクエスト完了（サーバーエラー）"
         );
      } else {
         tracing::info!(
            log.r#type = "canonical",
            http.method = %self.method,
            http.path = %self.path,
            http.status_code = status.as_u16(),
            http.redirect_to = %redirect_to,
            http.latency_ms = latency_ms,
            "リクエスト完了"
         );
      }
   }

   fn failed(self, error: &dyn fmt::Display) {
      tracing::error!(
         log.r#type = "canonical",
         http.method = %self.method,
         http.path = %self.path,
         http.latency_ms = self.latency_ms(),
         error.message = %error,
         "リクエスト処理エラー"
      );
   }
}

/// 3xx の `Location` からクエリとフラグメントを除いた行き先
fn redirect_target<B>(response: &Response<B>) -> Option<String> {
   if !response.status().is_redirection() || response.status() == StatusCode::NOT_MODIFIED {
      return None;
   }
   let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
   let end = location.find(['?', '#']).unwrap_or(location.len());
   Some(location[..end].to_string())
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CanonicalLogLineService<S>
where
   S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
   S::Future: Send + 'static,
   S::Error: fmt::Display + 'static,
   ReqBody: Send + 'static,
   ResBody: Send + 'static,
{
   type Error = S::Error;
   type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
   type Response = S::Response;

   fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
      self.inner.poll_ready(cx)
   }

   fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
      // poll_ready 済みの inner を使う
      let clone = self.inner.clone();
      let mut inner = std::mem::replace(&mut self.inner, clone);
      let summary = RequestSummary::begin(&req);

      Box::pin(async move {
         let result = inner.call(req).await;
         if let Some(summary) = summary {
            match &result {
               Ok(response) => summary.completed(response),
               Err(err) => summary.failed(err),
            }
         }
         result
      })
   }
}

#[cfg(test)]
mod tests {
   use std::{
      convert::Infallible,
      sync::{Arc, Mutex},
   };

   use tracing_subscriber::layer::SubscriberExt;

   use super::*;

   /// 固定のレスポンスを返す Service
   #[derive(Clone)]
   struct FixedService {
      status:   StatusCode,
      location: Option<&'static str>,
   }

   impl Service<Request<()>> for FixedService {
      type Error = Infallible;
      type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
      type Response = Response<()>;

      fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
         Poll::Ready(Ok(()))
      }

      fn call(&mut self, _req: Request<()>) -> Self::Future {
         let mut builder = Response::builder().status(self.status);
         if let Some(location) = self.location {
            builder = builder.header(header::LOCATION, location);
         }
         let response = builder.body(()).unwrap();
         Box::pin(async move { Ok(response) })
      }
   }

   #[derive(Clone)]
   struct FailingService;

   impl Service<Request<()>> for FailingService {
      type Error = String;
      type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;
      type Response = Response<()>;

      fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
         Poll::Ready(Ok(()))
      }

      fn call(&mut self, _req: Request<()>) -> Self::Future {
         Box::pin(async { Err("upstream failed".to_string()) })
      }
   }

   type CapturedEvent = (tracing::Level, Vec<(String, String)>);

   /// 出力されたイベントを記録する
   #[derive(Clone, Default)]
   struct CaptureLayer {
      events: Arc<Mutex<Vec<CapturedEvent>>>,
   }

   struct FieldVisitor<'a>(&'a mut Vec<(String, String)>);

   impl tracing::field::Visit for FieldVisitor<'_> {
      fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
         self.0.push((field.name().to_string(), format!("{value:?}")));
      }

      fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
         self.0.push((field.name().to_string(), value.to_string()));
      }

      fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
         self.0.push((field.name().to_string(), value.to_string()));
      }
   }

   impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CaptureLayer {
      fn on_event(
         &self,
         event: &tracing::Event<'_>,
         _ctx: tracing_subscriber::layer::Context<'_, S>,
      ) {
         let mut fields = Vec::new();
         event.record(&mut FieldVisitor(&mut fields));
         self.events
            .lock()
            .unwrap()
            .push((*event.metadata().level(), fields));
      }
   }

   impl CaptureLayer {
      fn only_event(&self) -> CapturedEvent {
         let events = self.events.lock().unwrap();
         assert_eq!(events.len(), 1, "{events:?}");
         events[0].clone()
      }
   }

   fn field<'a>(event: &'a CapturedEvent, name: &str) -> Option<&'a str> {
      event
         .1
         .iter()
         .find(|(k, _)| k == name)
         .map(|(_, v)| v.as_str())
   }

   fn request(path: &str) -> Request<()> {
      Request::builder().uri(path).body(()).unwrap()
   }

   async fn run<S>(service: S, path: &str) -> CaptureLayer
   where
      S: Service<Request<()>, Response = Response<()>> + Clone + Send + 'static,
      S::Future: Send + 'static,
      S::Error: fmt::Display + 'static,
   {
      let capture = CaptureLayer::default();
      let _guard = tracing::subscriber::set_default(
         tracing_subscriber::registry().with(capture.clone()),
      );
      let _ = CanonicalLogLineLayer.layer(service).call(request(path)).await;
      capture
   }

   #[tokio::test]
   async fn test_リダイレクト先はクエリを除いて記録する() {
      let service = FixedService {
         status:   StatusCode::FOUND,
         location: Some("https://idp.example.com/connect/authorize?state=secret&client_id=c"),
      };

      let event = run(service, "/auth/login?returnUrl=/x").await.only_event();

      assert_eq!(event.0, tracing::Level::INFO);
      assert_eq!(field(&event, "log.type"), Some("canonical"));
      assert_eq!(field(&event, "http.status_code"), Some("302"));
      assert_eq!(field(&event, "http.path"), Some("/auth/login"));
      assert_eq!(
         field(&event, "http.redirect_to"),
         Some("https://idp.example.com/connect/authorize")
      );
   }

   #[tokio::test]
   async fn test_5xxはerrorレベル() {
      let service = FixedService {
         status:   StatusCode::INTERNAL_SERVER_ERROR,
         location: None,
      };

      let event = run(service, "/signin-oidc").await.only_event();

      assert_eq!(event.0, tracing::Level::ERROR);
      assert_eq!(field(&event, "http.status_code"), Some("500"));
   }

   #[tokio::test]
   async fn test_healthパスではログが出力されない() {
      let service = FixedService {
         status:   StatusCode::OK,
         location: None,
      };

      let capture = run(service, "/health/ready").await;

      assert!(capture.events.lock().unwrap().is_empty());
   }

   #[tokio::test]
   async fn test_serviceエラー時にerrorレベルで出力される() {
      let event = run(FailingService, "/auth/status").await.only_event();

      assert_eq!(event.0, tracing::Level::ERROR);
      assert_eq!(field(&event, "error.message"), Some("upstream failed"));
   }

   #[test]
   fn test_304はリダイレクト先を持たない() {
      let response = Response::builder()
         .status(StatusCode::NOT_MODIFIED)
         .header(header::LOCATION, "/x")
         .body(())
         .unwrap();

      assert_eq!(redirect_target(&response), None);
   }
}
