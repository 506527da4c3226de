//! # Observability 基盤
//!
//! subscriber の初期化と、Request ID を載せたリクエストスパンを提供する。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |---------|--------|------|
//! | `LOG_FORMAT` | `pretty` | `json` / `pretty`（大文字小文字は区別しない） |
//! | `RUST_LOG` | [`DEFAULT_DIRECTIVES`] | `EnvFilter` のディレクティブ |

use std::str::FromStr;

/// Request ID ヘッダー名
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// `RUST_LOG` 未設定時のフィルタ
pub const DEFAULT_DIRECTIVES: &str = "info,idbridge=debug";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
   /// 1 イベント 1 行の JSON
   Json,
   #[default]
   Pretty,
}

/// `LOG_FORMAT` に未知の値が与えられた
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
   type Err = UnknownLogFormat;

   fn from_str(s: &str) -> Result<Self, Self::Err> {
      match s.trim().to_ascii_lowercase().as_str() {
         "json" => Ok(Self::Json),
         "pretty" => Ok(Self::Pretty),
         _ => Err(UnknownLogFormat(s.to_string())),
      }
   }
}

/// トレーシング初期化設定
#[derive(Debug, Clone)]
pub struct TracingConfig {
   pub service_name: String,
   pub log_format:   LogFormat,
   /// `RUST_LOG` が無いときのフィルタ
   pub default_directives: String,
}

impl TracingConfig {
   pub fn new(service_name: impl Into<String>, log_format: LogFormat) -> Self {
      Self {
         service_name: service_name.into(),
         log_format,
         default_directives: DEFAULT_DIRECTIVES.to_string(),
      }
   }

   /// `LOG_FORMAT` を読む
   ///
   /// 不正な値は Pretty に倒す。subscriber がまだ無いので警告は stderr に直接書く。
   pub fn from_env(service_name: impl Into<String>) -> Self {
      let log_format = match std::env::var("LOG_FORMAT") {
         Ok(value) => value.parse().unwrap_or_else(|UnknownLogFormat(other)| {
            eprintln!("WARNING: unknown LOG_FORMAT={other:?}, falling back to pretty");
            LogFormat::Pretty
         }),
         Err(_) => LogFormat::default(),
      };
      Self::new(service_name, log_format)
   }
}

/// グローバル subscriber を設定する
///
/// JSON 形式では現在のスパン（`request_id` を含む）をイベントと同じ行に平坦化する。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
   use tracing_subscriber::{EnvFilter, Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

   let filter = EnvFilter::try_from_default_env()
      .unwrap_or_else(|_| EnvFilter::new(&config.default_directives));

   let output = match config.log_format {
      LogFormat::Json => tracing_subscriber::fmt::layer()
         .json()
         .flatten_event(true)
         .with_current_span(true)
         .with_span_list(false)
         .boxed(),
      LogFormat::Pretty => tracing_subscriber::fmt::layer().with_target(false).boxed(),
   };

   tracing_subscriber::registry()
      .with(filter)
      .with(output)
      .with(tracing_error::ErrorLayer::default())
      .init();

   tracing::debug!(
      service = %config.service_name,
      log_format = ?config.log_format,
      "トレーシングを初期化しました"
   );
}

/// リクエストの Request ID
///
/// `SetRequestIdLayer` が入れた extension を優先し、無ければヘッダーを見る。
#[cfg(feature = "observability")]
fn request_id_of<B>(request: &http::Request<B>) -> Option<&str> {
   request
      .extensions()
      .get::<tower_http::request_id::RequestId>()
      .map(tower_http::request_id::RequestId::header_value)
      .or_else(|| request.headers().get(REQUEST_ID_HEADER))
      .and_then(|v| v.to_str().ok())
}

/// `TraceLayer::make_span_with` 用のリクエストスパン
///
/// コールバックのクエリには認可コードが載るので、URI はパスのみ。
#[cfg(feature = "observability")]
pub fn make_request_span<B>(request: &http::Request<B>) -> tracing::Span {
   tracing::info_span!(
      "request",
      method = %request.method(),
      path = %request.uri().path(),
      request_id = %request_id_of(request).unwrap_or("-"),
   )
}

/// UUID v7 の Request ID を発行する
#[cfg(feature = "observability")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

#[cfg(feature = "observability")]
impl tower_http::request_id::MakeRequestId for MakeRequestUuidV7 {
   fn make_request_id<B>(
      &mut self,
      _request: &http::Request<B>,
   ) -> Option<tower_http::request_id::RequestId> {
      let mut buf = uuid::Uuid::encode_buffer();
      let id = uuid::Uuid::now_v7().hyphenated().encode_lower(&mut buf);
      http::HeaderValue::from_str(id)
         .ok()
         .map(tower_http::request_id::RequestId::new)
   }
}
