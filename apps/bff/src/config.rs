//! # BFF 設定
//!
//! 環境変数から BFF サーバーと OIDC の設定を読み込む。
//!
//! 起動時に 1 度だけ組み立て、`Arc` で各コンポーネントに渡す。
//! 必須項目が欠けている・値が不正な場合は [`ConfigError`] を返し、
//! サーバーはリクエストを受け付ける前に終了する。

use std::{env, fmt, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use idbridge_domain::REDACTED;
use idbridge_infra::state_protector::MIN_MASTER_KEY_LENGTH;
use thiserror::Error;
use url::Url;

/// コールバックパスに使えないパス
const RESERVED_PATHS: &[&str] = &[
   "/auth/login",
   "/auth/status",
   "/auth/profile",
   "/auth/logout",
   "/auth/error",
   "/health",
   "/health/ready",
];

/// 設定エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
   #[error("{0} が設定されていません")]
   Missing(&'static str),

   #[error("{name} の値が不正です: {reason}")]
   Invalid { name: &'static str, reason: String },
}

impl ConfigError {
   fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
      Self::Invalid {
         name,
         reason: reason.into(),
      }
   }
}

/// 認可リクエストの送り方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationTransport {
   /// 302 リダイレクト（クエリパラメータ）
   Redirect,
   /// 自動送信する HTML フォーム（POST）
   FormPost,
}

/// OIDC クライアントの設定
#[derive(Clone)]
pub struct OidcConfig {
   /// 認証スキーム名
   pub scheme: String,
   pub authority: String,
   pub client_id: String,
   /// 未設定なら公開クライアント
   pub client_secret: Option<String>,
   pub scope: String,
   pub response_type: String,
   pub callback_path: String,
   /// `BFF_PUBLIC_URL` + `callback_path`
   pub redirect_uri: String,
   /// BFF の公開 URL（末尾の `/` なし）
   pub public_url: String,
   pub authorization_endpoint: String,
   pub token_endpoint: String,
   pub end_session_endpoint: String,
   pub jwks_uri: String,
   pub transport: AuthorizationTransport,
   pub use_pkce: bool,
   pub verify_id_token: bool,
   pub federated_signout: bool,
   pub allowed_return_hosts: Vec<String>,
   pub state_ttl: chrono::Duration,
   pub token_timeout: Duration,
}

impl OidcConfig {
   /// セッション Cookie に Secure 属性を付けるか
   pub fn secure_cookies(&self) -> bool {
      self.public_url.starts_with("https://")
   }
}

impl fmt::Debug for OidcConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("OidcConfig")
         .field("scheme", &self.scheme)
         .field("authority", &self.authority)
         .field("client_id", &self.client_id)
         .field("client_secret", &self.client_secret.as_ref().map(|_| REDACTED))
         .field("scope", &self.scope)
         .field("redirect_uri", &self.redirect_uri)
         .field("transport", &self.transport)
         .field("use_pkce", &self.use_pkce)
         .field("verify_id_token", &self.verify_id_token)
         .field("federated_signout", &self.federated_signout)
         .finish_non_exhaustive()
   }
}

/// CORS 設定
#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
   /// 空なら任意のオリジンを許可する（資格情報なし）
   pub allowed_origins: Vec<String>,
   pub allow_credentials: bool,
}

/// BFF サーバーの設定
#[derive(Clone)]
pub struct BffConfig {
   /// バインドアドレス
   pub host: String,
   /// ポート番号
   pub port: u16,
   /// Redis 接続 URL
   pub redis_url: String,
   pub oidc: OidcConfig,
   /// state 保護用のマスター鍵（未設定なら起動時に一時鍵を生成する）
   pub state_protection_key: Option<Vec<u8>>,
   pub cors: CorsConfig,
}

impl fmt::Debug for BffConfig {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("BffConfig")
         .field("host", &self.host)
         .field("port", &self.port)
         .field("oidc", &self.oidc)
         .field(
            "state_protection_key",
            &self.state_protection_key.as_ref().map(|_| REDACTED),
         )
         .field("cors", &self.cors)
         .finish_non_exhaustive()
   }
}

impl BffConfig {
   /// 環境変数から設定を読み込む
   pub fn from_env() -> Result<Self, ConfigError> {
      Self::from_lookup(|name| env::var(name).ok())
   }

   /// 任意の取得関数から設定を読み込む
   ///
   /// 空文字は未設定として扱う。
   pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
      let get = |name: &str| {
         lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
      };
      let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

      let port = required("BFF_PORT")?
         .parse::<u16>()
         .map_err(|e| ConfigError::invalid("BFF_PORT", e.to_string()))?;

      let public_url = parse_http_url("BFF_PUBLIC_URL", &required("BFF_PUBLIC_URL")?)?;
      let public_url = public_url.trim_end_matches('/').to_string();

      let authority = parse_http_url("OIDC_AUTHORITY", &required("OIDC_AUTHORITY")?)?;
      let authority = authority.trim_end_matches('/').to_string();
      let require_https_metadata =
         parse_bool("OIDC_REQUIRE_HTTPS_METADATA", get("OIDC_REQUIRE_HTTPS_METADATA"), true)?;
      if require_https_metadata && !authority.starts_with("https://") {
         return Err(ConfigError::invalid(
            "OIDC_AUTHORITY",
            "OIDC_REQUIRE_HTTPS_METADATA=true のため https である必要があります",
         ));
      }

      let callback_path = get("OIDC_CALLBACK_PATH").unwrap_or_else(|| "/signin-oidc".to_string());
      if !callback_path.starts_with('/')
         || callback_path.starts_with("//")
         || callback_path.contains(['{', '}', '*', ':', '?', '#'])
      {
         return Err(ConfigError::invalid(
            "OIDC_CALLBACK_PATH",
            "/ で始まる固定のパスである必要があります",
         ));
      }
      if RESERVED_PATHS.contains(&callback_path.as_str()) {
         return Err(ConfigError::invalid(
            "OIDC_CALLBACK_PATH",
            format!("{callback_path} は他のエンドポイントが使用しています"),
         ));
      }

      let endpoint = |name: &'static str, default: &str| {
         resolve_endpoint(&authority, &get(name).unwrap_or_else(|| default.to_string()))
      };

      let transport = match get("OIDC_AUTHORIZATION_TRANSPORT").as_deref() {
         None | Some("redirect") => AuthorizationTransport::Redirect,
         Some("form_post") => AuthorizationTransport::FormPost,
         Some(other) => {
            return Err(ConfigError::invalid(
               "OIDC_AUTHORIZATION_TRANSPORT",
               format!("redirect または form_post を指定してください: {other}"),
            ));
         }
      };

      let allowed_return_hosts = get("OIDC_ALLOWED_RETURN_HOSTS")
         .map(|v| split_list(&v))
         .unwrap_or_else(|| vec!["localhost".to_string(), "127.0.0.1".to_string()]);

      let state_ttl_secs = parse_positive("OIDC_STATE_TTL_SECS", get("OIDC_STATE_TTL_SECS"), 600)?;
      let token_timeout_secs =
         parse_positive("OIDC_TOKEN_TIMEOUT_SECS", get("OIDC_TOKEN_TIMEOUT_SECS"), 10)?;

      let oidc = OidcConfig {
         scheme: get("OIDC_SCHEME").unwrap_or_else(|| "oidc".to_string()),
         client_id: required("OIDC_CLIENT_ID")?,
         client_secret: get("OIDC_CLIENT_SECRET"),
         scope: get("OIDC_SCOPE").unwrap_or_else(|| "openid profile".to_string()),
         response_type: get("OIDC_RESPONSE_TYPE").unwrap_or_else(|| "code".to_string()),
         redirect_uri: format!("{public_url}{callback_path}"),
         authorization_endpoint: endpoint("OIDC_AUTHORIZATION_ENDPOINT", "/connect/authorize"),
         token_endpoint: endpoint("OIDC_TOKEN_ENDPOINT", "/connect/token"),
         end_session_endpoint: endpoint("OIDC_END_SESSION_ENDPOINT", "/connect/endsession"),
         jwks_uri: endpoint("OIDC_JWKS_URI", "/.well-known/jwks"),
         callback_path,
         public_url,
         authority,
         transport,
         use_pkce: parse_bool("OIDC_USE_PKCE", get("OIDC_USE_PKCE"), true)?,
         verify_id_token: parse_bool("OIDC_VERIFY_ID_TOKEN", get("OIDC_VERIFY_ID_TOKEN"), false)?,
         federated_signout: parse_bool(
            "OIDC_FEDERATED_SIGNOUT",
            get("OIDC_FEDERATED_SIGNOUT"),
            true,
         )?,
         allowed_return_hosts,
         state_ttl: chrono::Duration::seconds(state_ttl_secs as i64),
         token_timeout: Duration::from_secs(token_timeout_secs),
      };

      for (name, value) in [
         ("OIDC_AUTHORIZATION_ENDPOINT", &oidc.authorization_endpoint),
         ("OIDC_TOKEN_ENDPOINT", &oidc.token_endpoint),
         ("OIDC_END_SESSION_ENDPOINT", &oidc.end_session_endpoint),
         ("OIDC_JWKS_URI", &oidc.jwks_uri),
      ] {
         parse_http_url(name, value)?;
      }

      let state_protection_key = get("STATE_PROTECTION_KEY")
         .map(|v| parse_state_key(&v))
         .transpose()?;

      let cors = CorsConfig {
         allowed_origins: get("CORS_ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default(),
         allow_credentials: parse_bool(
            "CORS_ALLOW_CREDENTIALS",
            get("CORS_ALLOW_CREDENTIALS"),
            false,
         )?,
      };
      if cors.allow_credentials && cors.allowed_origins.is_empty() {
         return Err(ConfigError::invalid(
            "CORS_ALLOW_CREDENTIALS",
            "資格情報を許可する場合は CORS_ALLOWED_ORIGINS が必要です",
         ));
      }
      if let Some(origin) = cors
         .allowed_origins
         .iter()
         .find(|o| http::HeaderValue::from_str(o).is_err())
      {
         return Err(ConfigError::invalid("CORS_ALLOWED_ORIGINS", origin.clone()));
      }

      Ok(Self {
         host: get("BFF_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
         port,
         redis_url: required("REDIS_URL")?,
         oidc,
         state_protection_key,
         cors,
      })
   }
}

fn parse_http_url(name: &'static str, value: &str) -> Result<String, ConfigError> {
   let url = Url::parse(value).map_err(|e| ConfigError::invalid(name, e.to_string()))?;
   if !matches!(url.scheme(), "http" | "https") {
      return Err(ConfigError::invalid(name, "http(s) の URL である必要があります"));
   }
   Ok(value.to_string())
}

fn parse_bool(
   name: &'static str,
   value: Option<String>,
   default: bool,
) -> Result<bool, ConfigError> {
   match value.as_deref() {
      None => Ok(default),
      Some(v) if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
      Some(v) if v.eq_ignore_ascii_case("false") || v == "0" => Ok(false),
      Some(v) => Err(ConfigError::invalid(
         name,
         format!("true / false を指定してください: {v}"),
      )),
   }
}

fn parse_positive(
   name: &'static str,
   value: Option<String>,
   default: u64,
) -> Result<u64, ConfigError> {
   match value {
      None => Ok(default),
      Some(v) => match v.parse::<u64>() {
         Ok(n) if n > 0 && n <= i32::MAX as u64 => Ok(n),
         _ => Err(ConfigError::invalid(name, format!("正の整数を指定してください: {v}"))),
      },
   }
}

fn parse_state_key(value: &str) -> Result<Vec<u8>, ConfigError> {
   let key = STANDARD
      .decode(value)
      .map_err(|e| ConfigError::invalid("STATE_PROTECTION_KEY", e.to_string()))?;
   if key.len() < MIN_MASTER_KEY_LENGTH {
      return Err(ConfigError::invalid(
         "STATE_PROTECTION_KEY",
         format!("{MIN_MASTER_KEY_LENGTH} バイト以上必要です"),
      ));
   }
   Ok(key)
}

/// エンドポイントのパスを authority に対して解決する（絶対 URL はそのまま使う）
fn resolve_endpoint(authority: &str, endpoint: &str) -> String {
   if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
      endpoint.to_string()
   } else {
      format!(
         "{}/{}",
         authority.trim_end_matches('/'),
         endpoint.trim_start_matches('/')
      )
   }
}

fn split_list(value: &str) -> Vec<String> {
   value
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_string)
      .collect()
}
