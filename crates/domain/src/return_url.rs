//! # リダイレクト先（returnUrl）の検証
//!
//! オープンリダイレクト対策。検証に通らない値は呼び出し側で `/` に置き換える。
//!
//! | 用途 | 許可する値 |
//! |------|-----------|
//! | ログイン | 相対パス、またはホストがリクエストのホストか許可リストに一致する絶対 URL |
//! | ログアウト | 相対パスのみ |
//!
//! 相対パスは `/` で始まり、`//` や `/\` で始まらないもの（プロトコル相対 URL の排除）。

use thiserror::Error;
use url::Url;

/// 既定のリダイレクト先
pub const ROOT: &str = "/";

/// 検証済みのリダイレクト先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnUrl(String);

impl ReturnUrl {
   /// `/`
   pub fn root() -> Self {
      Self(ROOT.to_string())
   }

   pub fn as_str(&self) -> &str {
      &self.0
   }

   pub fn into_string(self) -> String {
      self.0
   }

   /// 相対パスのみを許可する（ログアウト用）
   ///
   /// 未指定・空文字は `/` として扱う。
   pub fn relative_only(raw: Option<&str>) -> Result<Self, ReturnUrlError> {
      match non_empty(raw) {
         None => Ok(Self::root()),
         Some(value) if is_local_path(value) => Ok(Self(value.to_string())),
         Some(value) => Err(ReturnUrlError::NotRelative(value.to_string())),
      }
   }
}

/// returnUrl の検証エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReturnUrlError {
   #[error("相対パスではない returnUrl: {0}")]
   NotRelative(String),

   #[error("許可されていないホストへの returnUrl: {0}")]
   HostNotAllowed(String),

   #[error("URL として解釈できない returnUrl: {0}")]
   Malformed(String),
}

/// ログイン時の returnUrl 検証ポリシー
#[derive(Debug, Clone, Default)]
pub struct ReturnUrlPolicy {
   /// リクエストのホスト以外に許可するホスト（小文字）
   allowed_hosts: Vec<String>,
}

impl ReturnUrlPolicy {
   pub fn new(allowed_hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
      Self {
         allowed_hosts: allowed_hosts
            .into_iter()
            .map(|h| h.into().to_ascii_lowercase())
            .collect(),
      }
   }

   /// ログイン時の returnUrl を検証する
   ///
   /// `request_host` は `Host` ヘッダーの値（ポート付きでもよい）。
   /// 未指定・空文字は `/` として扱う。
   pub fn validate(
      &self,
      raw: Option<&str>,
      request_host: Option<&str>,
   ) -> Result<ReturnUrl, ReturnUrlError> {
      let Some(value) = non_empty(raw) else {
         return Ok(ReturnUrl::root());
      };

      if is_local_path(value) {
         return Ok(ReturnUrl(value.to_string()));
      }

      let url = Url::parse(value).map_err(|_| ReturnUrlError::Malformed(value.to_string()))?;
      if !matches!(url.scheme(), "http" | "https") {
         return Err(ReturnUrlError::Malformed(value.to_string()));
      }
      let host = url
         .host_str()
         .ok_or_else(|| ReturnUrlError::Malformed(value.to_string()))?
         .to_ascii_lowercase();

      let same_host = request_host
         .map(strip_port)
         .is_some_and(|h| h.eq_ignore_ascii_case(&host));
      // 保存するのは url の直列化結果。Url::parse は改行やタブを黙って取り除くため
      if same_host || self.allowed_hosts.iter().any(|h| *h == host) {
         Ok(ReturnUrl(url.into()))
      } else {
         Err(ReturnUrlError::HostNotAllowed(value.to_string()))
      }
   }
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
   raw.map(str::trim).filter(|v| !v.is_empty())
}

fn is_local_path(value: &str) -> bool {
   value.starts_with('/')
      && !value.starts_with("//")
      && !value.starts_with("/\\")
      && !value.chars().any(char::is_control)
}

/// `Host` ヘッダー値からポートを取り除く（IPv6 リテラルの角括弧も外す）
fn strip_port(host: &str) -> &str {
   if let Some(rest) = host.strip_prefix('[') {
      return rest.split(']').next().unwrap_or(rest);
   }
   host.split(':').next().unwrap_or(host)
}
