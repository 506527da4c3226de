//! # 認証失敗
//!
//! コールバック処理の失敗を表す一様な結果型。呼び出し側に見せるのは短い理由コード
//! （[`AuthFailure::reason_code`]）のみで、IdP の生レスポンスや内部エラーは含めない。
//!
//! | 理由コード | 分類 |
//! |-----------|------|
//! | `idp_error:<error>` | 入力エラー |
//! | `missing_code` | 入力エラー |
//! | `invalid_state` | state エラー |
//! | `exchange_failed` | ネットワークエラー |
//! | `claims_extraction_failed` | トークン解析エラー |

use thiserror::Error;

/// IdP の `error` パラメータとして受け付ける最大長
const MAX_IDP_ERROR_LENGTH: usize = 64;

/// 失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
   Input,
   State,
   Network,
   TokenParse,
}

impl FailureCategory {
   /// ログの `error.category` に出力する値
   pub fn as_str(&self) -> &'static str {
      match self {
         Self::Input => "input",
         Self::State => "state",
         Self::Network => "external_service",
         Self::TokenParse => "token_parse",
      }
   }
}

/// コールバック処理の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
   /// IdP がエラーを返した（`error` パラメータ）
   #[error("IdP がエラーを返しました: {0}")]
   IdpError(String),

   #[error("認可コードがありません")]
   MissingCode,

   /// state が復号できない・改ざんされている・期限切れ
   #[error("state が不正です")]
   InvalidState,

   /// トークンエンドポイントへの通信失敗または非 2xx 応答
   #[error("トークン交換に失敗しました")]
   ExchangeFailed,

   /// ID トークンからクレームを得られなかった
   #[error("クレームの抽出に失敗しました")]
   ClaimsExtractionFailed,
}

impl AuthFailure {
   /// IdP の `error` パラメータから失敗を作る
   ///
   /// 値はそのまま画面やレスポンスに出るため、英数字と `_` `-` `.` 以外を `_` に置き換え、
   /// 長さを制限する。
   pub fn idp_error(error: &str) -> Self {
      let sanitized: String = error
         .chars()
         .take(MAX_IDP_ERROR_LENGTH)
         .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
               c
            } else {
               '_'
            }
         })
         .collect();
      Self::IdpError(sanitized)
   }

   /// 呼び出し側に返す理由コード
   pub fn reason_code(&self) -> String {
      match self {
         Self::IdpError(error) => format!("idp_error:{error}"),
         Self::MissingCode => "missing_code".to_string(),
         Self::InvalidState => "invalid_state".to_string(),
         Self::ExchangeFailed => "exchange_failed".to_string(),
         Self::ClaimsExtractionFailed => "claims_extraction_failed".to_string(),
      }
   }

   /// 理由コードから失敗を復元する
   ///
   /// エラーページに渡された値をそのまま表示しないために使う。
   /// 既知の理由コードでなければ `None`。
   pub fn from_reason_code(code: &str) -> Option<Self> {
      match code {
         "missing_code" => Some(Self::MissingCode),
         "invalid_state" => Some(Self::InvalidState),
         "exchange_failed" => Some(Self::ExchangeFailed),
         "claims_extraction_failed" => Some(Self::ClaimsExtractionFailed),
         other => other
            .strip_prefix("idp_error:")
            .filter(|error| !error.is_empty())
            .map(Self::idp_error),
      }
   }

   pub fn category(&self) -> FailureCategory {
      match self {
         Self::IdpError(_) | Self::MissingCode => FailureCategory::Input,
         Self::InvalidState => FailureCategory::State,
         Self::ExchangeFailed => FailureCategory::Network,
         Self::ClaimsExtractionFailed => FailureCategory::TokenParse,
      }
   }
}
