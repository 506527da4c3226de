//! # 認証イベントログとエラーコンテキストの構造化ヘルパー
//!
//! ログイン開始・コールバック成否・ログアウトを、`jq` で抽出しやすい
//! 構造化ログとして出力するための命名規約とマクロを提供する。
//!
//! ## 認証イベント
//!
//! [`log_auth_event!`] マクロで出力する。`event.kind = "auth_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "auth_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::error!` / `tracing::warn!` に `error.category` + `error.kind`
//! フィールドを直接追加する。定数は [`error`] モジュールで提供。
//!
//! トークン・認可コードはどのフィールドにも出力しないこと。

/// 認証イベントを構造化ログとして出力する。
///
/// `event.kind = "auth_event"` マーカーを自動付与し、`tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.scheme`: 認証スキーム名
/// - `event.reason`: 失敗理由コード
#[macro_export]
macro_rules! log_auth_event {
   ($($args:tt)*) => {
      ::tracing::info!(
         event.kind = "auth_event",
         $($args)*
      )
   };
}

/// イベントフィールドの定数
pub mod event {
   /// イベントアクション
   pub mod action {
      pub const CHALLENGE_ISSUED: &str = "auth.challenge_issued";
      pub const LOGIN_SUCCESS: &str = "auth.login_success";
      pub const LOGIN_FAILURE: &str = "auth.login_failure";
      pub const LOGOUT: &str = "auth.logout";
   }

   /// イベント結果
   pub mod result {
      pub const SUCCESS: &str = "success";
      pub const FAILURE: &str = "failure";
   }
}

/// エラーコンテキストフィールドの定数
pub mod error {
   /// エラーカテゴリ
   pub mod category {
      /// インフラストラクチャ（Redis セッションストア）
      pub const INFRASTRUCTURE: &str = "infrastructure";
      /// 外部サービス呼び出し（IdP のトークンエンドポイント・JWKS）
      pub const EXTERNAL_SERVICE: &str = "external_service";
      /// コールバック入力の検証失敗
      pub const INPUT: &str = "input";
      /// state の検証失敗
      pub const STATE: &str = "state";
      /// ID トークンの解析失敗
      pub const TOKEN_PARSE: &str = "token_parse";
   }

   /// エラー種別
   pub mod kind {
      pub const SESSION: &str = "session";
      pub const TOKEN_EXCHANGE: &str = "token_exchange";
      pub const TEMPLATE: &str = "template";
      pub const INTERNAL: &str = "internal";
   }
}
