//! # HTML ビュー
//!
//! 自動送信フォームとエラーページを tera で描画する。
//! テンプレートは `include_str!` でバイナリに埋め込む。
//! 拡張子 `.html` のテンプレートは自動エスケープされる。

use chrono::{DateTime, Utc};
use tera::{Context, Tera};

const AUTHORIZE_FORM: &str = "authorize_form.html";
const ERROR_PAGE: &str = "error.html";

pub struct TemplateRenderer {
   engine: Tera,
}

impl TemplateRenderer {
   pub fn new() -> Result<Self, tera::Error> {
      let mut engine = Tera::default();
      engine.add_raw_templates(vec![
         (
            AUTHORIZE_FORM,
            include_str!("../templates/authorize_form.html"),
         ),
         (ERROR_PAGE, include_str!("../templates/error.html")),
      ])?;
      Ok(Self { engine })
   }

   /// 認可エンドポイントへ POST するフォーム
   pub fn render_authorize_form(
      &self,
      action: &str,
      fields: &[(String, String)],
   ) -> Result<String, tera::Error> {
      let mut context = Context::new();
      context.insert("action", action);
      context.insert("fields", fields);
      self.engine.render(AUTHORIZE_FORM, &context)
   }

   /// エラーページ
   ///
   /// - `reason`: 既知の理由コード（不明な値は渡さない）
   pub fn render_error_page(
      &self,
      message: &str,
      reason: Option<&str>,
      occurred_at: DateTime<Utc>,
   ) -> Result<String, tera::Error> {
      let mut context = Context::new();
      context.insert("message", message);
      context.insert("reason", &reason);
      context.insert("occurred_at", &occurred_at.to_rfc3339());
      self.engine.render(ERROR_PAGE, &context)
   }
}
