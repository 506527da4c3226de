//! # OpenAPI YAML 生成ツール
//!
//! BFF の Rust 型から OpenAPI 仕様を YAML 形式で標準出力に出力する。
//! どのパスからも参照されないコンポーネントスキーマは除去する。
//!
//! ## 使い方
//!
//! ```bash
//! cargo run --bin generate-openapi -p idbridge-bff > openapi/openapi.yaml
//! ```

use std::collections::HashSet;

use idbridge_bff::openapi::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
   let mut openapi = ApiDoc::openapi();
   remove_unused_schemas(&mut openapi)?;
   print!("{}", openapi.to_yaml()?);
   Ok(())
}

/// `$ref` で参照されていないコンポーネントスキーマを除去する
fn remove_unused_schemas(openapi: &mut utoipa::openapi::OpenApi) -> serde_json::Result<()> {
   let json = serde_json::to_string(openapi)?;

   // "$ref":"#/components/schemas/SchemaName"
   let prefix = "#/components/schemas/";
   let used_schemas: HashSet<&str> = json
      .match_indices(prefix)
      .filter_map(|(start, _)| {
         let rest = &json[start + prefix.len()..];
         rest.find('"').map(|end| &rest[..end])
      })
      .collect();

   if let Some(components) = &mut openapi.components {
      components
         .schemas
         .retain(|name, _| used_schemas.contains(name.as_str()));
   }
   Ok(())
}
