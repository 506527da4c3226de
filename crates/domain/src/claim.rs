//! # クレーム
//!
//! ID トークンから得られる認証済み主体についての主張（key/value）を表現する。
//!
//! ## OIDC クレーム名と正規クレーム型
//!
//! 下流の利用者がどちらの語彙でも参照できるよう、よく知られた OIDC クレーム名は
//! 正規のアイデンティティクレーム型 URI に写像し、元の OIDC 名のクレームも残す。
//!
//! | OIDC 名 | 正規クレーム型 |
//! |---------|----------------|
//! | `sub` | [`claim_types::NAME_IDENTIFIER`] |
//! | `email` | [`claim_types::EMAIL`] |
//! | `name` | [`claim_types::NAME`] |
//! | `given_name` | [`claim_types::GIVEN_NAME`] |
//! | `family_name` | [`claim_types::SURNAME`] |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 正規アイデンティティクレーム型
pub mod claim_types {
   pub const NAME_IDENTIFIER: &str =
      "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
   pub const EMAIL: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/emailaddress";
   pub const NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name";
   pub const GIVEN_NAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/givenname";
   pub const SURNAME: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/surname";
}

/// OIDC クレーム名に対応する正規クレーム型を返す
pub fn canonical_type_for(oidc_name: &str) -> Option<&'static str> {
   match oidc_name {
      "sub" => Some(claim_types::NAME_IDENTIFIER),
      "email" => Some(claim_types::EMAIL),
      "name" => Some(claim_types::NAME),
      "given_name" => Some(claim_types::GIVEN_NAME),
      "family_name" => Some(claim_types::SURNAME),
      _ => None,
   }
}

/// クレーム
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Claim {
   #[serde(rename = "type")]
   pub claim_type: String,
   pub value:      String,
}

impl Claim {
   pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
      Self {
         claim_type: claim_type.into(),
         value:      value.into(),
      }
   }
}

/// クレームの集合
///
/// 同一の (type, value) は 1 つにまとめる。順序に意味はないが、
/// 表示の安定のため挿入順を保持する。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet(Vec<Claim>);

impl ClaimSet {
   pub fn new() -> Self {
      Self::default()
   }

   /// クレームを追加する。既に同じクレームがあれば何もしない
   pub fn insert(&mut self, claim: Claim) {
      if !self.0.contains(&claim) {
         self.0.push(claim);
      }
   }

   /// 指定した型の最初の値を返す
   pub fn find_first(&self, claim_type: &str) -> Option<&str> {
      self.0
         .iter()
         .find(|c| c.claim_type == claim_type)
         .map(|c| c.value.as_str())
   }

   pub fn contains(&self, claim_type: &str, value: &str) -> bool {
      self.0
         .iter()
         .any(|c| c.claim_type == claim_type && c.value == value)
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }

   pub fn iter(&self) -> impl Iterator<Item = &Claim> {
      self.0.iter()
   }

   /// JWT ペイロードの JSON オブジェクトからクレーム集合を組み立てる
   ///
   /// - 文字列はそのまま、数値・真偽値は JSON 表記の文字列にする
   /// - 配列は要素ごとに 1 クレームにする
   /// - オブジェクトはコンパクトな JSON 文字列にする
   /// - `null` は無視する
   pub fn from_oidc_payload(payload: &Map<String, Value>) -> Self {
      let mut claims = Self::new();
      for (name, value) in payload {
         for rendered in render_values(value) {
            if let Some(canonical) = canonical_type_for(name) {
               claims.insert(Claim::new(canonical, rendered.clone()));
            }
            claims.insert(Claim::new(name.clone(), rendered));
         }
      }
      claims
   }
}

impl<'a> IntoIterator for &'a ClaimSet {
   type IntoIter = std::slice::Iter<'a, Claim>;
   type Item = &'a Claim;

   fn into_iter(self) -> Self::IntoIter {
      self.0.iter()
   }
}

fn render_values(value: &Value) -> Vec<String> {
   match value {
      Value::Null => Vec::new(),
      Value::String(s) => vec![s.clone()],
      Value::Array(items) => items.iter().flat_map(render_values).collect(),
      other => vec![other.to_string()],
   }
}
