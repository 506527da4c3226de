//! # ID トークンからのクレーム抽出
//!
//! トークンエンドポイントから受け取った ID トークン（JWT）のペイロードを
//! [`ClaimSet`] に変換する。どの失敗も `None` で表し、呼び出し側は
//! `claims_extraction_failed` として扱う。
//!
//! ## 検証モード
//!
//! | モード | 署名 | `iss` / `aud` | `exp` / `nbf` |
//! |-------|------|---------------|---------------|
//! | [`IdTokenDecoder::unverified`] | 検証しない | 検証しない | 検証しない |
//! | [`IdTokenDecoder::verified`] | JWKS の `kid` で検証 | 検証する | 検証する |
//!
//! 検証モードでは RS / PS / ES 系のアルゴリズムのみを受け付ける（HS 系は受け付けない）。

use std::collections::HashSet;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use idbridge_domain::ClaimSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde_json::{Map, Value};

/// 検証モードで受け付ける署名アルゴリズム
const ALLOWED_ALGORITHMS: &[Algorithm] = &[
   Algorithm::RS256,
   Algorithm::RS384,
   Algorithm::RS512,
   Algorithm::PS256,
   Algorithm::PS384,
   Algorithm::PS512,
   Algorithm::ES256,
   Algorithm::ES384,
];

/// 署名検証に使う鍵と期待値
struct Verification {
   jwks:     JwkSet,
   issuers:  Vec<String>,
   audience: String,
}

/// ID トークンのデコーダ
pub struct IdTokenDecoder {
   verification: Option<Verification>,
}

impl IdTokenDecoder {
   /// 署名・発行者・有効期限を検証せずにペイロードだけを読むデコーダ
   pub fn unverified() -> Self {
      Self { verification: None }
   }

   /// JWKS で署名を検証し、`iss` / `aud` / `exp` / `nbf` も検証するデコーダ
   ///
   /// `issuer` は末尾の `/` の有無を区別しない。
   pub fn verified(jwks: JwkSet, issuer: &str, audience: &str) -> Self {
      let trimmed = issuer.trim_end_matches('/');
      Self {
         verification: Some(Verification {
            jwks,
            issuers: vec![trimmed.to_string(), format!("{trimmed}/")],
            audience: audience.to_string(),
         }),
      }
   }

   pub fn is_verifying(&self) -> bool {
      self.verification.is_some()
   }

   /// ID トークンからクレームを取り出す
   ///
   /// デコード・検証に失敗した場合、またはクレームが 1 つも得られない場合は `None`。
   pub fn extract_claims(&self, id_token: &str) -> Option<ClaimSet> {
      let payload = match &self.verification {
         None => decode_payload(id_token)?,
         Some(verification) => verification.decode(id_token)?,
      };

      let claims = ClaimSet::from_oidc_payload(&payload);
      if claims.is_empty() { None } else { Some(claims) }
   }
}

impl Verification {
   fn decode(&self, id_token: &str) -> Option<Map<String, Value>> {
      let header = decode_header(id_token)
         .inspect_err(|e| tracing::debug!("ID トークンのヘッダーを解釈できません: {}", e))
         .ok()?;

      if !ALLOWED_ALGORITHMS.contains(&header.alg) {
         tracing::debug!(alg = ?header.alg, "許可されていない署名アルゴリズムです");
         return None;
      }

      let Some(kid) = header.kid.as_deref() else {
         tracing::debug!("ID トークンに kid がありません");
         return None;
      };
      let Some(jwk) = self.jwks.find(kid) else {
         tracing::debug!(kid, "JWKS に一致する鍵がありません");
         return None;
      };
      let key = DecodingKey::from_jwk(jwk)
         .inspect_err(|e| tracing::debug!(kid, "JWK から鍵を作れません: {}", e))
         .ok()?;

      let mut validation = Validation::new(header.alg);
      validation.set_issuer(&self.issuers);
      validation.set_audience(&[&self.audience]);
      validation.validate_nbf = true;
      validation.required_spec_claims = HashSet::from([
         "exp".to_string(),
         "iss".to_string(),
         "aud".to_string(),
      ]);

      decode::<Map<String, Value>>(id_token, &key, &validation)
         .inspect_err(|e| tracing::debug!(kid, "ID トークンの検証に失敗しました: {}", e))
         .ok()
         .map(|data| data.claims)
   }
}

/// 署名を検証せずに JWT のペイロード部分を JSON オブジェクトとして読む
fn decode_payload(id_token: &str) -> Option<Map<String, Value>> {
   let mut segments = id_token.trim().split('.');
   let (Some(_header), Some(payload), Some(_signature), None) = (
      segments.next(),
      segments.next(),
      segments.next(),
      segments.next(),
   ) else {
      return None;
   };

   let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
   match serde_json::from_slice(&bytes).ok()? {
      Value::Object(map) => Some(map),
      _ => None,
   }
}
