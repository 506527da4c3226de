//! # State Protector
//!
//! [`AuthorizationRequestContext`] を URL に載せられる不透明な文字列に変換する。
//! サーバー側には何も保存せず、コールバックで受け取った文字列だけから元の値を復元する。
//!
//! ## 形式
//!
//! ```text
//! base64url_nopad( nonce(12) || ciphertext || tag(16) )
//! ```
//!
//! - 暗号: AES-256-GCM（blob ごとにランダムな 96 bit nonce）
//! - 鍵: `SHA-256(master_key || 0x00 || purpose)`
//! - purpose: `idbridge.oidc.{scheme}.state`（AAD としても束縛する）
//!
//! 復号・認証タグ検証・デシリアライズ・有効期限のいずれかに失敗した場合、
//! [`StateProtector::unprotect`] は `None` を返す。

use aes_gcm::{
   Aes256Gcm, Nonce,
   aead::{Aead, KeyInit, Payload},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use idbridge_domain::{AuthorizationRequestContext, clock::SharedClock};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::InfraError;

/// マスター鍵の最小長（バイト）
pub const MIN_MASTER_KEY_LENGTH: usize = 32;

const NONCE_LENGTH: usize = 12;
const TAG_LENGTH: usize = 16;

/// 認可リクエストコンテキストの暗号化・復号
pub struct StateProtector {
   cipher:  Aes256Gcm,
   purpose: String,
   ttl:     Duration,
   clock:   SharedClock,
}

impl StateProtector {
   /// マスター鍵とスキーム名から StateProtector を作る
   ///
   /// マスター鍵が [`MIN_MASTER_KEY_LENGTH`] 未満の場合はエラー。
   pub fn new(
      master_key: &[u8],
      scheme: &str,
      ttl: Duration,
      clock: SharedClock,
   ) -> Result<Self, InfraError> {
      if master_key.len() < MIN_MASTER_KEY_LENGTH {
         return Err(InfraError::configuration(format!(
            "state 保護鍵は {MIN_MASTER_KEY_LENGTH} バイト以上必要です（{} バイト）",
            master_key.len()
         )));
      }

      let purpose = format!("idbridge.oidc.{scheme}.state");
      let key = derive_key(master_key, &purpose);
      let cipher = Aes256Gcm::new_from_slice(&key)
         .map_err(|e| InfraError::configuration(format!("鍵の初期化に失敗しました: {e}")))?;

      Ok(Self {
         cipher,
         purpose,
         ttl,
         clock,
      })
   }

   /// プロセス内でのみ有効な一時鍵を生成する
   pub fn generate_master_key() -> [u8; MIN_MASTER_KEY_LENGTH] {
      let mut key = [0u8; MIN_MASTER_KEY_LENGTH];
      rand::rng().fill_bytes(&mut key);
      key
   }

   /// コンテキストを暗号化し、URL セーフな文字列にする
   pub fn protect(&self, context: &AuthorizationRequestContext) -> Result<String, InfraError> {
      let plaintext = serde_json::to_vec(context)?;

      let mut nonce = [0u8; NONCE_LENGTH];
      rand::rng().fill_bytes(&mut nonce);

      let ciphertext = self
         .cipher
         .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
               msg: &plaintext,
               aad: self.purpose.as_bytes(),
            },
         )
         .map_err(|_| InfraError::crypto("state の暗号化に失敗しました"))?;

      let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
      blob.extend_from_slice(&nonce);
      blob.extend_from_slice(&ciphertext);
      Ok(URL_SAFE_NO_PAD.encode(blob))
   }

   /// 文字列からコンテキストを復元する
   ///
   /// 改ざん・切り詰め・別の鍵やスキームで作られたもの・期限切れは `None`。
   /// 前後の空白も改ざんとみなす。
   pub fn unprotect(&self, protected: &str) -> Option<AuthorizationRequestContext> {
      let blob = URL_SAFE_NO_PAD.decode(protected).ok()?;
      if blob.len() < NONCE_LENGTH + TAG_LENGTH {
         return None;
      }

      let (nonce, ciphertext) = blob.split_at(NONCE_LENGTH);
      let plaintext = self
         .cipher
         .decrypt(
            Nonce::from_slice(nonce),
            Payload {
               msg: ciphertext,
               aad: self.purpose.as_bytes(),
            },
         )
         .ok()?;

      let context: AuthorizationRequestContext = serde_json::from_slice(&plaintext).ok()?;
      if !context.is_fresh(self.clock.now(), self.ttl) {
         tracing::debug!(issued_at = %context.issued_at, "state の有効期限外です");
         return None;
      }
      Some(context)
   }
}

fn derive_key(master_key: &[u8], purpose: &str) -> [u8; 32] {
   let mut hasher = Sha256::new();
   hasher.update(master_key);
   hasher.update([0u8]);
   hasher.update(purpose.as_bytes());
   hasher.finalize().into()
}

#[cfg(test)]
mod tests {
   use std::sync::Arc;

   use chrono::{DateTime, TimeZone, Utc};
   use idbridge_domain::clock::{FixedClock, ManualClock};
   use pretty_assertions::assert_eq;

   use super::*;

   const MASTER_KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

   fn issued_at() -> DateTime<Utc> {
      Utc.with_ymd_and_hms(2026, 5, 10, 8, 30, 0).unwrap()
   }

   fn protector_at(now: DateTime<Utc>) -> StateProtector {
      StateProtector::new(
         MASTER_KEY,
         "oidc",
         Duration::seconds(600),
         Arc::new(FixedClock::new(now)),
      )
      .unwrap()
   }

   fn context() -> AuthorizationRequestContext {
      AuthorizationRequestContext::new(
         "Zm9vYmFyYmF6cXV4cXV1eGNvcmdlZ3JhdWx0Z2FycGx5".to_string(),
         "/dashboard?tab=äöü".to_string(),
         issued_at(),
         Some("verifier-value".to_string()),
      )
   }

   #[test]
   fn test_protectしたものをunprotectすると元に戻る() {
      let sut = protector_at(issued_at());

      let protected = sut.protect(&context()).unwrap();
      let restored = sut.unprotect(&protected);

      assert_eq!(restored, Some(context()));
   }

   #[test]
   fn test_protectの結果はurlセーフでpaddingを含まない() {
      let sut = protector_at(issued_at());

      let protected = sut.protect(&context()).unwrap();

      assert!(
         protected
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
      );
   }

   #[test]
   fn test_同じコンテキストでも毎回異なる文字列になる() {
      let sut = protector_at(issued_at());

      let first = sut.protect(&context()).unwrap();
      let second = sut.protect(&context()).unwrap();

      assert_ne!(first, second);
   }

   #[test]
   fn test_どの1ビットを反転してもunprotectはnoneを返す() {
      let sut = protector_at(issued_at());
      let blob = URL_SAFE_NO_PAD
         .decode(sut.protect(&context()).unwrap())
         .unwrap();

      for byte_index in 0..blob.len() {
         for bit in 0..8 {
            let mut tampered = blob.clone();
            tampered[byte_index] ^= 1 << bit;

            let result = sut.unprotect(&URL_SAFE_NO_PAD.encode(&tampered));

            assert!(
               result.is_none(),
               "byte {byte_index} bit {bit} の改ざんが検出されませんでした"
            );
         }
      }
   }

   #[test]
   fn test_切り詰めた文字列はnoneを返す() {
      let sut = protector_at(issued_at());
      let protected = sut.protect(&context()).unwrap();

      for len in [0, 10, 37, protected.len() - 1] {
         assert!(sut.unprotect(&protected[..len]).is_none(), "長さ {len}");
      }
   }

   #[test]
   fn test_前後に空白を足した文字列はnoneを返す() {
      let sut = protector_at(issued_at());
      let protected = sut.protect(&context()).unwrap();

      for mutated in [
         format!(" {protected}\n"),
         format!("{protected} "),
         format!("\t{protected}"),
         format!("{protected}="),
      ] {
         assert!(sut.unprotect(&mutated).is_none(), "{mutated:?}");
      }
      assert!(sut.unprotect(&protected).is_some());
   }

   #[test]
   fn test_base64として不正な文字列はnoneを返す() {
      let sut = protector_at(issued_at());

      assert!(sut.unprotect("not base64 !!").is_none());
      assert!(sut.unprotect("").is_none());
   }

   #[test]
   fn test_別の鍵で作られたものはnoneを返す() {
      let other = StateProtector::new(
         b"ffffffffffffffffffffffffffffffff",
         "oidc",
         Duration::seconds(600),
         Arc::new(FixedClock::new(issued_at())),
      )
      .unwrap();
      let protected = other.protect(&context()).unwrap();

      assert!(protector_at(issued_at()).unprotect(&protected).is_none());
   }

   #[test]
   fn test_別のスキームで作られたものはnoneを返す() {
      let other = StateProtector::new(
         MASTER_KEY,
         "partner",
         Duration::seconds(600),
         Arc::new(FixedClock::new(issued_at())),
      )
      .unwrap();
      let protected = other.protect(&context()).unwrap();

      assert!(protector_at(issued_at()).unprotect(&protected).is_none());
   }

   #[test]
   fn test_有効期限を過ぎたものはnoneを返す() {
      let clock = Arc::new(ManualClock::new(issued_at()));
      let sut =
         StateProtector::new(MASTER_KEY, "oidc", Duration::seconds(600), clock.clone()).unwrap();
      let protected = sut.protect(&context()).unwrap();

      clock.advance(Duration::seconds(600));
      let fresh = sut.unprotect(&protected);
      clock.advance(Duration::seconds(1));
      let expired = sut.unprotect(&protected);

      assert!(fresh.is_some());
      assert!(expired.is_none());
   }

   #[test]
   fn test_短すぎるマスター鍵はエラー() {
      let result = StateProtector::new(
         b"short",
         "oidc",
         Duration::seconds(600),
         Arc::new(FixedClock::new(issued_at())),
      );

      assert!(result.is_err());
   }

   #[test]
   fn test_generate_master_keyは毎回異なる鍵を返す() {
      assert_ne!(
         StateProtector::generate_master_key(),
         StateProtector::generate_master_key()
      );
   }
}
