//! # Clock（時刻プロバイダ）
//!
//! state の有効期限判定とセッションチケットの `issued_at` / `expires_at` 計算で
//! `Utc::now()` を直接呼ばないための抽象化。テストでは固定時刻を注入する。

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

/// 現在時刻を提供するトレイト
pub trait Clock: Send + Sync {
   fn now(&self) -> DateTime<Utc>;
}

/// 各コンポーネントで共有する Clock
pub type SharedClock = Arc<dyn Clock>;

/// システム時刻を返す実装
pub struct SystemClock;

impl Clock for SystemClock {
   fn now(&self) -> DateTime<Utc> {
      Utc::now()
   }
}

/// 固定時刻を返すテスト用実装
pub struct FixedClock {
   now: DateTime<Utc>,
}

impl FixedClock {
   pub fn new(now: DateTime<Utc>) -> Self {
      Self { now }
   }
}

impl Clock for FixedClock {
   fn now(&self) -> DateTime<Utc> {
      self.now
   }
}

/// テストから時刻を進められる実装
///
/// state の期限切れのように、同じコンポーネントで時間経過を再現したいときに使う。
pub struct ManualClock {
   now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
   pub fn new(start: DateTime<Utc>) -> Self {
      Self {
         now: Mutex::new(start),
      }
   }

   pub fn advance(&self, delta: chrono::Duration) {
      let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
      *now += delta;
   }
}

impl Clock for ManualClock {
   fn now(&self) -> DateTime<Utc> {
      *self.now.lock().unwrap_or_else(PoisonError::into_inner)
   }
}
