//! # ミドルウェア
//!
//! 全ルートに共通で適用するミドルウェア。

mod cache_control;
mod request_id;

pub use cache_control::no_cache;
pub use request_id::{current_request_id, inject_request_id, store_request_id};
