//! # idbridge BFF サーバー
//!
//! ブラウザ向けの OIDC 認証ゲートウェイ。
//!
//! ## 役割
//!
//! - **ログイン**: IdP の認可エンドポイントへ送り出す（state は暗号化して自己完結させる）
//! - **コールバック**: 認可コードをトークンに交換し、ID トークンのクレームでセッションを作る
//! - **セッション**: ブラウザには HttpOnly Cookie のセッション ID のみを渡し、トークンは Redis に置く
//! - **ログアウト**: セッション破棄と IdP へのログアウト連携
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Browser    │────▶│     BFF      │────▶│     IdP      │
//! │              │     │  port: 13000 │     │    (OIDC)    │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                             │
//!                             ▼
//!                      ┌──────────────┐
//!                      │    Redis     │
//!                      │  (Session)   │
//!                      └──────────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `BFF_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `BFF_PORT` | **Yes** | ポート番号 |
//! | `BFF_PUBLIC_URL` | **Yes** | ブラウザから見た BFF の URL |
//! | `REDIS_URL` | **Yes** | Redis 接続 URL |
//! | `OIDC_AUTHORITY` | **Yes** | IdP の URL |
//! | `OIDC_CLIENT_ID` | **Yes** | クライアント ID |
//! | `STATE_PROTECTION_KEY` | No | state 暗号化鍵（base64、未設定なら起動ごとに生成） |
//!
//! その他の項目は `config` モジュールを参照。
//!
//! ## 起動方法
//!
//! ```bash
//! cargo run -p idbridge-bff
//! ```

mod app_builder;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use idbridge_bff::{
   client::{TokenClientImpl, fetch_jwks},
   config::{BffConfig, OidcConfig},
   handler::{AuthState, ReadinessState},
   usecase::{CallbackProcessor, ChallengeInitiator},
   view::TemplateRenderer,
};
use idbridge_domain::clock::{SharedClock, SystemClock};
use idbridge_infra::{IdTokenDecoder, RedisSessionStore, StateProtector};
use idbridge_shared::observability::TracingConfig;
use tokio::net::TcpListener;

/// BFF サーバーのエントリーポイント
///
/// 1. 環境変数の読み込み（.env ファイル）
/// 2. トレーシングの初期化
/// 3. 設定の読み込み（不正なら起動しない）
/// 4. Redis・state 保護・ID トークン検証の初期化
/// 5. ルーターの構築と HTTP サーバーの起動
#[tokio::main]
async fn main() -> anyhow::Result<()> {
   // 本番環境では .env ファイルは使用せず、環境変数を直接設定する
   dotenvy::dotenv().ok();

   let tracing_config = TracingConfig::from_env("bff");
   idbridge_shared::observability::init_tracing(tracing_config);
   let _tracing_guard = tracing::info_span!("app", service = "bff").entered();

   let config = BffConfig::from_env().context("設定の読み込みに失敗しました")?;
   tracing::info!(?config, "BFF サーバーを起動します");

   let clock: SharedClock = Arc::new(SystemClock);
   let oidc = Arc::new(config.oidc.clone());

   let session_store = RedisSessionStore::connect(&config.redis_url, clock.clone())
      .await
      .context("Redis への接続に失敗しました")?;
   let readiness_state = Arc::new(ReadinessState {
      redis_conn: session_store.connection(),
   });

   let master_key = match &config.state_protection_key {
      Some(key) => key.clone(),
      None => {
         tracing::warn!(
            "STATE_PROTECTION_KEY が未設定のため一時鍵を生成します。再起動すると進行中のログインは失敗します"
         );
         StateProtector::generate_master_key().to_vec()
      }
   };
   let protector = Arc::new(
      StateProtector::new(&master_key, &oidc.scheme, oidc.state_ttl, clock.clone())
         .context("state 保護の初期化に失敗しました")?,
   );

   let id_token_decoder = Arc::new(build_id_token_decoder(&oidc).await?);
   let token_client = Arc::new(
      TokenClientImpl::new(
         &oidc.token_endpoint,
         &oidc.client_id,
         oidc.client_secret.as_deref(),
         oidc.token_timeout,
      )
      .context("HTTP クライアントの初期化に失敗しました")?,
   );

   let auth_state = Arc::new(AuthState {
      challenge_initiator: ChallengeInitiator::new(oidc.clone(), protector.clone(), clock.clone())
         .context("認可リクエストの初期化に失敗しました")?,
      callback_processor: CallbackProcessor::new(
         oidc.clone(),
         protector,
         token_client,
         id_token_decoder,
         clock.clone(),
      ),
      session_store: Arc::new(session_store),
      templates: TemplateRenderer::new().context("テンプレートの読み込みに失敗しました")?,
      config: oidc,
      clock,
   });

   let app = app_builder::build_app(&config.cors, auth_state, readiness_state);

   let addr: SocketAddr = format!("{}:{}", config.host, config.port)
      .parse()
      .context("アドレスのパースに失敗しました")?;
   let listener = TcpListener::bind(addr).await?;
   tracing::info!("BFF サーバーが起動しました: {}", addr);

   axum::serve(listener, app).await?;

   Ok(())
}

/// ID トークンのデコーダを用意する
///
/// 署名検証が有効なら起動時に JWKS を取得する。取得できなければ起動しない。
async fn build_id_token_decoder(oidc: &OidcConfig) -> anyhow::Result<IdTokenDecoder> {
   if !oidc.verify_id_token {
      tracing::warn!("ID トークンの署名を検証しません（OIDC_VERIFY_ID_TOKEN=false）");
      return Ok(IdTokenDecoder::unverified());
   }

   let jwks = fetch_jwks(&oidc.jwks_uri, oidc.token_timeout)
      .await
      .with_context(|| format!("JWKS の取得に失敗しました: {}", oidc.jwks_uri))?;
   tracing::info!(keys = jwks.keys.len(), "JWKS を取得しました");
   Ok(IdTokenDecoder::verified(
      jwks,
      &oidc.authority,
      &oidc.client_id,
   ))
}
