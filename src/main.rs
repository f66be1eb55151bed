mod app;
mod domain;
mod infra;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

use crate::app::server;
use crate::domain::article::{ArticleService, PgArticleRepository};
use crate::infra::db;
use crate::types::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 環境変数を読み込み（.envファイルがあれば使用）
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;

    // 起動時にデータベースへ到達できない場合はそのままプロセスを終了する
    let pool = db::setup_database(&config.database_url)
        .await
        .context("データベースの初期化に失敗")?;

    let repository = Arc::new(PgArticleRepository::new(pool.clone()));
    let service = ArticleService::new(repository);
    let router = server::build_router(service);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("ポート{}のバインドに失敗", config.port))?;
    tracing::info!("サーバーを起動しました: {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
        .context("サーバーの実行中にエラーが発生")?;

    // 処理中のリクエストが掃けた後に接続プールを解放する
    pool.close().await;
    tracing::info!("サーバーを停止しました");

    Ok(())
}
