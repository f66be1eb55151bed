use axum::Router;
use tower_http::trace::TraceLayer;

use super::routes::{article_routes, health_routes, AppState};
use crate::domain::article::ArticleService;

/// 全エンドポイントを束ねたルーターを構築する
pub fn build_router(article_service: ArticleService) -> Router {
    let state = AppState { article_service };

    Router::new()
        .merge(health_routes())
        .merge(article_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// SIGINT / SIGTERM を待機する
///
/// このFutureが完了するとサーバーは新規接続の受付を止め、
/// 処理中のリクエストの完了を待ってから停止する。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("SIGINTハンドラの登録に失敗");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERMハンドラの登録に失敗")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("シャットダウンシグナルを受信しました");
}
