use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use validator::Validate;

use crate::domain::article::{ArticleService, CreateArticleRequest, GetArticlesRequest};

/// ハンドラ間で共有する状態
#[derive(Clone)]
pub struct AppState {
    pub article_service: ArticleService,
}

/// APIレスポンスとして返すエラー
/// 入力検証エラーは理由をそのまま返し、内部エラーは固定メッセージに丸めて詳細をログにのみ残す
pub enum ApiError {
    /// 入力検証エラー（400）
    Validation(String),
    /// サービス・ストア起因の内部エラー（500）
    Internal {
        message: &'static str,
        source: anyhow::Error,
    },
}

impl ApiError {
    /// 入力検証エラーを作成
    pub fn validation<M: Into<String>>(message: M) -> Self {
        Self::Validation(message.into())
    }

    /// 内部エラーを作成
    pub fn internal(message: &'static str, source: anyhow::Error) -> Self {
        Self::Internal { message, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal { message, source } => {
                tracing::error!("内部エラー: {:#}", source);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

/// 記事関連のルーティング
pub fn article_routes(state: AppState) -> Router {
    Router::new()
        .route("/articles", post(create_article).get(get_articles))
        .with_state(state)
}

/// ヘルスチェック用のルーティング
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

// 死活監視用。常に200を返す。
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

async fn create_article(
    State(state): State<AppState>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    req.validate().map_err(|e| ApiError::validation(e.to_string()))?;

    let article = state
        .article_service
        .create_article(&req)
        .await
        .map_err(|e| ApiError::internal("記事の作成に失敗しました", e))?;

    Ok((StatusCode::CREATED, Json(json!({ "data": article }))).into_response())
}

async fn get_articles(
    State(state): State<AppState>,
    query: Result<Query<GetArticlesRequest>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(req) = query.map_err(|e| ApiError::validation(e.body_text()))?;

    let response = state
        .article_service
        .get_articles(req)
        .await
        .map_err(|e| ApiError::internal("記事一覧の取得に失敗しました", e))?;

    Ok(Json(json!({ "data": response })).into_response())
}
