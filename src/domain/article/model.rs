use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// ページ番号のデフォルト値
pub const DEFAULT_PAGE: i64 = 1;
/// 1ページあたり件数のデフォルト値
pub const DEFAULT_LIMIT: i64 = 10;
/// 1ページあたり件数の上限
pub const MAX_LIMIT: i64 = 100;

// 記事エンティティ
// author_nameはJOINで取得する読み取り専用項目のため、作成直後はNoneになる
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: String,
    pub author_id: String,
    pub author_name: Option<String>,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// 著者エンティティ（著者の管理は外部システムの責務、本サービスは名前の参照のみ）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// 挿入用の記事データ
/// idはサービス層で払い出し、created_atはストアが割り当てる
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
}

// 記事作成リクエスト
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(length(min = 1, message = "author_idは必須です"))]
    pub author_id: String,
    #[validate(length(min = 1, max = 200, message = "titleは1〜200文字で指定してください"))]
    pub title: String,
    #[validate(length(min = 1, message = "bodyは必須です"))]
    pub body: String,
}

// 記事一覧リクエスト（クエリ文字列からバインドされる）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetArticlesRequest {
    /// タイトル・本文に対する部分一致検索（空文字列は条件なし）
    #[serde(default)]
    pub query: String,
    /// 著者名に対する部分一致検索（空文字列は条件なし）
    #[serde(default)]
    pub author_name: String,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    DEFAULT_PAGE
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for GetArticlesRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            author_name: String::new(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

// 記事一覧レスポンス
// totalはページングを無視した総件数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetArticlesResponse {
    pub articles: Vec<Article>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}
