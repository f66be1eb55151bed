use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use super::model::{
    Article, CreateArticleRequest, GetArticlesRequest, GetArticlesResponse, NewArticle,
    DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT,
};
use super::repository::ArticleRepository;

/// 記事のユースケースを提供するサービス層
///
/// ページングの正規化と記事IDの払い出しを担当し、永続化はリポジトリに委譲する。
#[derive(Clone)]
pub struct ArticleService {
    repository: Arc<dyn ArticleRepository>,
}

impl ArticleService {
    /// 新しいサービスを作成
    pub fn new(repository: Arc<dyn ArticleRepository>) -> Self {
        Self { repository }
    }

    /// 記事を新規作成する
    /// 記事IDはUUID v4で払い出す（データベースには生成させない）
    pub async fn create_article(&self, req: &CreateArticleRequest) -> Result<Article> {
        let new_article = NewArticle {
            id: Uuid::new_v4().to_string(),
            author_id: req.author_id.clone(),
            title: req.title.clone(),
            body: req.body.clone(),
        };

        let created_at = self
            .repository
            .create(&new_article)
            .await
            .context("記事の作成に失敗")?;

        // author_nameはJOINでのみ取得するため、作成直後のレスポンスには含まれない
        Ok(Article {
            id: new_article.id,
            author_id: new_article.author_id,
            author_name: None,
            title: new_article.title,
            body: new_article.body,
            created_at,
        })
    }

    /// 記事一覧を取得する
    /// ページングパラメータの正規化を行ってからリポジトリに委譲する
    pub async fn get_articles(&self, req: GetArticlesRequest) -> Result<GetArticlesResponse> {
        let mut req = req;
        if req.page < DEFAULT_PAGE {
            req.page = DEFAULT_PAGE;
        }
        // 範囲外のlimitはデフォルト値に戻す（上限に丸めない）
        if req.limit < 1 || req.limit > MAX_LIMIT {
            req.limit = DEFAULT_LIMIT;
        }

        let (articles, total) = self
            .repository
            .get_list(&req)
            .await
            .context("記事一覧の取得に失敗")?;

        Ok(GetArticlesResponse {
            articles,
            total,
            page: req.page,
            limit: req.limit,
        })
    }
}
