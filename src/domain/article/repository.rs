use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::model::{Article, GetArticlesRequest, NewArticle};
use crate::types::{StoreError, StoreResult};

/// 記事一覧クエリのビルダー
///
/// 検索条件から件数取得クエリとページング付き取得クエリを組み立てる。
/// 両クエリはWHERE句とバインド値の並びを共有する。
/// 条件式とバインド値は必ず同時に追加する。プレースホルダ番号は追加順に1から振られ、
/// LIMIT/OFFSETのプレースホルダは全ての検索条件の後に来る。
#[derive(Debug)]
struct ArticleQueryBuilder {
    conditions: Vec<String>,
    params: Vec<String>,
    limit: i64,
    offset: i64,
}

impl ArticleQueryBuilder {
    /// リクエストからビルダーを構築する（リクエストは正規化済みであること）
    fn from_request(req: &GetArticlesRequest) -> Self {
        let mut builder = Self {
            conditions: Vec::new(),
            params: Vec::new(),
            limit: req.limit,
            offset: (req.page - 1) * req.limit,
        };

        if !req.query.is_empty() {
            builder.push_text_filter(&req.query);
        }
        if !req.author_name.is_empty() {
            builder.push_author_filter(&req.author_name);
        }

        builder
    }

    /// タイトル・本文への部分一致条件を追加する
    /// 1つのバインド値をタイトルと本文の両方の述語で参照する
    fn push_text_filter(&mut self, text: &str) {
        let index = self.params.len() + 1;
        self.conditions.push(format!(
            "(a.title ILIKE ${0} OR a.body ILIKE ${0})",
            index
        ));
        self.params.push(format!("%{}%", text));
    }

    /// 著者名への部分一致条件を追加する
    fn push_author_filter(&mut self, name: &str) {
        let index = self.params.len() + 1;
        self.conditions.push(format!("au.name ILIKE ${}", index));
        self.params.push(format!("%{}%", name));
    }

    // 条件が無い場合は空文字列（全件一致）
    fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    /// 件数取得クエリ（ページングは適用しない）
    fn count_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) FROM articles a INNER JOIN authors au ON a.author_id = au.id {}",
            self.where_clause()
        )
    }

    /// ページング付き取得クエリ
    fn select_sql(&self) -> String {
        let limit_index = self.params.len() + 1;
        format!(
            "SELECT a.id, a.author_id, au.name AS author_name, a.title, a.body, a.created_at \
             FROM articles a \
             INNER JOIN authors au ON a.author_id = au.id \
             {} \
             ORDER BY a.created_at DESC \
             LIMIT ${} OFFSET ${}",
            self.where_clause(),
            limit_index,
            limit_index + 1
        )
    }

    /// 検索条件のバインド値（追加順）
    fn params(&self) -> &[String] {
        &self.params
    }
}

/// 記事ストアの抽象化トレイト
///
/// PostgreSQL実装とテスト用のインメモリ実装を統一的に扱うためのインターフェース。
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// 記事を1件挿入し、ストアが割り当てた作成日時を返す
    /// idを含む全フィールドは呼び出し側が用意する
    async fn create(&self, article: &NewArticle) -> StoreResult<DateTime<Utc>>;

    /// 条件に合致する記事一覧と総件数を返す
    /// 総件数はページングを無視して数える
    async fn get_list(&self, req: &GetArticlesRequest) -> StoreResult<(Vec<Article>, i64)>;
}

/// PostgreSQLを使用した本番用の記事ストア実装
pub struct PgArticleRepository {
    pool: PgPool,
}

impl PgArticleRepository {
    /// 新しい記事ストアを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArticleRepository for PgArticleRepository {
    async fn create(&self, article: &NewArticle) -> StoreResult<DateTime<Utc>> {
        let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            INSERT INTO articles (id, author_id, title, body)
            VALUES ($1, $2, $3, $4)
            RETURNING created_at
            "#,
        )
        .bind(&article.id)
        .bind(&article.author_id)
        .bind(&article.title)
        .bind(&article.body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::query("記事の作成", e))?;

        Ok(created_at)
    }

    async fn get_list(&self, req: &GetArticlesRequest) -> StoreResult<(Vec<Article>, i64)> {
        let builder = ArticleQueryBuilder::from_request(req);

        // 件数取得とページ取得は同一トランザクションにしていない。
        // 書き込みと競合した場合、totalとページ内容がずれることがある（仕様上の制限）。
        let count_sql = builder.count_sql();
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for param in builder.params() {
            count_query = count_query.bind(param.as_str());
        }
        let total = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::query("記事件数の取得", e))?;

        let select_sql = builder.select_sql();
        let mut select_query = sqlx::query_as::<_, Article>(&select_sql);
        for param in builder.params() {
            select_query = select_query.bind(param.as_str());
        }
        let articles = select_query
            .bind(builder.limit)
            .bind(builder.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query("記事一覧の取得", e))?;

        Ok((articles, total))
    }
}

/// テスト用のインメモリ記事ストア
///
/// この実装はテスト時にDIされ、データベースに接続せずに
/// 一覧取得の仕様（部分一致・AND結合・作成日時降順・ページング）を再現します。
pub struct InMemoryArticleRepository {
    /// 著者ID→表示名の対応（JOINの代わり）
    authors: HashMap<String, String>,
    articles: Mutex<Vec<Article>>,
    /// 直近にget_listへ渡されたリクエスト（正規化の検証用）
    last_request: Mutex<Option<GetArticlesRequest>>,
    /// モック時に返すステータス（成功/失敗の制御）
    should_succeed: bool,
}

impl InMemoryArticleRepository {
    /// 空のインメモリストアを作成
    pub fn new() -> Self {
        Self::with_authors(Vec::new())
    }

    /// 著者を登録済みのインメモリストアを作成
    pub fn with_authors(authors: Vec<(&str, &str)>) -> Self {
        Self {
            authors: authors
                .into_iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            articles: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
            should_succeed: true,
        }
    }

    /// 全操作が失敗するインメモリストアを作成
    pub fn new_failing() -> Self {
        Self {
            should_succeed: false,
            ..Self::new()
        }
    }

    /// 直近のget_listリクエストを取得
    pub fn last_request(&self) -> Option<GetArticlesRequest> {
        self.last_request
            .lock()
            .expect("ロックの取得に失敗")
            .clone()
    }
}

impl Default for InMemoryArticleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleRepository for InMemoryArticleRepository {
    async fn create(&self, article: &NewArticle) -> StoreResult<DateTime<Utc>> {
        if !self.should_succeed {
            return Err(StoreError::connection(sqlx::Error::PoolTimedOut));
        }

        let created_at = Utc::now();
        let stored = Article {
            id: article.id.clone(),
            author_id: article.author_id.clone(),
            author_name: self.authors.get(&article.author_id).cloned(),
            title: article.title.clone(),
            body: article.body.clone(),
            created_at,
        };
        self.articles
            .lock()
            .expect("ロックの取得に失敗")
            .push(stored);

        Ok(created_at)
    }

    async fn get_list(&self, req: &GetArticlesRequest) -> StoreResult<(Vec<Article>, i64)> {
        if !self.should_succeed {
            return Err(StoreError::connection(sqlx::Error::PoolTimedOut));
        }

        *self.last_request.lock().expect("ロックの取得に失敗") = Some(req.clone());

        let query = req.query.to_lowercase();
        let author_name = req.author_name.to_lowercase();

        let mut matched: Vec<Article> = self
            .articles
            .lock()
            .expect("ロックの取得に失敗")
            .iter()
            .filter(|article| {
                let text_hit = query.is_empty()
                    || article.title.to_lowercase().contains(&query)
                    || article.body.to_lowercase().contains(&query);
                let author_hit = author_name.is_empty()
                    || article
                        .author_name
                        .as_deref()
                        .unwrap_or("")
                        .to_lowercase()
                        .contains(&author_name);
                text_hit && author_hit
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matched.len() as i64;
        let offset = ((req.page - 1) * req.limit).max(0) as usize;
        let page: Vec<Article> = matched
            .into_iter()
            .skip(offset)
            .take(req.limit.max(0) as usize)
            .collect();

        Ok((page, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // クエリ組み立て系テスト
    mod builder {
        use super::*;

        #[test]
        fn test_no_filters() {
            let builder = ArticleQueryBuilder::from_request(&GetArticlesRequest::default());

            assert!(builder.params().is_empty());
            assert!(
                !builder.count_sql().contains("WHERE"),
                "条件なしの場合はWHERE句を出力しない"
            );
            // ページングのプレースホルダは$1から
            let select = builder.select_sql();
            assert!(select.contains("LIMIT $1 OFFSET $2"));
            assert!(select.contains("ORDER BY a.created_at DESC"));
            assert_eq!(builder.limit, 10);
            assert_eq!(builder.offset, 0);
        }

        #[test]
        fn test_text_filter_uses_single_parameter() {
            let req = GetArticlesRequest {
                query: "rust".to_string(),
                ..Default::default()
            };
            let builder = ArticleQueryBuilder::from_request(&req);

            // タイトルと本文の述語は同じプレースホルダを参照する
            let select = builder.select_sql();
            assert!(select.contains("(a.title ILIKE $1 OR a.body ILIKE $1)"));
            assert!(select.contains("LIMIT $2 OFFSET $3"));
            assert_eq!(builder.params().to_vec(), vec!["%rust%".to_string()]);

            // 件数取得クエリも同じWHERE句とバインド値を共有する
            let count = builder.count_sql();
            assert!(count.contains("(a.title ILIKE $1 OR a.body ILIKE $1)"));
            assert!(!count.contains("LIMIT"));
        }

        #[test]
        fn test_author_filter() {
            let req = GetArticlesRequest {
                author_name: "alice".to_string(),
                ..Default::default()
            };
            let builder = ArticleQueryBuilder::from_request(&req);

            assert!(builder.select_sql().contains("au.name ILIKE $1"));
            assert_eq!(builder.params().to_vec(), vec!["%alice%".to_string()]);
        }

        #[test]
        fn test_combined_filters_are_anded_in_order() {
            let req = GetArticlesRequest {
                query: "rust".to_string(),
                author_name: "alice".to_string(),
                page: 3,
                limit: 20,
            };
            let builder = ArticleQueryBuilder::from_request(&req);

            // プレースホルダ番号は条件の追加順
            let select = builder.select_sql();
            assert!(select
                .contains("(a.title ILIKE $1 OR a.body ILIKE $1) AND au.name ILIKE $2"));
            assert!(select.contains("LIMIT $3 OFFSET $4"));
            assert_eq!(
                builder.params().to_vec(),
                vec!["%rust%".to_string(), "%alice%".to_string()]
            );
            // offset = (page - 1) * limit
            assert_eq!(builder.limit, 20);
            assert_eq!(builder.offset, 40);
        }
    }

    // データ永続化・DB操作系テスト（PostgreSQLが必要）
    mod storage {
        use super::*;

        #[sqlx::test]
        async fn test_create_article(pool: PgPool) -> Result<(), anyhow::Error> {
            sqlx::query("INSERT INTO authors (id, name) VALUES ($1, $2)")
                .bind("author-1")
                .bind("Alice Cooper")
                .execute(&pool)
                .await?;

            let repo = PgArticleRepository::new(pool.clone());
            let new_article = NewArticle {
                id: "article-new".to_string(),
                author_id: "author-1".to_string(),
                title: "Hello".to_string(),
                body: "World".to_string(),
            };
            let created_at = repo.create(&new_article).await?;
            assert!(created_at <= Utc::now(), "作成日時はストアが割り当てるべき");

            // JOINで著者名が付与されて取得できる
            let (articles, total) = repo.get_list(&GetArticlesRequest::default()).await?;
            assert_eq!(total, 1);
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].id, "article-new");
            assert_eq!(articles[0].author_id, "author-1");
            assert_eq!(articles[0].author_name.as_deref(), Some("Alice Cooper"));
            assert_eq!(articles[0].created_at, created_at);

            println!("✅ 記事作成テスト成功");
            Ok(())
        }

        #[sqlx::test]
        async fn test_create_duplicate_id(pool: PgPool) -> Result<(), anyhow::Error> {
            sqlx::query("INSERT INTO authors (id, name) VALUES ($1, $2)")
                .bind("author-1")
                .bind("Alice Cooper")
                .execute(&pool)
                .await?;

            let repo = PgArticleRepository::new(pool.clone());
            let new_article = NewArticle {
                id: "article-dup".to_string(),
                author_id: "author-1".to_string(),
                title: "Original".to_string(),
                body: "本文".to_string(),
            };
            repo.create(&new_article).await?;

            // 主キー制約違反はStoreErrorとして返る
            let result = repo.create(&new_article).await;
            assert!(result.is_err(), "重複IDの挿入はエラーになるべき");

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_without_filters(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);
            let (articles, total) = repo.get_list(&GetArticlesRequest::default()).await?;

            assert_eq!(total, 3);
            // 作成日時の降順
            let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["article-3", "article-2", "article-1"]);

            println!("✅ 全件取得テスト成功: {}件", total);
            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_text_filter(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            // 大文字小文字を無視してタイトルに一致
            let req = GetArticlesRequest {
                query: "HELLO".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 2);
            let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["article-2", "article-1"]);

            // 本文にも一致する
            let req = GetArticlesRequest {
                query: "offset".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 1);
            assert_eq!(articles[0].id, "article-3");

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_author_filter(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            let req = GetArticlesRequest {
                author_name: "ALI".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 2, "Aliceの記事のみが一致するべき");
            assert!(articles
                .iter()
                .all(|a| a.author_name.as_deref() == Some("Alice Cooper")));

            let req = GetArticlesRequest {
                author_name: "bob".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 1);
            assert_eq!(articles[0].id, "article-2");

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_combined_filters(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            // テキスト条件と著者条件はANDで結合される
            let req = GetArticlesRequest {
                query: "hello".to_string(),
                author_name: "ali".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 1);
            assert_eq!(articles[0].id, "article-1");

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_no_match(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            let req = GetArticlesRequest {
                query: "存在しない検索語".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;

            // 0件一致はエラーではない
            assert_eq!(total, 0);
            assert!(articles.is_empty());

            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_basic.sql"))]
        async fn test_get_list_metacharacters(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            // SQLのメタ文字はバインド値として扱われ、クエリ文字列には混入しない
            let req = GetArticlesRequest {
                query: "'; DROP TABLE articles; --".to_string(),
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 0);
            assert!(articles.is_empty());

            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
                .fetch_one(&repo.pool)
                .await?;
            assert_eq!(count, 3, "テーブルは無傷であるべき");

            println!("✅ メタ文字の安全性テスト成功");
            Ok(())
        }

        #[sqlx::test(fixtures("../../../fixtures/articles_pagination.sql"))]
        async fn test_get_list_pagination(pool: PgPool) -> Result<(), anyhow::Error> {
            let repo = PgArticleRepository::new(pool);

            // 1ページ目は新しい順に5件
            let req = GetArticlesRequest {
                page: 1,
                limit: 5,
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 12);
            let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(
                ids,
                vec![
                    "article-p-12",
                    "article-p-11",
                    "article-p-10",
                    "article-p-09",
                    "article-p-08"
                ]
            );

            // 最終ページは端数のみ
            let req = GetArticlesRequest {
                page: 3,
                limit: 5,
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 12);
            let ids: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
            assert_eq!(ids, vec!["article-p-02", "article-p-01"]);

            // 範囲外のページは空（totalは変わらない）
            let req = GetArticlesRequest {
                page: 4,
                limit: 5,
                ..Default::default()
            };
            let (articles, total) = repo.get_list(&req).await?;
            assert_eq!(total, 12);
            assert!(articles.is_empty());

            println!("✅ ページングテスト成功");
            Ok(())
        }
    }
}
