pub mod model;
pub mod repository;
pub mod service;

// 公開APIの再エクスポート

// model.rsから
pub use model::{
    Article, Author, CreateArticleRequest, GetArticlesRequest, GetArticlesResponse, NewArticle,
    DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT,
};

// repository.rsから
pub use repository::{ArticleRepository, InMemoryArticleRepository, PgArticleRepository};

// service.rsから
pub use service::ArticleService;
