use thiserror::Error;

/// ストア層のエラー型
/// 接続・クエリ実行・行のデコードなどデータベース起因の失敗を定義
#[derive(Error, Debug)]
pub enum StoreError {
    /// データベース接続エラー
    #[error("データベース接続エラー: {source}")]
    Connection {
        #[source]
        source: sqlx::Error,
    },

    /// データベースクエリエラー
    #[error("データベースクエリエラー: {operation} - {source}")]
    Query {
        operation: String,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    /// データベース接続エラーを作成
    pub fn connection(source: sqlx::Error) -> Self {
        Self::Connection { source }
    }

    /// データベースクエリエラーを作成
    pub fn query<O: Into<String>>(operation: O, source: sqlx::Error) -> Self {
        Self::Query {
            operation: operation.into(),
            source,
        }
    }
}

/// ストアエラーのResult型エイリアス
pub type StoreResult<T> = std::result::Result<T, StoreError>;
