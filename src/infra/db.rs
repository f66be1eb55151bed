use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::types::{StoreError, StoreResult};

/// 接続プールの最大接続数（オープン・アイドル共通の上限）
const MAX_CONNECTIONS: u32 = 25;
/// 接続の最大生存時間。これを超えた接続は使い回さずに作り直す。
const CONNECTION_MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// データベース接続プールを作成
pub async fn create_pool(database_url: &str) -> StoreResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .max_lifetime(CONNECTION_MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(StoreError::connection)
}

/// データベースの初期化（マイグレーション実行）
pub async fn initialize_database(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::query("データベースマイグレーション実行", e.into()))
}

/// プールの作成とデータベース初期化を一括で行う便利関数
pub async fn setup_database(database_url: &str) -> StoreResult<PgPool> {
    let pool = create_pool(database_url).await?;
    initialize_database(&pool).await?;
    Ok(pool)
}
