use std::env;
use thiserror::Error;

/// リッスンポートのデフォルト値
const DEFAULT_PORT: u16 = 8080;
/// データベース接続文字列のデフォルト値
const DEFAULT_DATABASE_URL: &str = "postgres://user:password@db:5432/articledb?sslmode=disable";

/// 設定関連のエラー型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 設定値が不正
    #[error("設定値が不正です: {name} = {value}")]
    InvalidValue { name: String, value: String },
}

impl ConfigError {
    /// 不正な設定値エラーを作成
    pub fn invalid_value<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self::InvalidValue {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// アプリケーション設定
/// 環境変数から読み込み、未設定の場合は固定のデフォルト値を使用する
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
}

impl AppConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match read_env("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid_value("PORT", value.as_str()))?,
            None => DEFAULT_PORT,
        };
        let database_url =
            read_env("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self { port, database_url })
    }
}

// 空文字列の環境変数は未設定として扱う
fn read_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
