use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

use crate::config::Config;

pub async fn init_db(config: &Config) -> anyhow::Result<MySqlPool> {
    // DATETIME columns hold UTC; NOW() must agree with them
    let options = MySqlConnectOptions::from_str(&config.database_url)
        .context("Invalid DATABASE_URL")?
        .timezone(Some(String::from("+00:00")));

    MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .context("Failed to connect to database")
}
