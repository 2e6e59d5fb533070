use std::time::Duration;

use redis::RedisError;

/// Opens a Redis client and verifies the connection with a PING.
pub async fn connect_redis(addr: &str) -> Result<redis::Client, RedisError> {
    let client = redis::Client::open(addr)?;

    let mut conn = tokio::time::timeout(
        Duration::from_secs(3),
        client.get_multiplexed_async_connection(),
    )
    .await
    .map_err(|_| RedisError::from((redis::ErrorKind::IoError, "redis connect timed out")))??;

    let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
    Ok(client)
}

/// Health probe; any failure reads as "not ok".
pub async fn ping_redis(client: &redis::Client) -> bool {
    let Ok(mut conn) = client.get_multiplexed_async_connection().await else {
        return false;
    };
    let pong: Result<String, RedisError> = redis::cmd("PING").query_async(&mut conn).await;
    pong.is_ok()
}
