use crate::models::SubmissionReceipt;
use redis::AsyncCommands;

const KEY_PREFIX: &str = "porter:submit:";

pub async fn redis_get(client: &redis::Client, key: &str) -> Option<SubmissionReceipt> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return None,
    };
    let s: Option<String> = conn.get(format!("{KEY_PREFIX}{key}")).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

pub async fn redis_set(
    client: &redis::Client,
    key: &str,
    value: &SubmissionReceipt,
    ttl_secs: usize,
) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn
            .set_ex(format!("{KEY_PREFIX}{key}"), json, ttl_secs as u64)
            .await;
    }
}
