use reqwest::Client;
use std::time::Duration;

pub fn build_client() -> Client {
    client_with_timeout(
        env_secs("HTTP_TIMEOUT_SECS", 15),
        env_secs("HTTP_CONNECT_TIMEOUT_SECS", 5),
    )
}

/// Media uploads move whole files; they get a much longer ceiling than the
/// JSON round-trips.
pub fn build_upload_client() -> Client {
    client_with_timeout(
        env_secs("MEDIA_TIMEOUT_SECS", 120),
        env_secs("HTTP_CONNECT_TIMEOUT_SECS", 5),
    )
}

fn client_with_timeout(timeout: u64, connect: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout))
        .connect_timeout(Duration::from_secs(connect))
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn env_secs(var: &str, default: u64) -> u64 {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}
