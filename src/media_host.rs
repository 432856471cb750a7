use crate::draft::media::{MediaKind, SelectedFile};
use crate::http::build_upload_client;
use once_cell::sync::Lazy;
use reqwest::Client;
use serde::Deserialize;
use std::{env, future::Future};
use tracing::{debug, warn};
use uuid::Uuid;

static MEDIA_HOST_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("MEDIA_HOST_URL")
        .ok()
        .map(|url| url.trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty())
});

static MEDIA_HOST_KEY: Lazy<Option<String>> =
    Lazy::new(|| env::var("MEDIA_HOST_KEY").ok().filter(|key| !key.is_empty()));

/// The media-hosting collaborator: one file in, one remote URL out. Failure
/// is a `None`, never an error; the pipeline absorbs it as a per-file,
/// non-fatal event. There is no batching contract; callers fan out.
pub trait MediaHost: Send + Sync + 'static {
    fn upload(
        &self,
        file: SelectedFile,
        kind: MediaKind,
    ) -> impl Future<Output = Option<String>> + Send;
}

#[derive(Debug, Clone)]
pub struct MediaHostClient {
    endpoint: Option<String>,
    api_key: Option<String>,
    http: Client,
}

impl MediaHostClient {
    pub fn from_env() -> Self {
        Self {
            endpoint: MEDIA_HOST_URL.clone(),
            api_key: MEDIA_HOST_KEY.clone(),
            http: build_upload_client(),
        }
    }

    /// Offline mode mints a plausible hosted URL so the rest of the
    /// pipeline behaves identically without a configured host.
    fn demo_url(file_name: &str) -> String {
        format!(
            "https://media.porter.local/{}/{}",
            Uuid::new_v4().simple(),
            urlencoding::encode(file_name)
        )
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl MediaHost for MediaHostClient {
    fn upload(
        &self,
        file: SelectedFile,
        kind: MediaKind,
    ) -> impl Future<Output = Option<String>> + Send {
        async move {
            let SelectedFile {
                file_name,
                content_type,
                bytes,
            } = file;
            let Some(endpoint) = self.endpoint.as_deref() else {
                debug!(
                    target = "porter.media",
                    file = %file_name,
                    "no media host configured; minting demo url"
                );
                return Some(Self::demo_url(&file_name));
            };

            let url = format!("{endpoint}/v1/media?kind={kind}");
            let mut request = self
                .http
                .post(url)
                .header("Content-Type", content_type)
                .header("X-File-Name", urlencoding::encode(&file_name).into_owned())
                .body(bytes);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!(target = "porter.media", file = %file_name, error = %err, "upload request failed");
                    return None;
                }
            };
            if !response.status().is_success() {
                warn!(
                    target = "porter.media",
                    file = %file_name,
                    status = %response.status(),
                    "media host rejected upload"
                );
                return None;
            }
            match response.json::<UploadResponse>().await {
                Ok(payload) if !payload.url.trim().is_empty() => Some(payload.url),
                Ok(_) => None,
                Err(err) => {
                    warn!(target = "porter.media", file = %file_name, error = %err, "unreadable upload response");
                    None
                }
            }
        }
    }
}
