use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use intranet_chat::{FileStorage, LocalFile, ServiceError, UploadProgress};
use intranet_types::api::StoredFile;

use crate::rest::{check, transport, with_trailing_slash};

const CHUNK_SIZE: usize = 256 * 1024; // 256 KB

/// Uploads files to the storage service as a streamed request body so
/// progress advances while bytes go out.
///
/// `POST /files?message_id=..&file_name=..` stores the file and associates
/// it with the message; the response is a [`StoredFile`].
#[derive(Clone)]
pub struct HttpFileStorage {
    http: Client,
    base: Url,
}

impl HttpFileStorage {
    pub fn new(http: Client, base: Url) -> Self {
        Self {
            http,
            base: with_trailing_slash(base),
        }
    }
}

#[async_trait]
impl FileStorage for HttpFileStorage {
    async fn upload_file(
        &self,
        file: &LocalFile,
        message_id: Uuid,
        access_token: &str,
        progress: Arc<UploadProgress>,
    ) -> Result<StoredFile, ServiceError> {
        let url = self
            .base
            .join("files")
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        let size = file.size();

        debug!(
            message_id = %message_id,
            file_name = %file.name,
            size,
            "Uploading file"
        );

        let body = reqwest::Body::wrap_stream(chunked(file.data.clone(), progress));
        let resp = self
            .http
            .post(url)
            .query(&[
                ("message_id", message_id.to_string()),
                ("file_name", file.name.clone()),
            ])
            .bearer_auth(access_token)
            .header("Content-Type", file.mime_type.as_str())
            .header("Content-Length", size.to_string())
            .body(body)
            .send()
            .await
            .map_err(transport)?;

        check(resp)
            .await?
            .json::<StoredFile>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// Split `data` into request body chunks, advancing `progress` as each one
/// is handed to the transport.
fn chunked(
    data: Bytes,
    progress: Arc<UploadProgress>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    futures_util::stream::unfold((data, progress), |(mut rest, progress)| async move {
        if rest.is_empty() {
            return None;
        }
        let chunk = rest.split_to(rest.len().min(CHUNK_SIZE));
        progress.advance(chunk.len() as u64);
        Some((Ok(chunk), (rest, progress)))
    })
}
