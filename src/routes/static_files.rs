use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWrite;

use crate::config::StaticFilesConfig;
use crate::http::mime;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;

/// URL prefix for files under the static root.
pub const ASSETS_PREFIX: &str = "/assets/";

/// Serves files from a directory on disk.
pub struct StaticFiles {
    root: PathBuf,
    video: PathBuf,
}

impl StaticFiles {
    pub fn new(cfg: &StaticFilesConfig) -> Self {
        Self {
            root: cfg.root.clone(),
            video: cfg.video.clone(),
        }
    }

    /// Resolves `name` under the root. Absolute paths and `..` segments are
    /// refused.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        if name.is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub async fn serve_video<W>(&self, writer: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let path = self.root.join(&self.video);

        match tokio::fs::read(&path).await {
            Ok(data) => {
                file_response(&path, data).send(writer).await?;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read video");
                ResponseBuilder::new(StatusCode::INTERNAL_SERVER_ERROR)
                    .body("Video not found")
                    .build()
                    .send(writer)
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn serve_asset<W>(&self, name: &str, writer: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let Some(path) = self.resolve(name) else {
            Response::not_found().send(writer).await?;
            return Ok(());
        };

        match tokio::fs::read(&path).await {
            Ok(data) => file_response(&path, data).send(writer).await?,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Asset not readable");
                Response::not_found().send(writer).await?;
            }
        }
        Ok(())
    }
}

fn file_response(path: &Path, data: Vec<u8>) -> Response {
    ResponseBuilder::new(StatusCode::OK)
        .header("Content-Type", mime::content_type_for(path))
        .body(data)
        .build()
}
