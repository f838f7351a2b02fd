//! Example routes served by the `wirehttp` binary.
//!
//! | Path               | Response                                      |
//! |--------------------|-----------------------------------------------|
//! | `/`                | plain-text greeting                           |
//! | `/video`           | the configured video file                     |
//! | `/assets/<name>`   | a file from the static root                   |
//! | `<prefix>/...`     | relayed from the upstream, chunked + trailers |
//! | anything else      | `404 Not Found`                               |

pub mod static_files;

use tokio::io::AsyncWrite;

use crate::config::Config;
use crate::http::connection::Handler;
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};
use crate::http::writer::ResponseWriter;
use crate::proxy::ProxyHandler;

use static_files::StaticFiles;

pub const GREETING: &str = "Welcome to wirehttp\n";

pub struct Router {
    static_files: StaticFiles,
    proxy: ProxyHandler,
}

impl Router {
    pub fn new(static_files: StaticFiles, proxy: ProxyHandler) -> Self {
        Self {
            static_files,
            proxy,
        }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            StaticFiles::new(&cfg.static_files),
            ProxyHandler::from_config(&cfg.proxy)?,
        ))
    }
}

impl Handler for Router {
    async fn handle<W>(&self, request: &Request, writer: &mut ResponseWriter<W>) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let path = request.target().split('?').next().unwrap_or_default();

        match path {
            "/" => {
                ResponseBuilder::new(StatusCode::OK)
                    .body(GREETING)
                    .build()
                    .send(writer)
                    .await?;
            }
            "/video" => self.static_files.serve_video(writer).await?,
            _ if path.starts_with(static_files::ASSETS_PREFIX) => {
                let name = &path[static_files::ASSETS_PREFIX.len()..];
                self.static_files.serve_asset(name, writer).await?;
            }
            _ if self.proxy.matches(path) => self.proxy.forward(request, writer).await?,
            _ => Response::not_found().send(writer).await?,
        }

        Ok(())
    }
}
