use crate::errors::{AppError, AppResult};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::path::{Component, Path, PathBuf};

const NO_CACHE: &str = "no-cache, no-store, must-revalidate";
const MANIFEST_CACHE: &str = "public, max-age=3600, must-revalidate";

#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
            templates_dir: PathBuf::from("templates"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Browser default caching.
    Default,
    /// Always refetch; used for the page shell and the service worker so
    /// clients pick up new releases.
    NoStore,
    Revalidate(&'static str),
}

impl AssetPaths {
    pub fn index(&self) -> PathBuf {
        self.templates_dir.join("index.html")
    }

    pub fn manifest(&self) -> PathBuf {
        self.static_dir.join("manifest.json")
    }

    pub fn service_worker(&self) -> PathBuf {
        self.static_dir.join("sw.js")
    }

    /// Resolves a `/static/...` request path, refusing anything that could
    /// leave the static directory.
    pub fn static_file(&self, requested: &str) -> Option<PathBuf> {
        let relative = Path::new(requested);
        let safe = !requested.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        safe.then(|| self.static_dir.join(relative))
    }
}

pub async fn index_page(paths: &AssetPaths) -> AppResult<Response> {
    serve_file(&paths.index(), Some("text/html; charset=utf-8"), CachePolicy::NoStore).await
}

pub async fn manifest(paths: &AssetPaths) -> AppResult<Response> {
    serve_file(&paths.manifest(), None, CachePolicy::Revalidate(MANIFEST_CACHE)).await
}

pub async fn service_worker(paths: &AssetPaths) -> AppResult<Response> {
    serve_file(&paths.service_worker(), Some("application/javascript"), CachePolicy::NoStore).await
}

pub async fn static_asset(paths: &AssetPaths, requested: &str) -> AppResult<Response> {
    let Some(path) = paths.static_file(requested) else {
        return Err(AppError::NotFound("Not Found".to_string()));
    };
    serve_file(&path, None, CachePolicy::Default).await
}

async fn serve_file(path: &Path, content_type: Option<&'static str>, cache: CachePolicy) -> AppResult<Response> {
    let body = match tokio::fs::read(path).await {
        Ok(body) => body,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "asset not found");
            return Err(AppError::NotFound("Not Found".to_string()));
        }
        Err(error) => return Err(error.into()),
    };

    let content_type = match content_type {
        Some(content_type) => HeaderValue::from_static(content_type),
        None => {
            let guessed = mime_guess::from_path(path).first_or_octet_stream();
            HeaderValue::from_str(guessed.as_ref())
                .map_err(|error| AppError::Internal(error.to_string()))?
        }
    };

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    match cache {
        CachePolicy::Default => {}
        CachePolicy::NoStore => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
        CachePolicy::Revalidate(value) => {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(value));
        }
    }
    Ok(response)
}
