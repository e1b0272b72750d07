//! Static file responder.
//!
//! Serves `GET` requests from one or more base directories, first match
//! wins. Requests for files that do not exist are declined so the next
//! responder in the chain can answer.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use futures_util::FutureExt;

use crate::http::{Request, Respond, Responder, Response, StatusCode};

/// Content types by lowercase file extension.
const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("map", "application/json"),
    ("txt", "text/plain; charset=utf-8"),
    ("md", "text/markdown; charset=utf-8"),
    ("xml", "application/xml"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("wasm", "application/wasm"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
];

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Look up the content type for `path` by its extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FALLBACK_CONTENT_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, content_type)| *content_type)
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Split a request path into the segments that are safe to join onto a
/// base directory.
fn safe_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|segment| !matches!(*segment, "" | "." | ".."))
        .collect()
}

/// Entity tag derived from modification time and size.
fn entity_tag(mtime_secs: u64, size: u64) -> String {
    format!("\"{:x}T-{:x}0\"", mtime_secs, size)
}

#[derive(Debug, Clone)]
pub struct FileServer {
    base_paths: Vec<PathBuf>,
    index: Option<String>,
}

impl FileServer {
    /// Serve from `paths`; relative paths resolve against the working
    /// directory.
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self {
            base_paths: paths.into_iter().map(|p| cwd.join(p)).collect(),
            index: None,
        }
    }

    /// Serve `index` for requests to `/`.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn base_paths(&self) -> &[PathBuf] {
        &self.base_paths
    }

    /// First existing regular file for `request_path` across base paths.
    async fn locate(&self, request_path: &str) -> Option<(PathBuf, std::fs::Metadata)> {
        let segments = safe_segments(request_path);
        if segments.is_empty() {
            return None;
        }
        for base in &self.base_paths {
            let candidate = segments.iter().fold(base.clone(), |path, s| path.join(s));
            if let Ok(metadata) = tokio::fs::metadata(&candidate).await {
                if metadata.is_file() {
                    return Some((candidate, metadata));
                }
            }
        }
        None
    }

    async fn serve(&self, request: Request) -> Option<Response> {
        if request.verb() != "GET" {
            return None;
        }

        let request_path = match (&self.index, request.path_info()) {
            (Some(index), "/") => index.as_str(),
            (_, path) => path,
        };
        let (full_path, metadata) = self.locate(request_path).await?;

        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        let mtime_secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let etag = entity_tag(mtime_secs, metadata.len());

        if let Some(not_modified) = not_modified(&request, &etag, mtime_secs) {
            tracing::debug!(path = %full_path.display(), "Not modified");
            return Some(not_modified);
        }

        let contents = match tokio::fs::read(&full_path).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!(path = %full_path.display(), error = %e, "File unreadable");
                return None;
            }
        };

        let mut response = Response::new();
        response.add_standard_headers();
        response.set_header("last-modified", httpdate::fmt_http_date(modified));
        response.set_header("etag", etag);
        response.set_header("cache-control", "public, must-revalidate, max-age=0");
        response.set_header("content-type", content_type_for(&full_path));
        response.set_body(contents);
        Some(response)
    }
}

/// A 304 when the client's cached copy is still current.
///
/// A matching `if-none-match` wins; otherwise `if-modified-since` must be
/// at or after the file's modification time.
fn not_modified(request: &Request, etag: &str, mtime_secs: u64) -> Option<Response> {
    let if_none_match = request.header("if-none-match");
    let if_modified_since = request.header("if-modified-since");

    let fresh = if if_none_match == Some(etag) {
        true
    } else {
        if_modified_since
            .and_then(|since| httpdate::parse_http_date(since).ok())
            .and_then(|since| since.duration_since(UNIX_EPOCH).ok())
            .is_some_and(|since| mtime_secs <= since.as_secs())
    };

    fresh.then(|| {
        let mut response = Response::new().with_status(StatusCode::NOT_MODIFIED);
        response.add_standard_headers();
        response
    })
}

impl Responder for FileServer {
    fn respond(&self, request: Request) -> Respond {
        let server = self.clone();
        async move { Ok(server.serve(request).await) }.boxed()
    }
}
