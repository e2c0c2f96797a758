//! Endpoint resolution
//!
//! Every URL the client talks to derives from one API base URL. Channel URLs
//! swap the scheme (`http` -> `ws`, `https` -> `wss`) and keep the base path.

use super::ApiError;
use url::Url;

#[derive(Debug, Clone)]
pub struct Endpoints {
    api_base: Url,
    live_path: String,
    terminal_path: String,
}

impl Endpoints {
    pub fn new(api_url: &str, live_path: &str, terminal_path: &str) -> Result<Self, ApiError> {
        let api_base =
            Url::parse(api_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", api_url, e)))?;
        match api_base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ApiError::InvalidUrl(format!(
                    "unsupported scheme '{}' in {}",
                    other, api_url
                )));
            }
        }
        Ok(Self {
            api_base,
            live_path: live_path.to_string(),
            terminal_path: terminal_path.to_string(),
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// HTTP URL for a path relative to the API base
    pub fn http(&self, path: &str) -> Result<Url, ApiError> {
        join(&self.api_base, path)
    }

    /// HTTP URL for `path` followed by `segments`, each escaped as a single
    /// path segment
    pub fn http_with(&self, path: &str, segments: &[&str]) -> Result<Url, ApiError> {
        push_segments(join(&self.api_base, path)?, segments)
    }

    /// URL of the shared live channel
    pub fn live(&self) -> Result<Url, ApiError> {
        join(&self.ws_base()?, &self.live_path)
    }

    /// URL of the dedicated terminal channel for one cluster
    pub fn terminal(&self, cluster_id: &str) -> Result<Url, ApiError> {
        push_segments(join(&self.ws_base()?, &self.terminal_path)?, &[cluster_id])
    }

    fn ws_base(&self) -> Result<Url, ApiError> {
        let scheme = match self.api_base.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        let mut base = self.api_base.clone();
        base.set_scheme(scheme)
            .map_err(|_| ApiError::InvalidUrl(format!("cannot derive {} URL", scheme)))?;
        Ok(base)
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", joined, e)))
}

fn push_segments(mut url: Url, segments: &[&str]) -> Result<Url, ApiError> {
    url.path_segments_mut()
        .map_err(|_| ApiError::InvalidUrl("URL cannot take path segments".to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
