//! JSON-over-HTTP POST abstraction.
//!
//! The remote backend talks to its peer exclusively through [`Poster`],
//! so tests can swap the real HTTP client for an in-process handler.

use crate::{StorageError, StorageResult};

/// Issues a JSON POST and returns the raw response body.
pub trait Poster: Send + Sync {
    /// Posts `body` to `url`.
    ///
    /// # Errors
    ///
    /// Transport failures; protocol-level errors ride inside the
    /// response body.
    fn post(&self, url: &str, body: &[u8]) -> StorageResult<Vec<u8>>;
}

/// The production [`Poster`] backed by a blocking `reqwest` client.
#[derive(Debug)]
pub struct HttpPoster {
    client: reqwest::blocking::Client,
}

impl HttpPoster {
    /// Creates a poster with a default client.
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::blocking::Client::new() }
    }
}

impl Default for HttpPoster {
    fn default() -> Self {
        Self::new()
    }
}

impl Poster for HttpPoster {
    fn post(&self, url: &str, body: &[u8]) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        let bytes = response
            .bytes()
            .map_err(|e| StorageError::Remote(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
