use crate::{Error, Result};
use reqwest::header::{HeaderMap, ACCEPT_RANGES, CONTENT_LENGTH};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::{debug, instrument};

/// What the remote server told us about the resource
///
/// Sampled once before a transfer and trusted for its whole duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Total length in bytes, `None` when the server didn't report it
    pub length: Option<u64>,
    /// Whether the server honours `Range: bytes=...` requests
    pub accepts_ranges: bool,
}

impl Capability {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        let length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let accepts_ranges = headers
            .get_all(ACCEPT_RANGES)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|unit| unit.trim().eq_ignore_ascii_case("bytes"));
        Self {
            length,
            accepts_ranges,
        }
    }
}

/// Ask the server for the length of `url` and whether it accepts ranges
///
/// Uses a `HEAD` request, falling back to a `GET` whose body is never read
/// when the server doesn't allow `HEAD`.
#[instrument(skip(client, url), fields(URL = %url))]
pub async fn probe(client: &Client, url: &Url) -> Result<Capability> {
    let to_err = |source| Error::ProbeFailed {
        url: url.to_string(),
        source,
    };
    let mut resp = client.head(url.clone()).send().await.map_err(to_err)?;
    debug!("Response code: {}", resp.status());
    if resp.status() == StatusCode::METHOD_NOT_ALLOWED {
        debug!("HEAD not allowed, probing with GET");
        resp = client.get(url.clone()).send().await.map_err(to_err)?;
        debug!("Response code: {}", resp.status());
    }
    let resp: Response = resp.error_for_status().map_err(to_err)?;
    debug!("Received probe response: {:?}", resp.headers());
    let capability = Capability::from_headers(resp.headers());
    debug!(
        "Length: {:?}, ranges: {}",
        capability.length, capability.accepts_ranges
    );
    Ok(capability)
}
