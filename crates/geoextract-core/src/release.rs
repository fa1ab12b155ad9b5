//! Dataset release selection.
//!
//! The release is taken from, in order: an explicit value (flag or the
//! `OVERTURE_VERSION` environment variable), the newest release marker found
//! on the release notes page, and finally [`LAST_KNOWN_RELEASE`]. A failed
//! lookup is logged and never fails the run.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, info, warn};
use regex::Regex;
use thiserror::Error;

/// Release used when nothing else is available.
pub const LAST_KNOWN_RELEASE: &str = "2024-08-20.0";

/// Environment variable overriding the release.
pub const RELEASE_ENV_VAR: &str = "OVERTURE_VERSION";

/// Public bucket holding one directory per release.
pub const DEFAULT_RELEASE_ROOT: &str = "s3://overturemaps-us-west-2/release";

/// Page listing published releases.
pub const DEFAULT_RELEASES_PAGE: &str = "https://docs.overturemaps.org/release/latest/";

static RELEASE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{4}-\d{2}-\d{2}\.\d+\b").expect("release marker pattern is valid")
});

/// Where the selected release came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseSource {
    Explicit,
    Latest,
    Fallback,
}

impl fmt::Display for ReleaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseSource::Explicit => write!(f, "explicit"),
            ReleaseSource::Latest => write!(f, "latest"),
            ReleaseSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    pub release: String,
    pub source: ReleaseSource,
}

/// How to look up the latest release, if at all.
#[derive(Debug, Clone)]
pub enum ReleaseLookup {
    Skip,
    Fetch { page: String, timeout: Duration },
}

impl Default for ReleaseLookup {
    fn default() -> Self {
        ReleaseLookup::Fetch {
            page: DEFAULT_RELEASES_PAGE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReleaseLookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no release marker found on {page}")]
    NoMarker { page: String },
}

/// Newest release marker (`YYYY-MM-DD.N`) in `text`.
///
/// ```
/// use geoextract_core::release::find_release_marker;
///
/// let page = "<li>2024-07-22.0</li><li>2024-09-18.0</li><li>2024-08-20.0</li>";
/// assert_eq!(find_release_marker(page).as_deref(), Some("2024-09-18.0"));
/// assert_eq!(find_release_marker("no releases here"), None);
/// ```
#[must_use]
pub fn find_release_marker(text: &str) -> Option<String> {
    RELEASE_MARKER
        .find_iter(text)
        .map(|m| m.as_str())
        .max_by(|a, b| compare_releases(a, b))
        .map(str::to_string)
}

// Dates compare lexically; the numeric suffix does not.
fn compare_releases(a: &str, b: &str) -> std::cmp::Ordering {
    let split = |s: &str| {
        let (date, seq) = s.split_once('.').unwrap_or((s, "0"));
        (date.to_string(), seq.parse::<u32>().unwrap_or(0))
    };
    split(a).cmp(&split(b))
}

/// Fetch `page` and return the newest release marker on it.
///
/// # Errors
///
/// Returns [`ReleaseLookupError`] when the page cannot be fetched or holds no
/// marker.
pub async fn fetch_latest_release(
    page: &str,
    timeout: Duration,
) -> Result<String, ReleaseLookupError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("geoextract/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()?;
    let body = client
        .get(page)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!("Fetched {} bytes from {page}", body.len());

    find_release_marker(&body).ok_or_else(|| ReleaseLookupError::NoMarker {
        page: page.to_string(),
    })
}

/// Pick the release for this run. Never fails.
pub async fn resolve_release(explicit: Option<&str>, lookup: &ReleaseLookup) -> ResolvedRelease {
    if let Some(release) = explicit.map(str::trim).filter(|r| !r.is_empty()) {
        info!("Using release {release}");
        return ResolvedRelease {
            release: release.to_string(),
            source: ReleaseSource::Explicit,
        };
    }

    if let ReleaseLookup::Fetch { page, timeout } = lookup {
        match fetch_latest_release(page, *timeout).await {
            Ok(release) => {
                info!("Latest release is {release}");
                return ResolvedRelease {
                    release,
                    source: ReleaseSource::Latest,
                };
            },
            Err(e) => {
                warn!("Could not determine the latest release ({e}); using {LAST_KNOWN_RELEASE}");
            },
        }
    }

    ResolvedRelease {
        release: LAST_KNOWN_RELEASE.to_string(),
        source: ReleaseSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on an ephemeral port.
    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/release/latest/")
    }

    #[test]
    fn test_release_marker_pattern_compiles() {
        let pattern = LazyLock::force(&RELEASE_MARKER);
        assert!(pattern.is_match("2024-08-20.0"));
        assert!(!pattern.is_match("2024-08-20"));
    }

    #[test]
    fn test_marker_ordering_uses_numeric_suffix() {
        let text = "2024-09-18.2 2024-09-18.10 2024-09-17.99";
        assert_eq!(find_release_marker(text).as_deref(), Some("2024-09-18.10"));
    }

    #[tokio::test]
    async fn test_explicit_release_wins() {
        let resolved = resolve_release(Some("2024-06-13-beta.1"), &ReleaseLookup::Skip).await;
        assert_eq!(resolved.release, "2024-06-13-beta.1");
        assert_eq!(resolved.source, ReleaseSource::Explicit);
    }

    #[tokio::test]
    async fn test_skip_lookup_uses_fallback() {
        let resolved = resolve_release(Some("  "), &ReleaseLookup::Skip).await;
        assert_eq!(resolved.release, LAST_KNOWN_RELEASE);
        assert_eq!(resolved.source, ReleaseSource::Fallback);
    }

    #[tokio::test]
    async fn test_latest_release_from_page() {
        let page = serve_once("<h1>Release 2024-10-23.0</h1><p>previous: 2024-09-18.0</p>").await;
        let lookup = ReleaseLookup::Fetch {
            page,
            timeout: Duration::from_secs(5),
        };
        let resolved = resolve_release(None, &lookup).await;
        assert_eq!(resolved.release, "2024-10-23.0");
        assert_eq!(resolved.source, ReleaseSource::Latest);
    }

    #[tokio::test]
    async fn test_page_without_marker_falls_back() {
        let page = serve_once("<html>maintenance</html>").await;
        let lookup = ReleaseLookup::Fetch {
            page,
            timeout: Duration::from_secs(5),
        };
        let resolved = resolve_release(None, &lookup).await;
        assert_eq!(resolved.source, ReleaseSource::Fallback);
    }

    #[tokio::test]
    async fn test_unreachable_page_falls_back() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let lookup = ReleaseLookup::Fetch {
            page: format!("http://{addr}/"),
            timeout: Duration::from_secs(2),
        };
        let resolved = resolve_release(None, &lookup).await;
        assert_eq!(resolved.release, LAST_KNOWN_RELEASE);
        assert_eq!(resolved.source, ReleaseSource::Fallback);
    }
}
