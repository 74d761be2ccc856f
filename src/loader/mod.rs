//! CSV Loader
//!
//! Retrieves the carrier CSV from a local file or an HTTP(S) URL, drains the
//! whole body, decodes it as UTF-8 and parses it into [`RowRecord`]s.
//!
//! A failed fetch is fatal to startup and is never retried. Malformed rows are
//! repaired (missing values become empty strings) and only counted.

mod parse;

pub use parse::{parse_csv, ParseOutcome};

use crate::records::RowRecord;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Where the CSV resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Local file
    Path(PathBuf),
    /// Remote resource fetched over HTTP(S)
    Url(Url),
}

impl Source {
    /// Interpret a location string: `http://` and `https://` are URLs,
    /// everything else is a filesystem path.
    pub fn parse(location: &str) -> Result<Self, LoadError> {
        let trimmed = location.trim();
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|e| LoadError::InvalidSource(format!("{}: {}", trimmed, e)))?;
            Ok(Source::Url(url))
        } else {
            Ok(Source::Path(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Errors that stop the CSV resource from being retrieved
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Invalid source location: {0}")]
    InvalidSource(String),

    #[error("IO error reading {path:?}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("CSV header error: {0}")]
    Header(String),
}

/// Loader for the carrier CSV resource
pub struct CsvLoader {
    client: reqwest::Client,
}

impl CsvLoader {
    /// Create a loader. `timeout` bounds HTTP requests; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Result<Self, LoadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetch and parse the resource into records
    pub async fn load(&self, source: &Source) -> Result<Vec<RowRecord>, LoadError> {
        tracing::info!(source = %source, "Loading CSV resource");

        let bytes = self.fetch(source).await?;
        let text = decode_utf8(&bytes);
        let outcome = parse_csv(&text)?;

        if outcome.repaired_rows > 0 || outcome.skipped_rows > 0 {
            tracing::warn!(
                repaired = outcome.repaired_rows,
                skipped = outcome.skipped_rows,
                "Tolerated malformed CSV rows"
            );
        }
        tracing::info!(records = outcome.records.len(), "CSV resource parsed");

        Ok(outcome.records)
    }

    /// Drain the whole resource body
    async fn fetch(&self, source: &Source) -> Result<Vec<u8>, LoadError> {
        match source {
            Source::Path(path) => tokio::fs::read(path).await.map_err(|error| LoadError::Io {
                path: path.clone(),
                error,
            }),
            Source::Url(url) => {
                let mut response = self.client.get(url.as_str()).send().await?;

                let status = response.status();
                if !status.is_success() {
                    return Err(LoadError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let mut body = Vec::new();
                let mut chunks = 0usize;
                while let Some(chunk) = response.chunk().await? {
                    body.extend_from_slice(&chunk);
                    chunks += 1;
                }
                tracing::debug!(bytes = body.len(), chunks, "Response body drained");

                Ok(body)
            }
        }
    }
}

/// Decode the drained body, replacing invalid sequences and dropping a BOM
fn decode_utf8(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Field;
    use std::io::Write;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const HEADER: &str =
        "created_dt,entity_type,operating_status,legal_name,out_of_service_date,usdot_number\n";

    fn test_loader() -> CsvLoader {
        CsvLoader {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
        }
    }

    /// Accept one connection on 127.0.0.1, read the request head, then write
    /// `parts` one at a time with a short pause between them
    async fn serve_once(parts: Vec<String>) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }

            for part in parts {
                socket.write_all(part.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = socket.shutdown().await;
        });

        Url::parse(&format!("http://{}/carriers.csv", addr)).unwrap()
    }

    fn chunk(data: &str) -> String {
        format!("{:x}\r\n{}\r\n", data.len(), data)
    }

    #[test]
    fn test_source_parse() {
        assert!(matches!(
            Source::parse("https://example.com/data.csv").unwrap(),
            Source::Url(_)
        ));
        assert_eq!(
            Source::parse("./data.csv").unwrap(),
            Source::Path(PathBuf::from("./data.csv"))
        );
        assert!(matches!(
            Source::parse("http://"),
            Err(LoadError::InvalidSource(_))
        ));
    }

    #[test]
    fn test_source_parse_scheme_case() {
        match Source::parse("HTTPS://Example.com/data.csv").unwrap() {
            Source::Url(url) => {
                assert_eq!(url.scheme(), "https");
                assert_eq!(url.host_str(), Some("example.com"));
            }
            other => panic!("expected URL source, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_strips_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice(b"created_dt\n");
        assert_eq!(decode_utf8(&bytes), "created_dt\n");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            "created_dt,entity_type,operating_status,legal_name,out_of_service_date,usdot_number\n\
             2020-01-01,CARRIER,ACTIVE,Acme Inc,2021-03-15,12345\n\
             2020-02-01,CARRIER,ACTIVE,Beta LLC,,67890\n"
        )
        .unwrap();

        let loader = CsvLoader::new(None).unwrap();
        let records = loader.load(&Source::Path(path)).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].value(Field::LegalName), "Beta LLC");
    }

    #[tokio::test]
    async fn test_missing_file_is_fetch_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = CsvLoader::new(None).unwrap();
        let err = loader
            .load(&Source::Path(dir.path().join("absent.csv")))
            .await
            .unwrap_err();

        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn test_load_from_url_drains_chunked_body() {
        let mut csv = String::from(HEADER);
        for i in 0..50 {
            csv.push_str(&format!(
                "2020-01-01,CARRIER,ACTIVE,Carrier {} LLC,2021-{:02}-15,{}\n",
                i,
                1 + i % 12,
                1000 + i
            ));
        }

        // Split at arbitrary byte offsets so rows straddle chunk boundaries
        let bytes = csv.as_bytes();
        let mut parts = vec![String::from(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/csv\r\n\
             Transfer-Encoding: chunked\r\n\
             Connection: close\r\n\r\n",
        )];
        for piece in bytes.chunks(97) {
            parts.push(chunk(std::str::from_utf8(piece).unwrap()));
        }
        parts.push("0\r\n\r\n".to_string());
        assert!(parts.len() > 5);

        let url = serve_once(parts).await;
        let records = test_loader().load(&Source::Url(url)).await.unwrap();

        assert_eq!(records.len(), 50);
        assert_eq!(records[0].value(Field::LegalName), "Carrier 0 LLC");
        assert_eq!(records[49].value(Field::UsdotNumber), "1049");
    }

    #[tokio::test]
    async fn test_load_from_url_not_found() {
        let url = serve_once(vec![String::from(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )])
        .await;

        let err = test_loader().load(&Source::Url(url)).await.unwrap_err();
        assert!(matches!(err, LoadError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_load_from_url_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/carriers.csv", addr)).unwrap();
        let err = test_loader().load(&Source::Url(url)).await.unwrap_err();
        assert!(matches!(err, LoadError::Http(_)));
    }
}
