use std::path::PathBuf;

use crate::{Result, ScrubError};

/// Returns true for URLs that must be fetched over HTTP.
pub fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn local_path(url: &str) -> PathBuf {
    PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
}

/// Reads the raw bytes behind `url`.
///
/// `http(s)://` URLs are fetched with a single GET; anything else is treated
/// as a local path, with or without a `file://` prefix. Failures are not
/// retried.
pub async fn fetch(url: &str) -> Result<Vec<u8>> {
    if !is_remote(url) {
        return Ok(tokio::fs::read(local_path(url)).await?);
    }

    let fetch_error = |source| ScrubError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = reqwest::get(url).await.map_err(fetch_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrubError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(fetch_error)?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Write;

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    use super::*;

    /// Serves a single HTTP response on a loopback port and returns the base
    /// URL to request it from.
    pub(crate) async fn serve_once(status: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut chunk).await.unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..read]);
            }

            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{addr}")
    }

    #[test]
    fn classifies_urls() {
        assert!(is_remote("https://example.com/a.mp3"));
        assert!(is_remote("http://localhost:8080/a.wav"));
        assert!(!is_remote("file:///tmp/a.wav"));
        assert!(!is_remote("/miami/audio/a.mp3"));
        assert_eq!(local_path("file:///tmp/a.wav"), PathBuf::from("/tmp/a.wav"));
    }

    #[tokio::test]
    async fn reads_local_files_with_and_without_scheme() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        assert_eq!(fetch(&path).await.unwrap(), b"payload");
        assert_eq!(fetch(&format!("file://{path}")).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.mp3");
        let err = fetch(missing.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, ScrubError::Io(_)));
    }

    #[tokio::test]
    async fn fetches_body_over_http() {
        let base = serve_once("200 OK", b"remote payload".to_vec()).await;
        let bytes = fetch(&format!("{base}/audio/intro.mp3")).await.unwrap();
        assert_eq!(bytes, b"remote payload");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let base = serve_once("404 Not Found", b"gone".to_vec()).await;
        let url = format!("{base}/audio/missing.mp3");

        let err = fetch(&url).await.unwrap_err();
        match err {
            ScrubError::HttpStatus { url: failed, status } => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            }
            other => panic!("expected an http status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_a_fetch_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetch(&format!("http://{addr}/a.wav")).await.unwrap_err();
        assert!(matches!(err, ScrubError::Fetch { .. }));
    }
}
