//! URL fetch effect: a plain GET with a character budget on the body.

use strata_core::ActionError;
use tracing::debug;

use crate::text::{Utf8Decoder, head_chars};

/// GET `url` and return at most `max_chars` characters of its body.
///
/// Only `http`/`https` are accepted. A non-2xx status is an error carrying
/// the status, never a panic or a silently empty body.
pub async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    max_chars: usize,
) -> Result<String, ActionError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ActionError::Fetch(format!("Invalid URL '{url}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ActionError::Fetch(format!(
            "Unsupported URL scheme '{}'; only http and https are allowed",
            parsed.scheme()
        )));
    }

    debug!(url, "Fetching URL");
    let response = client
        .get(parsed)
        .send()
        .await
        .map_err(|e| ActionError::Fetch(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ActionError::Fetch(format!("Status {}", status.as_u16())));
    }

    read_budgeted(response, max_chars).await
}

/// Pull body chunks until `max_chars` characters are in hand. The rest of
/// the body is never downloaded.
async fn read_budgeted(
    mut response: reqwest::Response,
    max_chars: usize,
) -> Result<String, ActionError> {
    let mut decoder = Utf8Decoder::new();
    let mut body = String::new();
    let mut chars = 0;
    while chars < max_chars {
        let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ActionError::Fetch(e.to_string()))?
        else {
            body.push_str(&decoder.finish());
            break;
        };
        let text = decoder.push(&chunk);
        chars += text.chars().count();
        body.push_str(&text);
    }
    Ok(head_chars(&body, max_chars).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn body_is_truncated_to_budget() {
        let url = serve_once("200 OK", "abcdefghij").await;
        let text = fetch_text(&reqwest::Client::new(), &url, 4).await.unwrap();
        assert_eq!(text, "abcd");
    }

    #[tokio::test]
    async fn multibyte_body_is_cut_on_characters() {
        let url = serve_once("200 OK", "héllo wörld").await;
        let text = fetch_text(&reqwest::Client::new(), &url, 7).await.unwrap();
        assert_eq!(text, "héllo w");
    }

    #[tokio::test]
    async fn reading_stops_once_the_budget_is_met() {
        // Announces a huge body, sends a little, then stalls: only a reader
        // that stops early can return.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 10000000\r\n\r\n";
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&[b'x'; 256]).await;
            let _ = socket.flush().await;
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        });

        let text = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            fetch_text(&reqwest::Client::new(), &format!("http://{addr}/"), 16),
        )
        .await
        .expect("fetch should not wait for the whole body")
        .unwrap();
        assert_eq!(text, "x".repeat(16));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let url = serve_once("404 Not Found", "missing").await;
        let err = fetch_text(&reqwest::Client::new(), &url, 100).await.unwrap_err();
        assert_eq!(err.to_string(), "Fetch failed: Status 404");
    }

    #[tokio::test]
    async fn non_http_schemes_are_rejected() {
        let err = fetch_text(&reqwest::Client::new(), "file:///etc/passwd", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Fetch(_)));
    }
}
