use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde_json::Value;

use crate::textutil::truncate_chars;

use super::ProviderError;

const ERROR_BODY_MAX_CHARS: usize = 500;

#[derive(Clone, Copy, Debug)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_attempts: usize,
    pub backoff: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Blocking JSON client shared by every provider.
#[derive(Clone, Debug)]
pub struct JsonClient {
    client: Client,
    settings: HttpSettings,
}

impl JsonClient {
    pub fn new(settings: HttpSettings) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    /// POSTs `body` and decodes the JSON reply, retrying transient failures
    /// with linear backoff. `query` pairs are URL-encoded and never appear in
    /// returned errors.
    pub fn post_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.post_once(url, query, headers, body) {
                Ok(v) => return Ok(v),
                Err(err) if attempt < attempts && err.is_retryable() => {
                    std::thread::sleep(self.settings.backoff * attempt as u32);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn post_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let mut req = self
            .client
            .post(url)
            .query(query)
            .header(USER_AGENT, "thread-translations/0.1 (+reqwest)")
            .json(body);
        for (name, value) in headers {
            req = req.header(*name, value.as_str());
        }
        let resp = req.send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: redact_query(url).to_string(),
                body: truncate_chars(&text, ERROR_BODY_MAX_CHARS).to_string(),
            });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Drops the query string, which may carry an API key.
pub fn redact_query(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Minimal HTTP/1.1 server for exercising the client without the network.
#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    /// Answers one connection per canned `(status, body)` pair, in order, and
    /// returns the request heads it saw.
    pub(crate) fn serve(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let handle = std::thread::spawn(move || {
            let mut heads = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                heads.push(read_request(&mut stream));
                let reply = format!(
                    "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(reply.as_bytes()).expect("write reply");
            }
            heads
        });
        (base, handle)
    }

    /// A base URL nothing listens on.
    pub(crate) fn refused_base() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        format!("http://{addr}")
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).into_owned();
                let body_len = head
                    .lines()
                    .filter_map(|l| l.split_once(':'))
                    .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                while buf.len() < end + 4 + body_len {
                    let n = stream.read(&mut chunk).expect("read body");
                    if n == 0 {
                        break;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }
                return head;
            }
            let n = stream.read(&mut chunk).expect("read head");
            if n == 0 {
                return String::from_utf8_lossy(&buf).into_owned();
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::test_server::serve;
    use super::*;

    fn client(max_attempts: usize) -> JsonClient {
        JsonClient::new(HttpSettings {
            timeout: Duration::from_secs(10),
            max_attempts,
            backoff: Duration::ZERO,
        })
        .expect("client")
    }

    #[test]
    fn retries_server_errors_then_succeeds() {
        let (base, server) = serve(vec![
            (500, r#"{"error": "overloaded"}"#.to_string()),
            (200, r#"{"ok": true}"#.to_string()),
        ]);
        let value = client(3)
            .post_json(&join_url(&base, "v1/x"), &[], &[], &json!({"a": 1}))
            .expect("second attempt succeeds");
        assert_eq!(value["ok"], true);
        let heads = server.join().expect("server");
        assert_eq!(heads.len(), 2);
        assert!(heads[0].starts_with("POST /v1/x HTTP/1.1"));
    }

    #[test]
    fn gives_up_after_max_attempts_on_rate_limit() {
        let (base, server) = serve(vec![(429, "{}".to_string()); 3]);
        let err = client(3)
            .post_json(&base, &[], &[], &json!({}))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
        assert_eq!(server.join().expect("server").len(), 3);
    }

    #[test]
    fn client_errors_fail_at_once_with_truncated_body() {
        let (base, server) = serve(vec![(400, "x".repeat(ERROR_BODY_MAX_CHARS + 100))]);
        let err = client(3)
            .post_json(&base, &[("key", "k".to_string())], &[], &json!({}))
            .unwrap_err();
        match err {
            ProviderError::Status { status, url, body } => {
                assert_eq!(status, 400);
                assert_eq!(url, base);
                assert_eq!(body.chars().count(), ERROR_BODY_MAX_CHARS);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(server.join().expect("server").len(), 1);
    }

    #[test]
    fn urls_join_and_redact() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(redact_query("https://g.test/m:generate?key=secret"), "https://g.test/m:generate");
        assert_eq!(redact_query("https://g.test/plain"), "https://g.test/plain");
    }
}
