//! Webhook delivery
//!
//! Builds the rich-embed payload for a parsed result and posts it together
//! with the screenshot as `multipart/form-data`. One request per upload, no
//! retries.

use reqwest::blocking::{multipart, Client};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{embed, upload};
use crate::parser::ParsedResult;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("failed to build webhook request: {0}")]
    Build(#[source] reqwest::Error),
    #[error("webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// JSON document sent in the `payload_json` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub image: EmbedImage,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedImage {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

impl WebhookPayload {
    /// Single embed whose image points at the attachment called `attachment_name`
    pub fn for_result(result: &ParsedResult, attachment_name: &str) -> Self {
        Self {
            embeds: vec![Embed {
                title: result.title.clone(),
                color: embed::COLOR,
                image: EmbedImage {
                    url: format!("{}{}", upload::ATTACHMENT_SCHEME, attachment_name),
                },
                fields: vec![
                    EmbedField {
                        name: embed::CLEAR_TYPE_FIELD.to_string(),
                        value: result.clear_type.label().to_string(),
                    },
                    EmbedField {
                        name: embed::RANK_FIELD.to_string(),
                        value: result.rank.clone(),
                    },
                ],
            }],
        }
    }
}

/// Everything needed for one webhook request
#[derive(Debug, Clone)]
pub struct Upload {
    /// `<timestamp>.<ext>`; both the file part name and the embed image reference
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub payload: WebhookPayload,
}

impl Upload {
    pub fn new(result: &ParsedResult, extension: Option<&str>, bytes: Vec<u8>) -> Self {
        let file_name = match extension {
            Some(ext) if !ext.is_empty() => format!("{}.{}", result.timestamp, ext),
            _ => result.timestamp.clone(),
        };
        let payload = WebhookPayload::for_result(result, &file_name);
        Self {
            file_name,
            bytes,
            payload,
        }
    }

    pub fn payload_json(&self) -> Result<String, WebhookError> {
        Ok(serde_json::to_string(&self.payload)?)
    }

    /// MIME type of the file part, from its extension
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("bmp") => "image/bmp",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "application/octet-stream",
        }
    }
}

/// Response summary; only transport failures are errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
}

impl Delivery {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Destination for uploads
pub trait WebhookSink {
    fn deliver(&self, upload: &Upload) -> Result<Delivery, WebhookError>;
}

/// Posts uploads to a webhook URL over HTTP
pub struct HttpWebhook {
    client: Client,
    url: String,
}

impl HttpWebhook {
    /// No timeout is applied unless one is given
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, WebhookError> {
        let client = Client::builder()
            .user_agent(upload::USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(WebhookError::Build)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    fn form(upload: &Upload) -> Result<multipart::Form, WebhookError> {
        let file = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str(upload.mime_type())
            .map_err(WebhookError::Build)?;

        Ok(multipart::Form::new()
            .part(upload::FILE_FIELD, file)
            .text(upload::PAYLOAD_FIELD, upload.payload_json()?))
    }
}

impl WebhookSink for HttpWebhook {
    fn deliver(&self, upload: &Upload) -> Result<Delivery, WebhookError> {
        let form = Self::form(upload)?;

        debug!(file = %upload.file_name, size = upload.bytes.len(), "Posting to webhook");
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .map_err(WebhookError::Transport)?;

        let status = response.status();
        info!(status = %status, file = %upload.file_name, "Webhook responded");

        match response.text() {
            Ok(body) => debug!(body = %body, "Webhook response body"),
            Err(e) => debug!(error = %e, "Failed to read webhook response body"),
        }

        Ok(Delivery {
            status: status.as_u16(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ClearType;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn sample_result() -> ParsedResult {
        ParsedResult {
            title: "Title Here".to_string(),
            rank: "A".to_string(),
            clear_type: ClearType::FullCombo,
            timestamp: "1700000000_123".to_string(),
        }
    }

    #[test]
    fn test_payload_json_shape() {
        let upload = Upload::new(&sample_result(), Some("png"), vec![1, 2, 3]);
        assert_eq!(
            upload.payload_json().unwrap(),
            concat!(
                r#"{"embeds":[{"title":"Title Here","color":65280,"#,
                r#""image":{"url":"attachment://1700000000_123.png"},"#,
                r#""fields":[{"name":":trophy: Clear Type","value":"FULL COMBO"},"#,
                r#"{"name":":military_medal: Rank","value":"A"}]}]}"#
            )
        );
    }

    #[test]
    fn test_attachment_reference_matches_file_name() {
        for ext in [Some("png"), Some("JPG"), Some(""), None] {
            let upload = Upload::new(&sample_result(), ext, Vec::new());
            let url = &upload.payload.embeds[0].image.url;
            assert_eq!(url, &format!("attachment://{}", upload.file_name));
        }
    }

    #[test]
    fn test_file_name_without_extension() {
        let upload = Upload::new(&sample_result(), None, Vec::new());
        assert_eq!(upload.file_name, "1700000000_123");
        assert_eq!(upload.mime_type(), "application/octet-stream");
    }

    #[test]
    fn test_mime_type_from_extension() {
        let mime = |ext: &str| Upload::new(&sample_result(), Some(ext), Vec::new()).mime_type();
        assert_eq!(mime("png"), "image/png");
        assert_eq!(mime("JPEG"), "image/jpeg");
    }

    #[test]
    fn test_delivery_is_success() {
        assert!(Delivery { status: 204 }.is_success());
        assert!(!Delivery { status: 400 }.is_success());
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Read one HTTP request (headers plus body) from the stream
    fn read_request(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(header_end) = find(&buf, b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());
            match length {
                Some(length) if buf.len() >= header_end + 4 + length => break,
                None if buf.ends_with(b"0\r\n\r\n") => break,
                _ => {}
            }
        }
        buf
    }

    /// Accept a single request, answer with `status_line`, hand back the raw request
    fn serve_once(status_line: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let body = r#"{"ok":true}"#;
            write!(
                stream,
                "{status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (format!("http://{addr}/webhook"), handle)
    }

    #[test]
    fn test_http_webhook_posts_multipart() {
        let (url, server) = serve_once("HTTP/1.1 200 OK");
        let webhook = HttpWebhook::new(url, Some(Duration::from_secs(10))).unwrap();
        let upload = Upload::new(&sample_result(), Some("png"), b"PNGDATA".to_vec());

        let delivery = webhook.deliver(&upload).unwrap();
        assert_eq!(delivery, Delivery { status: 200 });

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /webhook HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: multipart/form-data; boundary="));
        assert!(request.contains(r#"name="file"; filename="1700000000_123.png""#));
        assert!(request.to_lowercase().contains("content-type: image/png"));
        assert!(request.contains("PNGDATA"));
        assert!(request.contains(r#"name="payload_json""#));
        assert!(request.contains(r#""url":"attachment://1700000000_123.png""#));
    }

    #[test]
    fn test_http_webhook_error_status_is_not_an_error() {
        let (url, server) = serve_once("HTTP/1.1 400 Bad Request");
        let webhook = HttpWebhook::new(url, Some(Duration::from_secs(10))).unwrap();
        let upload = Upload::new(&sample_result(), Some("png"), b"PNGDATA".to_vec());

        let delivery = webhook.deliver(&upload).unwrap();
        assert_eq!(delivery.status, 400);
        assert!(!delivery.is_success());
        server.join().unwrap();
    }

    #[test]
    fn test_http_webhook_transport_failure() {
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let webhook =
            HttpWebhook::new(format!("http://{addr}/webhook"), Some(Duration::from_secs(5)))
                .unwrap();
        let upload = Upload::new(&sample_result(), Some("png"), b"PNGDATA".to_vec());

        assert!(matches!(webhook.deliver(&upload), Err(WebhookError::Transport(_))));
    }
}
