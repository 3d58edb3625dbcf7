//! services/api/src/adapters/ingestion.rs
//!
//! This module contains the adapter for content ingestion: pulling text out
//! of uploaded files and transcripts out of links. It implements the
//! `IngestionService` port from the `core` crate.
//!
//! The contract matters more than the extraction quality here: every call
//! returns within its timeout, a malformed or unsupported URL yields a
//! failure variant instead of a panic, and when every transcript strategy
//! fails for a YouTube link a synthetic placeholder is returned with a
//! warning so analysis can proceed with degraded input.

use std::time::Duration;

use async_trait::async_trait;
use autopen_core::links::youtube_video_id;
use autopen_core::ports::{IngestError, IngestionService, TranscriptFetch};
use regex::Regex;
use tracing::warn;

/// File extensions the text extractor accepts.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "csv"];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `IngestionService` over plain HTTP.
#[derive(Clone)]
pub struct HttpIngestionAdapter {
    http: reqwest::Client,
    tag_stripper: Regex,
    caption_line: Regex,
}

impl HttpIngestionAdapter {
    /// Creates a new `HttpIngestionAdapter`. `request_timeout` bounds each
    /// outbound request; the hub's fetch timeout bounds the whole attempt.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent("autopen/0.1")
            .build()?;
        Ok(Self {
            http,
            // Both patterns are fixed and known-good.
            tag_stripper: Regex::new(r"(?s)<[^>]*>").expect("static regex"),
            caption_line: Regex::new(r#"(?s)<text[^>]*>(.*?)</text>"#).expect("static regex"),
        })
    }

    /// First strategy: the public timedtext captions endpoint.
    async fn youtube_timedtext(&self, video_id: &str) -> Result<String, IngestError> {
        let url =
            format!("https://video.google.com/timedtext?lang=en&v={video_id}");
        let body = self.fetch_text(&url).await?;
        let lines: Vec<String> = self
            .caption_line
            .captures_iter(&body)
            .map(|c| decode_entities(c[1].trim()))
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(IngestError::Unavailable(
                "No English captions available".to_string(),
            ));
        }
        Ok(lines.join(" "))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, IngestError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::TimedOut
                } else {
                    IngestError::Unavailable(e.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(IngestError::Unavailable(format!(
                "Request to {url} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| IngestError::Unavailable(e.to_string()))
    }

    fn strip_html(&self, html: &str) -> String {
        let text = self.tag_stripper.replace_all(html, " ");
        decode_entities(&text)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

//=========================================================================================
// `IngestionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IngestionService for HttpIngestionAdapter {
    async fn extract_file_text(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, IngestError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        if !TEXT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(IngestError::Unsupported(format!(
                "No text extractor for '.{extension}' files"
            )));
        }
        String::from_utf8(bytes.to_vec())
            .map_err(|_| IngestError::Unsupported(format!("{file_name} is not valid UTF-8")))
    }

    async fn extract_link_transcript(&self, url: &str) -> Result<TranscriptFetch, IngestError> {
        if let Some(video_id) = youtube_video_id(url) {
            match self.youtube_timedtext(&video_id).await {
                Ok(text) => {
                    return Ok(TranscriptFetch {
                        text,
                        warning: None,
                    })
                }
                Err(e) => {
                    warn!(video_id, error = %e, "caption extraction failed; using placeholder");
                    // Placeholder so the analysis can still reference the
                    // video, flagged for the user.
                    return Ok(TranscriptFetch {
                        text: format!(
                            "No transcript could be extracted for YouTube video {video_id}; \
                             treat this video as supporting material on the same subject."
                        ),
                        warning: Some(format!("Transcript unavailable: {e}")),
                    });
                }
            }
        }

        // A malformed URL is a failure variant, never a panic.
        if reqwest::Url::parse(url).is_err() {
            return Err(IngestError::Unsupported(format!("'{url}' is not a valid URL")));
        }

        let body = self.fetch_text(url).await?;
        let text = self.strip_html(&body);
        if text.is_empty() {
            return Err(IngestError::Unavailable(
                "Page contained no extractable text".to_string(),
            ));
        }
        Ok(TranscriptFetch {
            text,
            warning: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn adapter() -> HttpIngestionAdapter {
        HttpIngestionAdapter::new(Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn text_files_are_extracted() {
        let text = adapter()
            .extract_file_text("notes.txt", b"plain notes")
            .await
            .unwrap();
        assert_eq!(text, "plain notes");
    }

    #[tokio::test]
    async fn unknown_extensions_are_unsupported() {
        let result = adapter().extract_file_text("photo.png", &[0x89, 0x50]).await;
        assert_matches!(result, Err(IngestError::Unsupported(_)));
    }

    #[tokio::test]
    async fn malformed_urls_fail_without_panicking() {
        let result = adapter().extract_link_transcript("not a url at all").await;
        assert_matches!(result, Err(IngestError::Unsupported(_)));
    }

    #[test]
    fn html_stripping_collapses_whitespace() {
        let stripped = adapter().strip_html("<p>Hello&nbsp;<b>world</b></p>\n<p>again</p>");
        assert!(stripped.contains("Hello"));
        assert!(stripped.contains("world"));
        assert!(!stripped.contains('<'));
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("a &amp; b &#39;c&#39;"), "a & b 'c'");
    }
}
