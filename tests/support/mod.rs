//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bilancio_chat::AppState;
use bilancio_chat::config::{AppConfig, LlmConfig, LoggingConfig, ServerConfig, SessionsConfig};
use bilancio_chat::document::PdfLoader;
use bilancio_chat::llm::{ApiError, EventStream, LlmDriver, LlmProtocol, LlmRequest};
use bilancio_chat::normalized::NormalizedEvent;
use bilancio_chat::session::SessionStore;
use bilancio_chat::streamer::ResponseStreamer;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// Build a PDF with one line of text per page.
pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    let pages: Vec<_> = pages.iter().copied().map(Some).collect();
    pdf_with_pages(&pages)
}

/// Like [`sample_pdf`], but `None` makes a page whose content stream is missing.
pub fn pdf_with_pages(pages: &[Option<&str>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut kids = Vec::new();
    for page in pages {
        let Some(text) = page else {
            let missing: ObjectId = (9_999, 0);
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => missing,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
            continue;
        };
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Replays a fixed script and records every request it receives.
#[derive(Debug)]
pub struct ScriptedDriver {
    script: Vec<Result<NormalizedEvent, ApiError>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedDriver {
    pub fn new(script: Vec<Result<NormalizedEvent, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Text fragments followed by a completion marker.
    pub fn replying(parts: &[&str]) -> Arc<Self> {
        let mut script: Vec<_> = parts
            .iter()
            .map(|p| {
                Ok(NormalizedEvent::MessageDelta {
                    text: (*p).to_string(),
                })
            })
            .collect();
        script.push(Ok(NormalizedEvent::Done));
        Self::new(script)
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        self.requests.lock().unwrap().push(req);
        let events: Vec<anyhow::Result<NormalizedEvent>> = self
            .script
            .iter()
            .cloned()
            .map(|e| e.map_err(anyhow::Error::from))
            .collect();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            max_upload_bytes: 1024 * 1024,
        },
        llm: LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            protocol: LlmProtocol::Messages,
            max_tokens: 256,
        },
        sessions: SessionsConfig {
            idle_timeout_secs: 60,
            sweep_interval_secs: 60,
        },
        logging: LoggingConfig { json: false },
    }
}

/// Application state wired to `driver` instead of a real model service.
pub fn test_state(driver: Arc<ScriptedDriver>) -> AppState {
    let config = test_config();
    let max_tokens = config.llm.max_tokens;
    AppState {
        config: Arc::new(config),
        sessions: SessionStore::new(),
        loader: Arc::new(PdfLoader::new()),
        streamer: Arc::new(ResponseStreamer::new(driver, max_tokens)),
    }
}

pub const BOUNDARY: &str = "----bilancio-test-boundary";

/// One multipart part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
}

/// Encode `parts` as a `multipart/form-data` body delimited by [`BOUNDARY`].
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// `(event, data)` pairs of an SSE body.
pub fn parse_sse(body: &str) -> Vec<(String, serde_json::Value)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = String::new();
            for line in frame.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data.push_str(v.trim_start());
                }
            }
            let event = event?;
            let data = serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
            Some((event, data))
        })
        .collect()
}
