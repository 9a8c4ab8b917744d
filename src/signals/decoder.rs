//! Extraction of a signal payload from loosely framed producer requests.
//!
//! Trading terminals cannot be trusted to label their request bodies, so the
//! decoder tries every plausible reading in a fixed order and takes the first
//! one that yields a non-empty payload.

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::form_urlencoded;

const SIGNAL_FIELD: &str = "signal";
const SIGNAL_ASSIGNMENT: &str = "signal=";
const PREVIEW_CHARS: usize = 200;

/// Everything the decoder may look at for one submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundSignal {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub query: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
    pub body: String,
}

impl InboundSignal {
    /// Build from raw transport pieces. Unless the body is declared multipart,
    /// it is form-decoded as well, whatever the declared content type says.
    pub fn from_parts(
        content_type: Option<&str>,
        content_length: Option<u64>,
        query: Option<&str>,
        body: &[u8],
    ) -> Self {
        let mut inbound = Self {
            content_type: content_type.map(str::to_string),
            content_length,
            query: query.map(|q| parse_pairs(q.as_bytes())).unwrap_or_default(),
            form: Vec::new(),
            body: String::from_utf8_lossy(body).into_owned(),
        };
        if !inbound.is_multipart() {
            inbound.form = parse_pairs(body);
        }
        inbound
    }

    /// Like [`InboundSignal::from_parts`], but a `multipart/form-data` body
    /// also has its text parts read into `form`.
    pub async fn from_body(
        content_type: Option<&str>,
        content_length: Option<u64>,
        query: Option<&str>,
        body: Bytes,
    ) -> Self {
        let mut inbound = Self::from_parts(content_type, content_length, query, &body);
        if let Some(content_type) = content_type.filter(|_| inbound.is_multipart()) {
            inbound.form = multipart_fields(content_type, body).await;
        }
        inbound
    }

    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            content_length: Some(body.len() as u64),
            form: parse_pairs(body.as_bytes()),
            body,
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        if self.is_multipart() {
            self.form.clear();
        }
        self
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = parse_pairs(query.as_bytes());
        self
    }

    fn mime(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
    }

    /// `application/json` or any `+json` structured suffix.
    pub fn is_json(&self) -> bool {
        self.mime()
            .is_some_and(|mime| mime == "application/json" || mime.ends_with("+json"))
    }

    /// Multipart bodies are only ever read through their parts, never as raw text.
    pub fn is_multipart(&self) -> bool {
        self.mime().is_some_and(|mime| mime == "multipart/form-data")
    }

    fn diagnostics(&self) -> DecodeDiagnostics {
        DecodeDiagnostics {
            content_type: self.content_type.clone(),
            content_length: self.content_length,
            has_form: !self.form.is_empty(),
            form_keys: self.form.iter().map(|(k, _)| k.clone()).collect(),
            has_args: !self.query.is_empty(),
            args_keys: self.query.iter().map(|(k, _)| k.clone()).collect(),
            raw_data_length: self.body.chars().count(),
            raw_data_preview: self.body.chars().take(PREVIEW_CHARS).collect(),
        }
    }
}

fn parse_pairs(input: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(input).into_owned().collect()
}

/// Named text parts of a multipart body. File uploads are skipped, and a
/// malformed body yields whatever parts were read before the error.
async fn multipart_fields(content_type: &str, body: Bytes) -> Vec<(String, String)> {
    let request = match Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
    {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Unusable multipart content type");
            return Vec::new();
        }
    };
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            debug!(error = %e, "Multipart body rejected");
            return Vec::new();
        }
    };

    let mut fields = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, parts = fields.len(), "Malformed multipart body");
                break;
            }
        };
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.text().await {
            Ok(value) => fields.push((name, value)),
            Err(e) => {
                debug!(error = %e, field = %name, "Unreadable multipart part");
                break;
            }
        }
    }
    fields
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn first_field(pairs: &[(String, String)]) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| k == SIGNAL_FIELD)
        .and_then(|(_, v)| non_empty(v.clone()))
}

/// One reading of a submission, tried in [`DecodeStrategy::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStrategy {
    JsonBody,
    FormField,
    QueryParam,
    RawAssignment,
    PlainText,
}

impl DecodeStrategy {
    pub const ORDER: [DecodeStrategy; 5] = [
        DecodeStrategy::JsonBody,
        DecodeStrategy::FormField,
        DecodeStrategy::QueryParam,
        DecodeStrategy::RawAssignment,
        DecodeStrategy::PlainText,
    ];

    pub fn extract(self, inbound: &InboundSignal) -> Option<String> {
        match self {
            DecodeStrategy::JsonBody => json_body(inbound),
            DecodeStrategy::FormField => first_field(&inbound.form),
            DecodeStrategy::QueryParam => first_field(&inbound.query),
            DecodeStrategy::RawAssignment | DecodeStrategy::PlainText
                if inbound.is_multipart() =>
            {
                None
            }
            DecodeStrategy::RawAssignment => raw_assignment(&inbound.body),
            DecodeStrategy::PlainText => plain_text(&inbound.body),
        }
    }
}

fn json_body(inbound: &InboundSignal) -> Option<String> {
    if !inbound.is_json() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&inbound.body).ok()?;
    value
        .get(SIGNAL_FIELD)
        .and_then(|v| v.as_str())
        .and_then(|s| non_empty(s.to_string()))
}

/// `...signal=<value>&...` located anywhere in the body, cut at the next `&`
/// and plus/percent decoded.
fn raw_assignment(body: &str) -> Option<String> {
    let start = body.find(SIGNAL_ASSIGNMENT)?;
    let segment = body[start..].split('&').next()?;
    let (_, value) = form_urlencoded::parse(segment.as_bytes()).next()?;
    non_empty(value.into_owned())
}

/// A body carrying a `signal=` assignment is never plain text, even when the
/// assigned value is empty.
fn plain_text(body: &str) -> Option<String> {
    if body.contains(SIGNAL_ASSIGNMENT) {
        return None;
    }
    non_empty(body.trim().to_string())
}

/// What the decoder saw when it could not find a signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeDiagnostics {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub has_form: bool,
    pub form_keys: Vec<String>,
    pub has_args: bool,
    pub args_keys: Vec<String>,
    pub raw_data_length: usize,
    pub raw_data_preview: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("No signal provided")]
pub struct DecodeFailure {
    pub diagnostics: DecodeDiagnostics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSignal {
    pub payload: String,
    pub strategy: DecodeStrategy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignalDecoder;

impl SignalDecoder {
    pub fn decode(&self, inbound: &InboundSignal) -> Result<DecodedSignal, DecodeFailure> {
        for strategy in DecodeStrategy::ORDER {
            if let Some(payload) = strategy.extract(inbound) {
                debug!(strategy = ?strategy, len = payload.len(), "Signal decoded");
                return Ok(DecodedSignal { payload, strategy });
            }
        }

        let diagnostics = inbound.diagnostics();
        warn!(
            content_type = ?diagnostics.content_type,
            content_length = ?diagnostics.content_length,
            form_keys = ?diagnostics.form_keys,
            args_keys = ?diagnostics.args_keys,
            raw_data_length = diagnostics.raw_data_length,
            "Failed to extract signal from request"
        );
        Err(DecodeFailure { diagnostics })
    }
}
