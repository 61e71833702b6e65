use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_PLACEHOLDER: &str = "FUZZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("placeholder token is empty")]
    EmptyPlaceholder,

    #[error("URL template '{url}' does not contain the placeholder '{placeholder}'")]
    MissingPlaceholder { url: String, placeholder: String },

    #[error("URL template '{url}' must start with http:// or https://")]
    InvalidScheme { url: String },

    #[error("URL template '{url}' is not a valid URL: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid HTTP method '{method}'")]
    InvalidMethod { method: String },

    #[error("invalid header '{header}', expected 'Key: Value'")]
    InvalidHeader { header: String },
}

/// Concrete request for one candidate. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub ordinal: usize,
    pub candidate: String,
    pub url: String,
    pub method: reqwest::Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

/// A validated request template. The placeholder is guaranteed to appear in
/// the URL; header values and the body are substituted too when they carry it.
#[derive(Clone, Debug)]
pub struct RequestTemplate {
    url: String,
    placeholder: String,
    method: reqwest::Method,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl RequestTemplate {
    pub fn new(url: &str, placeholder: &str) -> Result<Self, TemplateError> {
        let url = url.trim();
        if placeholder.is_empty() {
            return Err(TemplateError::EmptyPlaceholder);
        }
        if !url.contains(placeholder) {
            return Err(TemplateError::MissingPlaceholder {
                url: url.to_string(),
                placeholder: placeholder.to_string(),
            });
        }
        let lower = url.to_ascii_lowercase();
        if !lower.starts_with("http://") && !lower.starts_with("https://") {
            return Err(TemplateError::InvalidScheme {
                url: url.to_string(),
            });
        }
        // probe with a harmless word so host-position placeholders still parse
        let probe = url.replace(placeholder, "probe");
        reqwest::Url::parse(&probe).map_err(|e| TemplateError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            url: url.to_string(),
            placeholder: placeholder.to_string(),
            method: reqwest::Method::GET,
            headers: Vec::new(),
            body: None,
        })
    }

    pub fn with_method(mut self, method: &str) -> Result<Self, TemplateError> {
        let canonical = method.trim().to_ascii_uppercase();
        self.method = reqwest::Method::from_bytes(canonical.as_bytes()).map_err(|_| {
            TemplateError::InvalidMethod {
                method: method.to_string(),
            }
        })?;
        Ok(self)
    }

    /// Adds a raw `Key: Value` header line.
    pub fn with_header(mut self, raw: &str) -> Result<Self, TemplateError> {
        let invalid = || TemplateError::InvalidHeader {
            header: raw.to_string(),
        };
        let (key, value) = raw.split_once(':').ok_or_else(invalid)?;
        let key = key.trim();
        if key.is_empty() || reqwest::header::HeaderName::from_str(key).is_err() {
            return Err(invalid());
        }
        self.headers.push((key.to_string(), value.trim().to_string()));
        Ok(self)
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn method(&self) -> &reqwest::Method {
        &self.method
    }

    /// Number of placeholder occurrences across URL, header values and body.
    pub fn injection_points(&self) -> usize {
        let in_headers: usize = self
            .headers
            .iter()
            .map(|(_, v)| v.matches(self.placeholder.as_str()).count())
            .sum();
        let in_body = self
            .body
            .as_deref()
            .map(|b| b.matches(self.placeholder.as_str()).count())
            .unwrap_or(0);
        self.url.matches(self.placeholder.as_str()).count() + in_headers + in_body
    }

    pub fn build(&self, candidate: &str, ordinal: usize) -> RequestDescriptor {
        let substitute = |s: &str| s.replace(self.placeholder.as_str(), candidate);
        RequestDescriptor {
            ordinal,
            candidate: candidate.to_string(),
            url: substitute(&self.url),
            method: self.method.clone(),
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v)))
                .collect(),
            body: self.body.as_deref().map(|b| substitute(b).into_bytes()),
        }
    }
}
