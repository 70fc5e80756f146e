//! Document resolution and download.
//!
//! Markit items already carry a direct file URL and pass straight through.
//! ASX trigger links (`displayAnnouncement.do`) answer with a terms-and-
//! conditions page first: the real PDF URL sits in a hidden `pdfURL` input,
//! and the "Agree and proceed" form must be posted so the session cookie is
//! set before the PDF is served.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::ItemError;
use crate::types::Announcement;

pub const ASX_BASE_URL: &str = "https://www.asx.com.au";
pub const TERMS_ACTION: &str = "/asx/v2/statistics/announcementTerms.do";
const TRIGGER_MARKER: &str = "displayAnnouncement.do";
const AGREE_BUTTON: &str = "Agree and proceed";

static PDF_URL_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"name="pdfURL"\s+value="(.*?)""#).expect("valid pdfURL regex"));

/// Turns an announcement's document reference into PDF bytes.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Resolve `ann.document_url` (rewriting it to the direct URL) and download it.
    async fn fetch_document(&self, ann: &mut Announcement) -> Result<Vec<u8>, ItemError>;
}

/// HTTP-backed resolver. The client should keep a cookie store.
#[derive(Debug, Clone)]
pub struct DocumentResolver {
    client: Client,
    base_url: String,
}

impl DocumentResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: ASX_BASE_URL.to_string(),
        }
    }

    /// Root the terms form is posted to (tests point this at a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Direct document URL for `doc_ref`, bypassing the T&C page when present.
    pub async fn resolve(&self, doc_ref: &str) -> Result<String, ItemError> {
        if !doc_ref.contains(TRIGGER_MARKER) {
            return Ok(doc_ref.to_string());
        }

        let resp = self
            .client
            .get(doc_ref)
            .send()
            .await
            .map_err(|source| ItemError::Http {
                url: doc_ref.to_string(),
                source,
            })?;
        let body = resp.bytes().await.map_err(|source| ItemError::Http {
            url: doc_ref.to_string(),
            source,
        })?;

        if body.starts_with(b"%PDF") {
            return Ok(doc_ref.to_string());
        }

        let page = String::from_utf8_lossy(&body);
        if !page.contains(TERMS_ACTION) {
            return Err(ItemError::DocumentNotFound {
                url: doc_ref.to_string(),
            });
        }

        let direct = extract_pdf_url(&page).ok_or_else(|| ItemError::ConsentFormMissingUrl {
            url: doc_ref.to_string(),
        })?;

        let terms_url = format!("{}{TERMS_ACTION}", self.base_url);
        let form = [
            ("pdfURL", direct.as_str()),
            ("showAnnouncementPDFForm", AGREE_BUTTON),
        ];
        if let Err(e) = self.client.post(&terms_url).form(&form).send().await {
            warn!(error = %e, url = %terms_url, "T&C POST submission failed");
        }

        let direct = if direct.starts_with('/') {
            format!("{}{direct}", self.base_url)
        } else {
            direct
        };
        debug!(trigger = %doc_ref, direct = %direct, "bypassed T&C page");
        Ok(direct)
    }

    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ItemError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ItemError::Http {
                url: url.to_string(),
                source,
            })?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ItemError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await.map_err(|source| ItemError::Http {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DocumentSource for DocumentResolver {
    async fn fetch_document(&self, ann: &mut Announcement) -> Result<Vec<u8>, ItemError> {
        let direct = self.resolve(&ann.document_url).await?;
        ann.document_url = direct;
        self.download(&ann.document_url).await
    }
}

/// Value of the hidden `pdfURL` input, HTML entities decoded.
pub fn extract_pdf_url(page: &str) -> Option<String> {
    PDF_URL_FIELD
        .captures(page)
        .and_then(|c| c.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
        .filter(|u| !u.is_empty())
}
