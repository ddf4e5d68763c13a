/*!
 * Request facade.
 *
 * The request and response types consumed by a front end, and `Gateway`, which
 * routes each request through the resolver before dispatching. An unresolvable
 * pair fails before any engine is invoked.
 */

use futures::future::try_join_all;
use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dispatcher::Dispatcher;
use crate::errors::GatewayError;
use crate::registry::{LanguagesList, Registry};
use crate::resolver::{resolve_request, Route};

/// Paragraph elements of an HTML fragment
static PARAGRAPH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<p(\s[^>]*)?>(.*?)</p>").unwrap()
});

/// Any markup tag
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Single translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub src: String,
    pub tgt: String,
    #[serde(default)]
    pub alt: Option<String>,
    pub text: String,
}

/// Batch translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchTranslationRequest {
    pub src: String,
    pub tgt: String,
    #[serde(default)]
    pub alt: Option<String>,
    pub texts: Vec<String>,
}

/// HTML translation request; every `<p>` element is translated
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlTranslationRequest {
    pub src: String,
    pub tgt: String,
    #[serde(default)]
    pub alt: Option<String>,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchTranslationResponse {
    pub translation: Vec<String>,
}

/// Language and model discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguagesResponse {
    pub languages: BTreeMap<String, String>,
    pub models: LanguagesList,
}

/// Entry point for translation requests against one registry
#[derive(Debug, Clone)]
pub struct Gateway {
    dispatcher: Dispatcher,
}

impl Gateway {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            dispatcher: Dispatcher::new(registry),
        }
    }

    pub fn registry(&self) -> &Registry {
        self.dispatcher.registry()
    }

    fn route(&self, src: &str, tgt: &str, alt: Option<&str>) -> Result<Route, GatewayError> {
        let route = resolve_request(self.registry(), src, tgt, alt)?;
        debug!("Routing {}-{} to model {}", route.src, route.tgt, route.model_id);
        Ok(route)
    }

    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse, GatewayError> {
        let route = self.route(&request.src, &request.tgt, request.alt.as_deref())?;
        let translation = self
            .dispatcher
            .translate(&route.model_id, &request.text, &route.src, &route.tgt)
            .await?;
        Ok(TranslationResponse { translation })
    }

    pub async fn translate_batch(&self, request: &BatchTranslationRequest) -> Result<BatchTranslationResponse, GatewayError> {
        let route = self.route(&request.src, &request.tgt, request.alt.as_deref())?;
        let translation = self
            .dispatcher
            .translate_batch(&route.model_id, &request.texts, &route.src, &route.tgt)
            .await?;
        Ok(BatchTranslationResponse { translation })
    }

    /// Translate the text of every paragraph, leaving the rest of the markup as is
    pub async fn translate_html(&self, request: &HtmlTranslationRequest) -> Result<TranslationResponse, GatewayError> {
        let route = self.route(&request.src, &request.tgt, request.alt.as_deref())?;

        let paragraphs: Vec<String> = PARAGRAPH_REGEX
            .captures_iter(&request.html)
            .map(|caps| TAG_REGEX.replace_all(&caps[2], "").trim().to_string())
            .collect();

        let translated = try_join_all(
            paragraphs
                .iter()
                .map(|text| self.dispatcher.translate(&route.model_id, text, &route.src, &route.tgt)),
        )
        .await?;

        let mut translated = translated.into_iter();
        let translation = PARAGRAPH_REGEX
            .replace_all(&request.html, |caps: &Captures| {
                let attributes = caps.get(1).map_or("", |m| m.as_str());
                let text = translated.next().unwrap_or_default();
                format!("<p{}>{}</p>", attributes, escape_text(&text))
            })
            .into_owned();

        Ok(TranslationResponse { translation })
    }

    pub fn languages(&self) -> LanguagesResponse {
        LanguagesResponse {
            languages: self.registry().language_codes().clone(),
            models: self.registry().languages_list().clone(),
        }
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
