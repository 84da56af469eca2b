//! Offers: single content items inside a proposition.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const SCHEMA_HTML: &str = "content-component-html";
const SCHEMA_JSON: &str = "content-component-json";
const SCHEMA_TEXT: &str = "content-component-text";
const SCHEMA_IMAGE: &str = "content-component-imagelink";
const SCHEMA_DEFAULT_CONTENT: &str = "default-content-item";

const FORMAT_JSON: &str = "application/json";
const FORMAT_TEXT: &str = "text/plain";
const FORMAT_HTML: &str = "text/html";
const FORMAT_IMAGE_PREFIX: &str = "image/";

/// Content type of an offer, inferred from its schema and data format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OfferType {
    Html,
    Json,
    Text,
    Image,
    Unknown,
}

impl OfferType {
    /// Infer the offer type.
    ///
    /// Schema suffixes take precedence over the data format; the
    /// default-content schema is always `Unknown`.
    pub fn infer(schema: Option<&str>, format: Option<&str>) -> Self {
        let schema = schema.unwrap_or_default();
        let format = format.unwrap_or_default();

        if schema.ends_with(SCHEMA_HTML) {
            Self::Html
        } else if schema.ends_with(SCHEMA_JSON) || format == FORMAT_JSON {
            Self::Json
        } else if schema.ends_with(SCHEMA_TEXT) || format == FORMAT_TEXT {
            Self::Text
        } else if schema.ends_with(SCHEMA_DEFAULT_CONTENT) {
            Self::Unknown
        } else if format == FORMAT_HTML {
            Self::Html
        } else if schema.ends_with(SCHEMA_IMAGE) || format.starts_with(FORMAT_IMAGE_PREFIX) {
            Self::Image
        } else {
            Self::Unknown
        }
    }

    /// The data format written back into event data for this type.
    pub fn format(&self) -> Option<&'static str> {
        match self {
            Self::Html => Some(FORMAT_HTML),
            Self::Json => Some(FORMAT_JSON),
            Self::Text => Some(FORMAT_TEXT),
            Self::Image => Some("image/*"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "HTML"),
            Self::Json => write!(f, "JSON"),
            Self::Text => write!(f, "TEXT"),
            Self::Image => write!(f, "IMAGE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A single content item of a proposition.
///
/// Offers hold the id of their owning proposition rather than the proposition
/// itself. The id is assigned when the proposition is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    id: String,
    etag: Option<String>,
    score: f64,
    schema: String,
    offer_type: OfferType,
    content: String,
    characteristics: Option<BTreeMap<String, String>>,
    language: Option<Vec<String>>,
    proposition_id: String,
}

impl Offer {
    /// Start building an offer with its required fields.
    pub fn builder(
        id: impl Into<String>,
        offer_type: OfferType,
        content: impl Into<String>,
    ) -> OfferBuilder {
        OfferBuilder {
            offer: Self {
                id: id.into(),
                etag: None,
                score: 0.0,
                schema: String::new(),
                offer_type,
                content: content.into(),
                characteristics: None,
                language: None,
                proposition_id: String::new(),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn offer_type(&self) -> OfferType {
        self.offer_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn characteristics(&self) -> Option<&BTreeMap<String, String>> {
        self.characteristics.as_ref()
    }

    pub fn language(&self) -> Option<&[String]> {
        self.language.as_deref()
    }

    /// Id of the proposition this offer belongs to.
    pub fn proposition_id(&self) -> &str {
        &self.proposition_id
    }

    pub(crate) fn attach_to(&mut self, proposition_id: &str) {
        self.proposition_id = proposition_id.to_string();
    }

    /// Parse one `items` entry of a proposition payload.
    ///
    /// Returns `None` for entries that are not offers: a missing id, a missing
    /// schema (click-tracking metric items carry none), or a missing `data`
    /// block on anything but default content.
    pub(crate) fn from_event_data(item: &Value, proposition_id: &str) -> Option<Self> {
        let payload: ItemPayload = serde_json::from_value(item.clone()).ok()?;
        let id = payload.id.filter(|id| !id.is_empty())?;
        let schema = payload.schema.filter(|schema| !schema.is_empty())?;

        if schema.ends_with(SCHEMA_DEFAULT_CONTENT) {
            return Some(Self {
                id,
                etag: payload.etag,
                score: payload.score.unwrap_or_default(),
                schema,
                offer_type: OfferType::Unknown,
                content: String::new(),
                characteristics: None,
                language: None,
                proposition_id: proposition_id.to_string(),
            });
        }

        let data = payload.data?;
        let offer_type = OfferType::infer(Some(&schema), data.format.as_deref());
        let content = data
            .content
            .or(data.content_object)
            .map(content_to_string)
            .unwrap_or_default();

        Some(Self {
            id,
            etag: payload.etag,
            score: payload.score.unwrap_or_default(),
            schema,
            offer_type,
            content,
            characteristics: data.characteristics.map(stringify_values),
            language: data.language,
            proposition_id: proposition_id.to_string(),
        })
    }

    /// Event-data form of this offer, as found in a proposition's `items`.
    pub fn to_event_data(&self) -> Value {
        let mut data = Map::new();
        data.insert("id".into(), json!(self.id));
        if let Some(format) = self.offer_type.format() {
            data.insert("format".into(), json!(format));
        }
        data.insert("content".into(), json!(self.content));
        if let Some(characteristics) = &self.characteristics {
            data.insert("characteristics".into(), json!(characteristics));
        }
        if let Some(language) = &self.language {
            data.insert("language".into(), json!(language));
        }

        let mut item = Map::new();
        item.insert("id".into(), json!(self.id));
        if let Some(etag) = &self.etag {
            item.insert("etag".into(), json!(etag));
        }
        item.insert("score".into(), json!(self.score));
        item.insert("schema".into(), json!(self.schema));
        item.insert("data".into(), Value::Object(data));
        Value::Object(item)
    }
}

/// Builder for offers constructed outside a response payload.
#[derive(Debug, Clone)]
pub struct OfferBuilder {
    offer: Offer,
}

impl OfferBuilder {
    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.offer.etag = Some(etag.into());
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.offer.score = score;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.offer.schema = schema.into();
        self
    }

    pub fn characteristics(mut self, characteristics: BTreeMap<String, String>) -> Self {
        self.offer.characteristics = Some(characteristics);
        self
    }

    pub fn language(mut self, language: Vec<String>) -> Self {
        self.offer.language = Some(language);
        self
    }

    pub fn build(self) -> Offer {
        self.offer
    }
}

#[derive(Debug, Deserialize)]
struct ItemPayload {
    id: Option<String>,
    etag: Option<String>,
    score: Option<f64>,
    schema: Option<String>,
    data: Option<ItemData>,
}

#[derive(Debug, Deserialize)]
struct ItemData {
    format: Option<String>,
    content: Option<Value>,
    #[serde(rename = "content-object")]
    content_object: Option<Value>,
    characteristics: Option<Map<String, Value>>,
    language: Option<Vec<String>>,
}

/// Strings are kept verbatim; structured content is stored as compact JSON.
fn content_to_string(content: Value) -> String {
    match content {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn stringify_values(map: Map<String, Value>) -> BTreeMap<String, String> {
    map.into_iter()
        .map(|(key, value)| (key, content_to_string(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_SCHEMA: &str =
        "https://ns.adobe.com/experience/offer-management/content-component-html";
    const DEFAULT_SCHEMA: &str = "https://ns.adobe.com/personalization/default-content-item";

    #[test]
    fn infers_html_from_schema() {
        assert_eq!(
            OfferType::infer(Some(HTML_SCHEMA), Some("text/html")),
            OfferType::Html
        );
        assert_eq!(OfferType::infer(Some(HTML_SCHEMA), None), OfferType::Html);
    }

    #[test]
    fn infers_json_from_format() {
        assert_eq!(
            OfferType::infer(
                Some("https://ns.adobe.com/personalization/json-content-item"),
                Some("application/json")
            ),
            OfferType::Json
        );
        assert_eq!(
            OfferType::infer(None, Some("application/json")),
            OfferType::Json
        );
    }

    #[test]
    fn infers_text_from_schema_or_format() {
        assert_eq!(
            OfferType::infer(
                Some("https://ns.adobe.com/experience/offer-management/content-component-text"),
                None
            ),
            OfferType::Text
        );
        assert_eq!(OfferType::infer(None, Some("text/plain")), OfferType::Text);
    }

    #[test]
    fn default_content_item_is_unknown_even_with_format() {
        assert_eq!(
            OfferType::infer(Some(DEFAULT_SCHEMA), Some("text/html")),
            OfferType::Unknown
        );
    }

    #[test]
    fn infers_image_and_falls_back_to_unknown() {
        assert_eq!(OfferType::infer(None, Some("image/png")), OfferType::Image);
        assert_eq!(
            OfferType::infer(Some("https://example.com/unrecognized"), None),
            OfferType::Unknown
        );
    }

    #[test]
    fn parses_full_item() {
        let item = json!({
            "id": "xcore:personalized-offer:1111111111111111",
            "etag": "10",
            "score": 1,
            "schema": HTML_SCHEMA,
            "data": {
                "id": "xcore:personalized-offer:1111111111111111",
                "format": "text/html",
                "content": "<h1>This is HTML content</h1>",
                "characteristics": { "testing": "true" },
                "language": ["en-us"]
            }
        });

        let offer = Offer::from_event_data(&item, "prop-1").unwrap();
        assert_eq!(offer.id(), "xcore:personalized-offer:1111111111111111");
        assert_eq!(offer.etag(), Some("10"));
        assert_eq!(offer.score(), 1.0);
        assert_eq!(offer.schema(), HTML_SCHEMA);
        assert_eq!(offer.offer_type(), OfferType::Html);
        assert_eq!(offer.content(), "<h1>This is HTML content</h1>");
        assert_eq!(
            offer.characteristics().and_then(|c| c.get("testing")),
            Some(&"true".to_string())
        );
        assert_eq!(offer.language(), Some(&["en-us".to_string()][..]));
        assert_eq!(offer.proposition_id(), "prop-1");
    }

    #[test]
    fn default_content_item_has_empty_content_and_defaults() {
        let item = json!({
            "id": "0",
            "schema": DEFAULT_SCHEMA,
            "meta": { "activity.name": "Some Test Activity" }
        });

        let offer = Offer::from_event_data(&item, "prop-1").unwrap();
        assert_eq!(offer.id(), "0");
        assert_eq!(offer.etag(), None);
        assert_eq!(offer.score(), 0.0);
        assert_eq!(offer.offer_type(), OfferType::Unknown);
        assert_eq!(offer.content(), "");
    }

    #[test]
    fn json_content_object_is_stored_as_compact_json() {
        let item = json!({
            "id": "0",
            "schema": "https://ns.adobe.com/personalization/json-content-item",
            "data": {
                "id": "0",
                "format": "application/json",
                "content": { "device": "mobile" }
            }
        });

        let offer = Offer::from_event_data(&item, "prop-1").unwrap();
        assert_eq!(offer.offer_type(), OfferType::Json);
        assert_eq!(offer.content(), r#"{"device":"mobile"}"#);
        assert!(offer.characteristics().is_none());
        assert!(offer.language().is_none());
    }

    #[test]
    fn click_metric_items_are_not_offers() {
        let item = json!({
            "id": "111111",
            "data": { "type": "click", "format": "application/vnd.adobe.target.metric" }
        });
        assert!(Offer::from_event_data(&item, "prop-1").is_none());
    }

    #[test]
    fn items_without_id_are_skipped() {
        let item = json!({ "schema": HTML_SCHEMA, "data": { "content": "x" } });
        assert!(Offer::from_event_data(&item, "prop-1").is_none());
    }

    #[test]
    fn builder_sets_optional_fields() {
        let offer = Offer::builder("246315", OfferType::Text, "Text Offer!!")
            .etag("3")
            .score(0.5)
            .schema("https://ns.adobe.com/experience/offer-management/content-component-text")
            .build();

        assert_eq!(offer.id(), "246315");
        assert_eq!(offer.etag(), Some("3"));
        assert_eq!(offer.score(), 0.5);
        assert_eq!(offer.content(), "Text Offer!!");
        assert_eq!(offer.proposition_id(), "");
    }

    #[test]
    fn event_data_form_parses_back_to_the_same_offer() {
        let original = Offer::builder("o-1", OfferType::Text, "hello")
            .etag("7")
            .schema("https://ns.adobe.com/experience/offer-management/content-component-text")
            .language(vec!["en-us".into()])
            .build();

        let mut parsed = Offer::from_event_data(&original.to_event_data(), "").unwrap();
        parsed.attach_to("");
        assert_eq!(parsed, original);
    }
}
