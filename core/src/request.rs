//! Per-request routing context.
//!
//! A [`RequestContext`] is created fresh for every dispatched request and is
//! owned by that request alone. Modules read the request from it and write
//! their contributions back: menu items, scripts, content blocks, or a
//! complete raw response.

use crate::client::ClientScripts;
use crate::menu::MenuSet;
use http::{HeaderMap, Method, StatusCode, Uri};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Resolved view-helper values, keyed by helper name.
pub type HelperValues = BTreeMap<String, Value>;

/// Parsed form fields, in submission order.
///
/// A field may repeat (`tag=a&tag=b`); [`FormData::get`] returns the first
/// value and [`FormData::get_all`] every value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, String)>,
    json: Option<Value>,
}

impl FormData {
    /// Build from decoded `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            json: None,
        }
    }

    /// Build from a JSON document.
    ///
    /// Top-level keys of an object become fields. Strings are taken as-is,
    /// other scalars are rendered as JSON text, and each array element becomes
    /// a separate value for that field. The whole document stays available
    /// through [`FormData::json`].
    #[must_use]
    pub fn from_json(document: Value) -> Self {
        let mut fields = Vec::new();
        if let Value::Object(map) = &document {
            for (key, value) in map {
                match value {
                    Value::Array(items) => {
                        fields.extend(items.iter().map(|item| (key.clone(), scalar_text(item))));
                    },
                    other => fields.push((key.clone(), scalar_text(other))),
                }
            }
        }
        Self {
            fields,
            json: Some(document),
        }
    }

    /// First value of a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a field, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// All fields in submission order.
    #[must_use]
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// The original document for JSON submissions.
    #[must_use]
    pub const fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Whether no fields were submitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A rendered fragment destined for a named layout region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    /// Layout region, e.g. `body`
    pub region: String,
    /// HTML fragment
    pub html: String,
}

/// A complete response body supplied by a module, bypassing the theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBody {
    /// `Content-Type` header value
    pub content_type: String,
    /// Body bytes
    pub content: Vec<u8>,
}

/// A module handler failure recorded while routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingError {
    /// Module whose handler failed
    pub module: String,
    /// Failure description
    pub message: String,
}

/// Everything one request carries through module routing.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request method
    pub method: Method,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Parameters captured by the matching route of the module being invoked
    pub params: HashMap<String, String>,
    /// The five named menus
    pub menus: MenuSet,
    /// View-helper values computed before routing
    pub helpers: HelperValues,
    /// Client-side script accumulator
    pub client: ClientScripts,
    /// Parsed form content, present only for form submissions
    pub form: Option<FormData>,
    /// Page title
    pub title: Option<String>,
    /// Content blocks in contribution order
    pub blocks: Vec<ContentBlock>,
    /// Response status for themed responses
    pub status: StatusCode,
    /// Redirect target; answered with `303 See Other`
    pub redirect: Option<String>,
    /// Raw response body
    pub body: Option<RawBody>,
    /// Handler failures
    pub errors: Vec<RoutingError>,
}

impl RequestContext {
    /// A fresh context with empty menus, scripts and content.
    #[must_use]
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        Self {
            method,
            uri,
            headers,
            params: HashMap::new(),
            menus: MenuSet::new(),
            helpers: HelperValues::new(),
            client: ClientScripts::new(),
            form: None,
            title: None,
            blocks: Vec::new(),
            status: StatusCode::OK,
            redirect: None,
            body: None,
            errors: Vec::new(),
        }
    }

    /// Request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// A captured route parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Append a content block.
    pub fn add_block(&mut self, region: impl Into<String>, html: impl Into<String>) {
        self.blocks.push(ContentBlock {
            region: region.into(),
            html: html.into(),
        });
    }

    /// Blocks for one region, concatenated in contribution order.
    #[must_use]
    pub fn region(&self, region: &str) -> String {
        self.blocks
            .iter()
            .filter(|b| b.region == region)
            .map(|b| b.html.as_str())
            .collect()
    }

    /// Answer with a raw body instead of a themed page.
    pub fn respond(&mut self, content_type: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.body = Some(RawBody {
            content_type: content_type.into(),
            content: content.into(),
        });
    }

    /// Answer with `303 See Other`.
    pub fn redirect_to(&mut self, location: impl Into<String>) {
        self.redirect = Some(location.into());
    }

    /// Whether any handler produced something to send.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.body.is_some() || self.redirect.is_some() || !self.blocks.is_empty()
    }
}
