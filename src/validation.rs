//! Request-shape validation run before any handler or storage call.
//!
//! Each endpoint declares a [`RequestShape`]: a typed view built field by
//! field through a [`Validator`] over the path parameters, query parameters
//! and JSON body. Every field is checked even after a failure so the client
//! gets all violations in one response.

use std::collections::HashMap;

use anyhow::anyhow;
use axum::{
    async_trait,
    extract::{rejection::PathRejection, FromRequest, FromRequestParts, Path, Query, Request},
    http::StatusCode,
};
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Params,
    Query,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    Required,
    InvalidType,
    InvalidUuid,
    InvalidEmail,
    InvalidUrl,
    TooShort,
    InvalidJson,
}

/// One violated field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub location: Location,
    pub field: String,
    pub code: IssueCode,
    pub message: String,
}

impl Issue {
    pub fn new(location: Location, field: &str, code: IssueCode) -> Self {
        let message = match code {
            IssueCode::Required => format!("{field} is required"),
            IssueCode::InvalidType => format!("{field} must be a string"),
            IssueCode::InvalidUuid => format!("{field} must be a valid UUID"),
            IssueCode::InvalidEmail => format!("{field} must be a valid email"),
            IssueCode::InvalidUrl => format!("{field} must be a valid URL"),
            IssueCode::TooShort => format!("{field} is too short"),
            IssueCode::InvalidJson => "body must be a JSON object".to_string(),
        };
        Self {
            location,
            field: field.to_string(),
            code,
            message,
        }
    }

    fn with_message(mut self, message: String) -> Self {
        self.message = message;
        self
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

enum Body {
    Unparsed(Bytes),
    Object(Map<String, Value>),
    Empty,
    Broken,
}

enum Lookup {
    Missing,
    Present(Value),
    // Body was unreadable; already reported once.
    Skip,
}

pub struct Validator {
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Body,
    issues: Vec<Issue>,
}

impl Validator {
    pub fn new(
        params: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Bytes,
    ) -> Self {
        Self {
            params,
            query,
            body: Body::Unparsed(body),
            issues: Vec::new(),
        }
    }

    fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    // The body is only parsed when a shape reads from it.
    fn parse_body(&mut self) {
        let Body::Unparsed(bytes) = &self.body else {
            return;
        };
        self.body = if bytes.iter().all(u8::is_ascii_whitespace) {
            Body::Empty
        } else {
            match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(map)) => Body::Object(map),
                _ => {
                    self.issues
                        .push(Issue::new(Location::Body, "", IssueCode::InvalidJson));
                    Body::Broken
                }
            }
        };
    }

    fn lookup(&mut self, location: Location, field: &str) -> Lookup {
        let raw = match location {
            Location::Params => self.params.get(field).cloned().map(Value::String),
            Location::Query => self.query.get(field).cloned().map(Value::String),
            Location::Body => {
                self.parse_body();
                match &self.body {
                    Body::Object(map) => map.get(field).cloned(),
                    Body::Broken => return Lookup::Skip,
                    _ => None,
                }
            }
        };
        match raw {
            None => Lookup::Missing,
            Some(v) => Lookup::Present(v),
        }
    }

    fn required_string(&mut self, location: Location, field: &str) -> Option<String> {
        match self.lookup(location, field) {
            Lookup::Present(Value::String(s)) => Some(s),
            Lookup::Present(_) => {
                self.push(Issue::new(location, field, IssueCode::InvalidType));
                None
            }
            Lookup::Missing => {
                self.push(Issue::new(location, field, IssueCode::Required));
                None
            }
            Lookup::Skip => None,
        }
    }

    /// String with at least `min_len` characters.
    pub fn string(&mut self, location: Location, field: &str, min_len: usize) -> Option<String> {
        let s = self.required_string(location, field)?;
        if s.chars().count() < min_len {
            let issue = Issue::new(location, field, IssueCode::TooShort).with_message(format!(
                "{field} must contain at least {min_len} character(s)"
            ));
            self.push(issue);
            return None;
        }
        Some(s)
    }

    pub fn uuid(&mut self, location: Location, field: &str) -> Option<Uuid> {
        let s = self.required_string(location, field)?;
        match Uuid::parse_str(&s) {
            Ok(id) => Some(id),
            Err(_) => {
                self.push(Issue::new(location, field, IssueCode::InvalidUuid));
                None
            }
        }
    }

    pub fn email(&mut self, location: Location, field: &str) -> Option<String> {
        let s = self.required_string(location, field)?;
        if !is_valid_email(&s) {
            self.push(Issue::new(location, field, IssueCode::InvalidEmail));
            return None;
        }
        Some(s)
    }

    /// Absent and `null` both mean "no URL": an explicit `null` is accepted,
    /// not reported as `invalid_type`.
    pub fn optional_url(&mut self, location: Location, field: &str) -> Option<Option<String>> {
        match self.lookup(location, field) {
            Lookup::Missing | Lookup::Present(Value::Null) => Some(None),
            Lookup::Present(Value::String(s)) => match url::Url::parse(&s) {
                Ok(_) => Some(Some(s)),
                Err(_) => {
                    self.push(Issue::new(location, field, IssueCode::InvalidUrl));
                    None
                }
            },
            Lookup::Present(_) => {
                self.push(Issue::new(location, field, IssueCode::InvalidType));
                None
            }
            Lookup::Skip => None,
        }
    }

    pub fn finish<T>(self, shape: Option<T>) -> Result<T, Vec<Issue>> {
        match shape {
            Some(value) if self.issues.is_empty() => Ok(value),
            _ => Err(self.issues),
        }
    }
}

/// Statically declared input of one endpoint.
///
/// Implementations must call every field check before combining the results
/// so that all violations are collected.
pub trait RequestShape: Sized {
    fn check(v: &mut Validator) -> Option<Self>;
}

fn rejected(text: String, status: StatusCode) -> ApiError {
    ApiError::unhandled(anyhow!(text)).with_status(status)
}

/// Extractor producing the validated view of a request, or a 400 listing
/// every issue. Must be the last extractor since it consumes the body.
pub struct Valid<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Valid<T>
where
    T: RequestShape + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let (mut parts, body) = req.into_parts();

        let params =
            match Path::<HashMap<String, String>>::from_request_parts(&mut parts, state).await {
                Ok(Path(params)) => params,
                // Route without parameters.
                Err(PathRejection::MissingPathParams(_)) => HashMap::new(),
                Err(e) => return Err(rejected(e.body_text(), e.status())),
            };
        let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
            Ok(Query(query)) => query,
            Err(e) => return Err(rejected(e.body_text(), e.status())),
        };
        let bytes = Bytes::from_request(Request::from_parts(parts, body), state)
            .await
            .map_err(|e| rejected(e.body_text(), e.status()))?;

        let mut v = Validator::new(params, query, bytes);
        let shape = T::check(&mut v);
        v.finish(shape).map(Valid).map_err(ApiError::Validation)
    }
}
