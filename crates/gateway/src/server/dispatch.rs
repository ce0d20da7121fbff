//! Request dispatch for `/api/{table}[/{id}]`.
//!
//! Evaluated in order:
//!
//! 1. `OPTIONS` answers 200 with an empty body.
//! 2. Reserved namespaces (`qbo`, `stripe`, `provision`, `access`) go to their
//!    own handlers with the raw body.
//! 3. Everything else is generic CRUD on a registered table, chosen by method
//!    and the presence of an id; unsupported combinations are 405.

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use common::protocol::ProvisionRequest;
use serde_json::Value;

use super::state::AppState;
use crate::db::Row;
use crate::error::ApiError;
use crate::integrations::{quickbooks, stripe};
use crate::{resource, tenant};

/// Path segments under `/api` that are not tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    QuickBooks,
    Stripe,
    Provision,
    Access,
}

impl Namespace {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "qbo" => Some(Namespace::QuickBooks),
            "stripe" => Some(Namespace::Stripe),
            "provision" => Some(Namespace::Provision),
            "access" => Some(Namespace::Access),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::QuickBooks => "qbo",
            Namespace::Stripe => "stripe",
            Namespace::Provision => "provision",
            Namespace::Access => "access",
        }
    }
}

/// One `/api` request, borrowed from the extractors.
#[derive(Debug)]
pub struct ApiRequest<'a> {
    pub method: &'a Method,
    pub table: &'a str,
    pub id: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: &'a Bytes,
}

pub async fn dispatch(state: &AppState, req: ApiRequest<'_>) -> Result<Response, ApiError> {
    if *req.method == Method::OPTIONS {
        return Ok(StatusCode::OK.into_response());
    }
    if let Some(namespace) = Namespace::parse(req.table) {
        return namespace_dispatch(state, namespace, req).await;
    }

    let (table, method) = (req.table, req.method);
    match (method, req.id) {
        (&Method::GET, None) => Ok(Json(resource::list(state, table).await?).into_response()),
        (&Method::GET, Some(id)) => Ok(Json(resource::get(state, table, id).await?).into_response()),
        (&Method::POST, None) => {
            let body = parse_row(req.body)?;
            let row = resource::create(state, table, body).await?;
            Ok((StatusCode::CREATED, Json(row)).into_response())
        }
        (&Method::PUT, Some(id)) => {
            let body = parse_row(req.body)?;
            Ok(Json(resource::update(state, table, id, body).await?).into_response())
        }
        (&Method::DELETE, Some(id)) => {
            resource::delete(state, table, id).await?;
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        _ => Err(ApiError::method_not_allowed()),
    }
}

async fn namespace_dispatch(
    state: &AppState,
    namespace: Namespace,
    req: ApiRequest<'_>,
) -> Result<Response, ApiError> {
    match namespace {
        Namespace::QuickBooks => Ok(quickbooks::handle(req.id.unwrap_or_default())
            .await?
            .into_response()),
        Namespace::Stripe => Ok(stripe::handle(
            state,
            req.id.unwrap_or_default(),
            req.method,
            req.headers,
            req.body,
        )
        .await?
        .into_response()),
        Namespace::Provision => match (req.method, req.id) {
            (&Method::POST, None) => {
                let body: ProvisionRequest = serde_json::from_slice(req.body)
                    .map_err(|e| ApiError::bad_request(format!("invalid provision request: {e}")))?;
                let provisioned = tenant::provision(state, body).await?;
                Ok((StatusCode::CREATED, Json(provisioned)).into_response())
            }
            _ => Err(ApiError::method_not_allowed()),
        },
        Namespace::Access => match (req.method, req.id) {
            (&Method::GET, Some(daycare_id)) => {
                Ok(Json(tenant::check(state, daycare_id).await?).into_response())
            }
            _ => Err(ApiError::method_not_allowed()),
        },
    }
}

/// Parse a write body. Empty or `null` is an empty row; anything but a JSON
/// object is rejected.
fn parse_row(body: &[u8]) -> Result<Row, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Row::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(row)) => Ok(row),
        Ok(Value::Null) => Ok(Row::new()),
        Ok(_) => Err(ApiError::bad_request("request body must be a JSON object")),
        Err(e) => Err(ApiError::bad_request(format!("invalid JSON body: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RESERVED_NAMES;

    #[test]
    fn namespaces_are_reserved_in_the_registry() {
        for name in RESERVED_NAMES {
            let ns = Namespace::parse(name).unwrap();
            assert_eq!(ns.as_str(), *name);
        }
        assert_eq!(Namespace::parse("children"), None);
    }

    #[tokio::test]
    async fn options_answers_before_namespace_or_table() {
        let state = AppState::default();
        let headers = HeaderMap::new();
        let body = Bytes::new();
        for (table, id) in [("stripe", Some("webhook")), ("no_such_table", None)] {
            let req = ApiRequest {
                method: &Method::OPTIONS,
                table,
                id,
                headers: &headers,
                body: &body,
            };
            let resp = dispatch(&state, req).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    #[test]
    fn empty_body_is_empty_row() {
        assert!(parse_row(b"").unwrap().is_empty());
        assert!(parse_row(b"  \n").unwrap().is_empty());
        assert!(parse_row(b"null").unwrap().is_empty());
    }

    #[test]
    fn object_body_parsed() {
        let row = parse_row(br#"{"first_name":"Ava","classroom_id":null}"#).unwrap();
        assert_eq!(row["first_name"], "Ava");
        assert!(row["classroom_id"].is_null());
    }

    #[test]
    fn invalid_body_rejected() {
        assert_eq!(parse_row(b"{first_name").unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_row(b"[1,2]").unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
