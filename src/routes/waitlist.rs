use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use serde::Serialize;
use serde_json::Value;

use crate::domain::WaitlistEntry;
use crate::gateway::Gateway;
use crate::gateway::WaitlistError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct Listing {
    emails: Vec<WaitlistEntry>,
}

impl ResponseError for WaitlistError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Provider(_) | Self::Unexpected(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            // local I/O details stay in the logs
            Self::Unexpected(_) => "Unable to access the waitlist.".to_string(),
            e => e.to_string(),
        };
        tracing::warn!(status = %self.status_code(), error = ?self, "waitlist request failed");
        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}

/// Clients send either a JSON object, or a JSON string that itself contains
/// the object. Anything unparsable counts as `{}`, i.e. no email, which the
/// gateway then rejects like any other invalid address.
fn submitted_email(body: &[u8]) -> String {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(Value::String(raw)) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        Ok(value) => value,
        Err(_) => Value::Null,
    };
    match value.get("email") {
        Some(Value::String(email)) => email.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// `POST /api/waitlist`
///
/// # Request example
///
/// ```sh
///     curl --json '{"email": "john@foo.com"}' http://127.0.0.1:8788/api/waitlist
/// ```
///
/// Returns 200 with `{ok, alreadyExists, email, subscriber?}`; 400 for an
/// invalid email, 500 when the provider is not configured, 502 when the
/// provider fails. A body actix refuses to read (e.g. over the payload limit)
/// keeps actix's status but still gets a JSON `{error}`.
#[tracing::instrument(name = "Joining waitlist", skip(body, gateway))]
pub async fn join_waitlist(
    body: Result<web::Bytes, actix_web::Error>,
    gateway: web::Data<Gateway>,
) -> Result<HttpResponse, WaitlistError> {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            let status = e.as_response_error().status_code();
            tracing::warn!(%status, "unreadable request body: {e}");
            return Ok(HttpResponse::build(status).json(ErrorBody {
                error: e.to_string(),
            }));
        }
    };
    let email = submitted_email(&body);
    let submission = gateway.submit(&email).await?;
    Ok(HttpResponse::Ok().json(submission))
}

/// `GET /api/waitlist`
///
/// Returns `{emails: [{email, createdAt?}]}`
#[tracing::instrument(name = "Reading waitlist", skip(gateway))]
pub async fn list_waitlist(gateway: web::Data<Gateway>) -> Result<HttpResponse, WaitlistError> {
    let emails = gateway.list().await?;
    Ok(HttpResponse::Ok().json(Listing { emails }))
}

/// Any other method on `/api/waitlist`
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(ErrorBody {
        error: "Method not allowed".to_string(),
    })
}
