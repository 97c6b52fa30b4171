use actix_web::HttpResponse;

/// `GET /health_check`
///
/// Used by the deployment platform's liveness probe; never touches a provider.
///
/// Note: viewing http response requires `curl -v`
pub async fn health_check() -> HttpResponse { HttpResponse::Ok().finish() }
