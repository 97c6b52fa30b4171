use serde_json::json;
use serde_json::Value;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use waitlist::configuration::ProviderKind;

use crate::helpers::spawn_app_with;
use crate::helpers::TestApp;

async fn spawn_kit_app() -> TestApp {
    spawn_app_with(|cfg| cfg.waitlist.provider = ProviderKind::Kit).await
}

fn kit_subscriber(email: &str) -> Value {
    json!({
        "id": 3,
        "first_name": null,
        "email_address": email,
        "state": "active",
        "created_at": "2023-02-17T11:43:55Z",
        "added_at": "2023-02-17T11:43:55Z",
        "fields": {}
    })
}

#[tokio::test]
async fn subscribe_then_attach_to_form() {
    let app = spawn_kit_app().await;
    Mock::given(path("/v4/subscribers"))
        .and(method("POST"))
        .and(header("X-Kit-Api-Key", "kit-key"))
        .and(body_json(json!({ "email_address": "a@b.com" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "subscriber": kit_subscriber("a@b.com") })),
        )
        .expect(1)
        .mount(&app.provider_server)
        .await;
    Mock::given(path("/v4/forms/9100092/subscribers"))
        .and(method("POST"))
        .and(header("X-Kit-Api-Key", "kit-key"))
        .and(body_json(json!({ "email_address": "a@b.com" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "subscriber": kit_subscriber("a@b.com") })),
        )
        .expect(1)
        .mount(&app.provider_server)
        .await;

    let resp = app.post_waitlist(&json!({ "email": "A@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["alreadyExists"], false);
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(body["subscriber"]["email_address"], "a@b.com");
}

/// The subscriber created by the first call is not rolled back
#[tokio::test]
async fn form_failure_is_502_after_subscriber_created() {
    let app = spawn_kit_app().await;
    Mock::given(path("/v4/subscribers"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "subscriber": kit_subscriber("a@b.com") })),
        )
        .expect(1)
        .mount(&app.provider_server)
        .await;
    Mock::given(path("/v4/forms/9100092/subscribers"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Form not found" })))
        .expect(1)
        .mount(&app.provider_server)
        .await;

    let resp = app.post_waitlist(&json!({ "email": "a@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 502);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Form not found");
}

#[tokio::test]
async fn missing_form_id_is_500() {
    let app = spawn_app_with(|cfg| {
        cfg.waitlist.provider = ProviderKind::Kit;
        cfg.kit.form_id = None;
    })
    .await;

    let resp = app.post_waitlist(&json!({ "email": "a@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Missing server env: APP_KIT__FORM_ID");
    assert_eq!(app.provider_calls().await, 0);
}

#[tokio::test]
async fn list_form_subscribers() {
    let app = spawn_kit_app().await;
    Mock::given(path("/v4/forms/9100092/subscribers"))
        .and(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subscribers": [kit_subscriber("a@b.com")],
            "pagination": { "has_next_page": false, "end_cursor": "WzE0XQ==" }
        })))
        .expect(1)
        .mount(&app.provider_server)
        .await;

    let resp = app.get_waitlist().await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "emails": [{ "email": "a@b.com", "createdAt": "2023-02-17T11:43:55Z" }] })
    );
}
