use serde_json::json;
use serde_json::Value;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::Mock;
use wiremock::ResponseTemplate;

use waitlist::configuration::ProviderKind;

use crate::helpers::spawn_app_with;
use crate::helpers::TestApp;

async fn spawn_local_store_app() -> TestApp {
    spawn_app_with(|cfg| cfg.waitlist.provider = ProviderKind::LocalStore).await
}

async fn mount_kit(
    app: &TestApp,
    form_status: u16,
    expected_calls: u64,
) {
    Mock::given(path("/v4/subscribers"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "subscriber": { "id": 1 } })))
        .expect(expected_calls)
        .mount(&app.provider_server)
        .await;
    Mock::given(path("/v4/forms/9100092/subscribers"))
        .and(method("POST"))
        .respond_with(
            ResponseTemplate::new(form_status).set_body_json(json!({ "subscriber": { "id": 1 } })),
        )
        .expect(expected_calls)
        .mount(&app.provider_server)
        .await;
}

#[tokio::test]
async fn known_email_never_reaches_kit() {
    let app = spawn_local_store_app().await;
    mount_kit(&app, 201, 1).await;

    let resp = app.post_waitlist(&json!({ "email": "a@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["alreadyExists"], false);
    assert_eq!(body["subscriber"], json!({ "id": 1 }));

    // differs only in case; mocks above would fail on a second Kit call
    let resp = app.post_waitlist(&json!({ "email": "A@B.com" })).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["alreadyExists"], true);
    assert_eq!(body["email"], "a@b.com");
    assert_eq!(app.provider_calls().await, 2);
}

#[tokio::test]
async fn concurrent_duplicates_reach_kit_once() {
    let app = spawn_local_store_app().await;
    mount_kit(&app, 201, 1).await;

    let body = json!({ "email": "a@b.com" });
    let (first, second, third) = tokio::join!(
        app.post_waitlist(&body),
        app.post_waitlist(&body),
        app.post_waitlist(&body),
    );
    let mut already = vec![];
    for resp in [first, second, third] {
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        already.push(body["alreadyExists"].as_bool().unwrap());
    }
    already.sort();
    assert_eq!(already, [false, true, true]);

    let body: Value = app.get_waitlist().await.json().await.unwrap();
    assert_eq!(body["emails"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn kit_failure_records_nothing() {
    let app = spawn_local_store_app().await;
    mount_kit(&app, 422, 1).await;

    let resp = app.post_waitlist(&json!({ "email": "a@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 502);

    let resp = app.get_waitlist().await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "emails": [] }));
}

#[tokio::test]
async fn list_reads_local_store() {
    let app = spawn_local_store_app().await;
    mount_kit(&app, 201, 2).await;

    for email in ["a@b.com", "c@d.com"] {
        let resp = app.post_waitlist(&json!({ "email": email })).await;
        assert_eq!(resp.status().as_u16(), 200);
    }

    let resp = app.get_waitlist().await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    let emails = body["emails"].as_array().unwrap();
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[0]["email"], "a@b.com");
    assert_eq!(emails[1]["email"], "c@d.com");
    assert!(emails[0]["createdAt"].is_string());
}

#[tokio::test]
async fn missing_kit_key_is_500() {
    let app = spawn_app_with(|cfg| {
        cfg.waitlist.provider = ProviderKind::LocalStore;
        cfg.kit.api_key = None;
    })
    .await;

    let resp = app.post_waitlist(&json!({ "email": "a@b.com" })).await;
    assert_eq!(resp.status().as_u16(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Missing server env: APP_KIT__API_KEY");
}
