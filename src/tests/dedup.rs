use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::tests::test_support::{client_for, enveloped, seeded_store};
use crate::{CredentialKey, CredentialStore, RequestDescriptor};

#[tokio::test]
async fn identical_concurrent_requests_dispatch_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/student/exams/passed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(enveloped(&json!({"success": true, "data": [3, 5]})))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _hook) = client_for(&server, seeded_store());
    let (first, second) = tokio::join!(
        client.get("/student/exams/passed", Some(json!({"page": 1}))),
        client.get("/student/exams/passed", Some(json!({"page": 1}))),
    );

    let first = first.expect("first caller");
    let second = second.expect("second caller");
    assert_eq!(first.body, json!({"success": true, "data": [3, 5]}));
    assert_eq!(first.body, second.body);
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn shared_failure_reaches_every_duplicate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/student/exams/failed"))
        .respond_with(ResponseTemplate::new(500).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _hook) = client_for(&server, seeded_store());
    let (first, second) = tokio::join!(
        client.get("/student/exams/failed", None),
        client.get("/student/exams/failed", None),
    );
    assert_eq!(first.unwrap_err().status().map(|s| s.as_u16()), Some(500));
    assert_eq!(second.unwrap_err().status().map(|s| s.as_u16()), Some(500));
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn empty_body_and_no_body_are_the_same_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/config/reload"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true}))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _hook) = client_for(&server, seeded_store());
    let (with_empty, without) = tokio::join!(
        client.request(RequestDescriptor::post("/admin/config/reload").with_body(json!({}))),
        client.request(RequestDescriptor::post("/admin/config/reload")),
    );
    assert!(with_empty.is_ok());
    assert!(without.is_ok());
}

#[tokio::test]
async fn different_params_are_different_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/students"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(50)))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _hook) = client_for(&server, seeded_store());
    let (a, b) = tokio::join!(
        client.get("/admin/students", Some(json!({"page": 1}))),
        client.get("/admin/students", Some(json!({"page": 2}))),
    );
    assert!(a.is_ok() && b.is_ok());

    let seen: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .map(|req| req.url.query().unwrap_or_default().to_string())
        .collect();
    assert!(seen.contains(&"page=1".to_string()), "{seen:?}");
    assert!(seen.contains(&"page=2".to_string()), "{seen:?}");
}

#[tokio::test]
async fn settled_requests_dispatch_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/organizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let (client, _hook) = client_for(&server, seeded_store());
    client.get("/admin/organizations", None).await.unwrap();
    client.get("/admin/organizations", None).await.unwrap();
}

#[tokio::test]
async fn force_logout_clears_registry_and_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/e-resources"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let store = seeded_store();
    let (client, hook) = client_for(&server, store.clone());

    let pending = client.get("/admin/e-resources", None);
    let logout = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(client.in_flight(), 1);
        client.force_logout("Logged out by administrator");
        assert_eq!(client.in_flight(), 0);
    };
    let (resp, ()) = tokio::join!(pending, logout);

    // the request on the wire still settles for its caller
    assert!(resp.is_ok());
    assert_eq!(client.in_flight(), 0);
    for key in CredentialKey::ALL {
        assert_eq!(store.credential(key), None);
    }
    assert_eq!(hook.messages(), vec!["Logged out by administrator"]);
}
