//! Polling simulator over a real listener.

use fdsim_core::routes::REPORT;
use fdsim_core::{ETAG_HEADER, IF_NONE_MATCH_HEADER, SdkKind};
use fdsim_testkit::{MockServiceHarness, fixtures, init_test_tracing};
use serde_json::{Value, json};

#[tokio::test]
async fn conditional_get_is_driven_by_etag() {
    init_test_tracing();
    let harness = MockServiceHarness::start().await.unwrap();
    let polling = harness.polling(SdkKind::ServerSide, fixtures::server_data(&["flag1"], 1));
    polling.service.set_etag(Some("v1".into()));
    let client = reqwest::Client::new();
    let url = polling.url("/sdk/latest-all");

    let response = client.get(&url).send().await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()[ETAG_HEADER], "v1");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["flags"]["flag1"]["version"], 1);

    let response = client
        .get(&url)
        .header(IF_NONE_MATCH_HEADER, "v1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_MODIFIED);
    assert!(response.bytes().await.unwrap().is_empty());

    // New data under the old ETag is still "not modified".
    polling.service.set_data(fixtures::server_data(&["flag1"], 2));
    let response = client
        .get(&url)
        .header(IF_NONE_MATCH_HEADER, "v1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_MODIFIED);

    polling.service.set_etag(Some("v2".into()));
    let response = client
        .get(&url)
        .header(IF_NONE_MATCH_HEADER, "v1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["flags"]["flag1"]["version"], 2);

    let recorded = polling.endpoint.active_request().unwrap();
    assert_eq!(recorded.header(IF_NONE_MATCH_HEADER), Some("v1"));
}

#[tokio::test]
async fn client_side_polling_routes() {
    init_test_tracing();
    let harness = MockServiceHarness::start().await.unwrap();
    let polling = harness.polling(
        SdkKind::Mobile,
        fixtures::client_data(&[("flag1", json!("green"))], 3),
    );
    let client = reqwest::Client::new();

    let body: Value = client
        .get(polling.url("/msdk/evalx/contexts/eyJrZXkiOiJ1c2VyIn0?withReasons=true"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["flag1"]["value"], "green");
    assert_eq!(body["flag1"]["reason"]["kind"], "FALLTHROUGH");

    let recorded = polling.endpoint.active_request().unwrap();
    assert_eq!(recorded.query(), Some("withReasons=true"));

    let status = client
        .request(REPORT.clone(), polling.url("/msdk/evalx/context"))
        .body(r#"{"key":"user"}"#)
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::OK);

    let status = client
        .get(polling.url("/sdk/latest-all"))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
}
