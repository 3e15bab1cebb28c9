//! End-to-end request behavior against a mock API server.
//!
//! Covers credential header injection, error surfacing, redirect policy on a
//! live transport, response size ceilings, multipart uploads, and the
//! pre-flight validation failures that must never reach the network.

use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patch_client::{Error, FilePart, PatchClient, PendingRequest, RequestOptions, ResponseBody};

async fn client_for(server: &MockServer) -> PatchClient {
    PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .build()
        .unwrap()
}

#[tokio::test]
async fn injects_authorization_and_account_type_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/account/"))
        .and(header("Authorization", "Bearer token-1"))
        .and(header("Account-Type", "viewer"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "acct-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .access_token("token-1")
        .account_type("viewer")
        .build()
        .unwrap();

    let body = client
        .get_account_info(&RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"id": "acct-1"}))));
}

#[tokio::test]
async fn per_call_token_overrides_client_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/account/refresh-token"))
        .and(header("Authorization", "Bearer per-call"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t2"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .access_token("client-level")
        .build()
        .unwrap();

    let opts = RequestOptions::new().access_token("per-call");
    let body = client.refresh_user_token(&opts).await.unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"token": "t2"}))));
}

#[tokio::test]
async fn empty_success_body_decodes_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants/p-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client
        .get_plant_details("p-1", &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, None);
}

#[tokio::test]
async fn non_2xx_surfaces_status_and_decoded_payload() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "plant not found"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .get_plant_details("missing", &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), 404);
    assert_eq!(
        err.payload(),
        Some(&ResponseBody::Json(json!({"detail": "plant not found"})))
    );
    assert!(err.to_string().contains("returned status 404"));
}

#[tokio::test]
async fn authorization_bearing_redirect_is_surfaced_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/account/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/next")
                .set_body_json(json!({"detail": "redirected"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .access_token("secret")
        .build()
        .unwrap();

    let err = client
        .get_account_info(&RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), 302);
    assert_eq!(
        err.payload(),
        Some(&ResponseBody::Json(json!({"detail": "redirected"})))
    );
}

#[tokio::test]
async fn redirects_are_surfaced_when_following_is_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/elsewhere")
                .set_body_json(json!({"detail": "redirected"})),
        )
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .follow_redirects(false)
        .build()
        .unwrap();

    let err = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), 302);
}

#[tokio::test]
async fn same_origin_credential_free_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/moved"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"items": []}))));
}

#[tokio::test]
async fn cross_origin_redirect_is_refused() {
    let origin = MockServer::start().await;
    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/landing", other.uri())),
        )
        .expect(1)
        .mount(&origin)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other)
        .await;

    let client = client_for(&origin).await;
    let err = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), 302);
}

#[tokio::test]
async fn redirect_loop_stops_after_ten_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/api/v3/plants"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.status(), 0);
    assert!(err.to_string().contains("stopped after 10 redirects"));
}

#[tokio::test]
async fn oversized_success_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![b'x'; 5], "text/plain"))
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .max_response_bytes(4)
        .build()
        .unwrap();

    let err = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "response exceeded 4 bytes");
}

#[tokio::test]
async fn oversized_error_body_reports_the_size_not_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants"))
        .respond_with(ResponseTemplate::new(500).set_body_raw(vec![b'x'; 5], "text/plain"))
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .max_response_bytes(4)
        .build()
        .unwrap();

    let err = client
        .get_plant_list(None, None, &RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ResponseTooLarge { limit: 4 }));
    assert_eq!(err.status(), 0);
}

#[tokio::test]
async fn multipart_upload_puts_fields_before_files_on_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/plants/p-1/files"))
        .and(body_string_contains(
            "Content-Disposition: form-data; name=\"name\"",
        ))
        .and(body_string_contains(
            "Content-Disposition: form-data; name=\"filename\"; filename=\"map.csv\"",
        ))
        .and(body_string_contains("Content-Type: text/csv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"uploaded": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let fields = vec![("name".to_string(), "panel-map".to_string())];
    let files = vec![(
        "filename".to_string(),
        FilePart::new("map.csv", b"a,b\n1,2\n".to_vec()).with_content_type("text/csv"),
    )];
    let body = client
        .upload_plant_files("p-1", &fields, &files, &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"uploaded": 1}))));
}

#[tokio::test]
async fn empty_file_set_fails_before_any_request_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .upload_plant_files("p-1", &[], &[], &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "files must not be empty");
}

#[tokio::test]
async fn oversized_multipart_payload_fails_before_any_request_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .max_multipart_bytes(64)
        .build()
        .unwrap();

    let files = vec![("f".to_string(), FilePart::new("big.bin", vec![b'x'; 256]))];
    let err = client
        .upload_plant_files("p-1", &[], &files, &RequestOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "multipart payload exceeds 64 bytes");
}

#[tokio::test]
async fn metrics_by_date_joins_fields_into_one_query_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants/p-1/metrics/inverter/day-1h"))
        .and(query_param("date", "2024-06-01"))
        .and(query_param("fields", "i_out,p"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let fields = vec!["i_out".to_string(), "p".to_string()];
    let body = client
        .get_metrics_by_date(
            "p-1",
            "inverter",
            "day",
            "1h",
            "2024-06-01",
            None,
            Some(&fields),
            &RequestOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"rows": []}))));
}

#[tokio::test]
async fn latest_device_metrics_renders_bool_and_numeric_query_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants/p-1/metrics/device/latest"))
        .and(query_param("includeState", "true"))
        .and(query_param("ago", "15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"devices": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client
        .get_latest_device_metrics("p-1", Some(true), Some(15), &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Json(json!({"devices": []}))));
}

#[tokio::test]
async fn plain_text_under_json_content_type_falls_back_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/plants/p-1/blueprint"))
        .and(query_param("date", "2024-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("row,col\n1,2", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let body = client
        .get_plant_blueprint("p-1", "2024-06-01", &RequestOptions::new())
        .await
        .unwrap();
    assert_eq!(body, Some(ResponseBody::Text("row,col\n1,2".to_string())));
}

#[tokio::test]
async fn timeout_is_a_transport_error_with_status_zero() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/account/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let client = PatchClient::builder()
        .base_url(server.uri())
        .allow_insecure_http(true)
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    let err = client
        .get_account_info(&RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport { .. }));
    assert_eq!(err.status(), 0);
}

#[tokio::test]
async fn traversal_path_fails_before_any_request_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .get_plant_details("..", &RequestOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // Raw paths handed straight to the facade get the same pre-flight guard.
    for raw_path in [
        "/api/v3/plants/%2E%2E/files",
        "/api/v3/plants/a%2F..%2Fb",
        "https://evil.example/api/v3/plants",
    ] {
        let err = client
            .request(PendingRequest::new(Method::GET, raw_path))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Validation(_)),
            "path {raw_path:?} must be rejected before dispatch"
        );
    }
}

#[tokio::test]
async fn crlf_in_extra_header_fails_before_any_request_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let opts = RequestOptions::new().header("X-Extra", "v\r\nX-Injected: 1");
    let err = client.get_account_info(&opts).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "header value must not contain CR or LF characters"
    );
}
