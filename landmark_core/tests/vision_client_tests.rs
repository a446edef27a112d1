//! HTTP-level tests of the vision client against a mock server

use landmark_core::error::ServiceError;
use landmark_core::vision::TEXT_HEURISTIC_CONFIDENCE;
use landmark_core::{Error, ImagePayload, LandmarkDetector, Provenance, VisionClient, VisionConfig};
use mockito::{Matcher, Server};

const ANNOTATE_PATH: &str = "/v1/images:annotate";

fn client(server: &Server, api_key: Option<&str>) -> VisionClient {
    VisionClient::new(VisionConfig {
        api_key: api_key.map(str::to_string),
        endpoint: format!("{}{ANNOTATE_PATH}", server.url()),
        ..VisionConfig::default()
    })
    .unwrap()
}

fn service_error(err: Error) -> ServiceError {
    match err {
        Error::Service(inner) => inner,
        other => panic!("expected a service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_detects_landmarks_above_threshold() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::UrlEncoded("key".into(), "secret".into()))
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(r#""content":"AQID""#.into()),
            Matcher::Regex(r#""type":"LANDMARK_DETECTION","maxResults":5"#.into()),
            Matcher::Regex(r#""type":"TEXT_DETECTION","maxResults":10"#.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"responses":[{"landmarkAnnotations":[
                {"mid":"/m/0l3cy","description":"Red Fort","score":0.78},
                {"mid":"/m/01k5","description":"Taj Mahal","score":0.96,
                 "locations":[{"latLng":{"latitude":27.1751,"longitude":78.0421}}]},
                {"description":"Unrelated Tower","score":0.31}
            ]}]}"#,
        )
        .create_async()
        .await;

    let detected = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1, 2, 3]), 5)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(detected.len(), 2);
    assert_eq!(detected[0].name, "Taj Mahal");
    assert_eq!(detected[0].confidence(), 96.0);
    assert_eq!(detected[0].mid.as_deref(), Some("/m/01k5"));
    assert!(detected[0].coordinates.is_some());
    assert_eq!(detected[1].name, "Red Fort");
    assert_eq!(detected[1].provenance, Provenance::Primary);
}

#[tokio::test]
async fn test_text_heuristic_when_no_landmark_annotations() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"responses":[{"textAnnotations":[
                {"description":"Welcome to\nKaziranga National Park\nEntry Gate 2"}
            ]}]}"#,
        )
        .create_async()
        .await;

    let detected = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1, 2, 3]), 5)
        .await
        .unwrap();

    assert_eq!(detected.len(), 1);
    assert_eq!(detected[0].provenance, Provenance::TextHeuristic);
    assert_eq!(detected[0].confidence(), TEXT_HEURISTIC_CONFIDENCE);
    assert!(detected[0].coordinates.is_none());
    assert!(detected[0].name.contains("National Park"));
}

#[tokio::test]
async fn test_nothing_recognizable_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"responses":[{}]}"#)
        .create_async()
        .await;

    let detected = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1, 2, 3]), 5)
        .await
        .unwrap();
    assert!(detected.is_empty());
}

#[tokio::test]
async fn test_missing_key_makes_no_request() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let vision = client(&server, None);
    assert!(!vision.is_ready());
    let err = vision
        .detect(&ImagePayload::Bytes(vec![1]), 5)
        .await
        .unwrap_err();

    mock.assert_async().await;
    assert!(matches!(service_error(err), ServiceError::MissingCredential { .. }));
}

#[tokio::test]
async fn test_http_error_uses_envelope_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":{"code":403,"message":"API key not valid"}}"#)
        .create_async()
        .await;

    let err = client(&server, Some("bad"))
        .detect(&ImagePayload::Bytes(vec![1]), 5)
        .await
        .unwrap_err();

    assert!(err.is_permanent());
    match service_error(err) {
        ServiceError::HttpStatus { code, message, .. } => {
            assert_eq!(code, 403);
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_429_is_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let err = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1]), 5)
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(service_error(err), ServiceError::RateLimited { .. }));
}

#[tokio::test]
async fn test_embedded_error_object_fails() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#)
        .create_async()
        .await;

    let err = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1]), 5)
        .await
        .unwrap_err();
    match service_error(err) {
        ServiceError::Upstream { message, .. } => assert_eq!(message, "Bad image data."),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_quota_error_is_rate_limited() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"responses":[{"error":{"code":8,"message":"Quota exceeded"}}]}"#)
        .create_async()
        .await;

    let err = client(&server, Some("secret"))
        .detect(&ImagePayload::Bytes(vec![1]), 5)
        .await
        .unwrap_err();
    assert!(matches!(service_error(err), ServiceError::RateLimited { .. }));
}

#[tokio::test]
async fn test_url_payload_is_downloaded_then_annotated() {
    let mut server = Server::new_async().await;
    let download = server
        .mock("GET", "/photos/gate.jpg")
        .with_status(200)
        .with_body([1u8, 2, 3])
        .create_async()
        .await;
    let annotate = server
        .mock("POST", ANNOTATE_PATH)
        .match_query(Matcher::Any)
        .match_body(Matcher::Regex(r#""content":"AQID""#.into()))
        .with_status(200)
        .with_body(
            r#"{"responses":[{"landmarkAnnotations":[{"description":"Gateway of India","score":0.9}]}]}"#,
        )
        .create_async()
        .await;

    let url = format!("{}/photos/gate.jpg", server.url());
    let detected = client(&server, Some("secret"))
        .detect(&ImagePayload::Url(url), 3)
        .await
        .unwrap();

    download.assert_async().await;
    annotate.assert_async().await;
    assert_eq!(detected[0].name, "Gateway of India");
}

#[tokio::test]
async fn test_failed_download_is_an_http_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/photos/missing.jpg")
        .with_status(404)
        .create_async()
        .await;

    let url = format!("{}/photos/missing.jpg", server.url());
    let err = client(&server, Some("secret"))
        .detect(&ImagePayload::Url(url), 3)
        .await
        .unwrap_err();
    assert!(matches!(
        service_error(err),
        ServiceError::HttpStatus { code: 404, .. }
    ));
}
