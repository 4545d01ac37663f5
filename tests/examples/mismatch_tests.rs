use seqmock::prelude::*;

use crate::LOCAL_PREFIX;

#[test]
fn path_mismatch_is_captured_test() {
    let _ = env_logger::try_init();

    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new()
            .path_and_query("/v1/users/u-1/calls")
            .send_header("X-Test", "1")
            .content(ResponseContent::text("never sent"))
            .status(201),
    )
    .unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/v1/users/u-1/bridges")).unwrap();

    // Assert: the client still gets a complete, empty default answer
    assert_eq!(response.status(), 200);
    assert!(response.headers().get("x-test").is_none());
    assert_eq!(response.text().unwrap(), "");

    assert_eq!(server.request_count(), 1);
    match server.error().as_deref() {
        Some(DispatchError::Mismatch {
            index,
            field,
            expected,
            actual,
        }) => {
            assert_eq!(*index, 0);
            assert_eq!(*field, MismatchField::PathAndQuery);
            assert_eq!(expected, "/v1/users/u-1/calls");
            assert_eq!(actual.as_deref(), Some("/v1/users/u-1/bridges"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn default_method_rejects_post_test() {
    // Arrange
    let server = MockServer::start_on(LOCAL_PREFIX, RequestHandler::new()).unwrap();

    // Act
    let response = reqwest::blocking::Client::new()
        .post(server.url("/"))
        .body("payload")
        .send()
        .unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert!(matches!(
        server.error().as_deref(),
        Some(DispatchError::Mismatch {
            field: MismatchField::Method,
            ..
        })
    ));
}

#[test]
fn any_method_accepts_post_test() {
    // Arrange
    let server = MockServer::start_on(LOCAL_PREFIX, RequestHandler::new().any_method()).unwrap();

    // Act
    let response = reqwest::blocking::Client::new()
        .post(server.url("/"))
        .send()
        .unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    server.assert_no_errors();
}

#[test]
fn sequence_continues_after_mismatch_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        vec![
            RequestHandler::new().header("X-Api-Key", "secret"),
            RequestHandler::new().path_and_query("/after").status(202),
        ],
    )
    .unwrap();
    let client = reqwest::blocking::Client::new();

    // Act
    let first = client.get(server.url("/before")).send().unwrap();
    let second = client.get(server.url("/after")).send().unwrap();

    // Assert
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 202);
    assert_eq!(server.request_count(), 2);

    let errors = server.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].to_string(),
        "request[0]: header 'X-Api-Key' mismatch: expected \"secret\", received <absent>"
    );
}

#[test]
fn errors_keep_their_order_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        vec![
            RequestHandler::new().path_and_query("/a"),
            RequestHandler::new().path_and_query("/b"),
        ],
    )
    .unwrap();
    let client = reqwest::blocking::Client::new();

    // Act
    client.get(server.url("/x")).send().unwrap();
    client.get(server.url("/y")).send().unwrap();

    // Assert
    let indexes: Vec<usize> = server
        .errors()
        .iter()
        .filter_map(|err| match **err {
            DispatchError::Mismatch { index, .. } => Some(index),
            _ => None,
        })
        .collect();
    assert_eq!(indexes, vec![0, 1]);
    assert!(matches!(
        server.error().as_deref(),
        Some(DispatchError::Mismatch { index: 1, .. })
    ));
}

#[test]
#[should_panic(expected = "Body Mismatch (request[0])")]
fn assert_no_errors_reports_body_mismatch_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new().method("PUT").body("<Response><Hangup/></Response>"),
    )
    .unwrap();

    // Act
    reqwest::blocking::Client::new()
        .put(server.url("/"))
        .body("<Response><Pause/></Response>")
        .send()
        .unwrap();

    // Assert
    server.assert_no_errors();
}
