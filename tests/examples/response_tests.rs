use seqmock::prelude::*;

use crate::LOCAL_PREFIX;

#[test]
fn headers_content_and_status_are_sent_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new()
            .send_header("X-Test", "1")
            .content(ResponseContent::new("hello").with_content_type("text/plain"))
            .status(201),
    )
    .unwrap();

    // Act
    let response = reqwest::blocking::get(server.base_url()).unwrap();

    // Assert
    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["x-test"], "1");
    assert_eq!(response.headers()["content-type"], "text/plain");
    assert_eq!(response.text().unwrap(), "hello");
    server.assert_no_errors();
}

#[test]
fn repeated_response_headers_are_all_sent_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new()
            .send_header("Set-Cookie", "a=1")
            .send_header("Set-Cookie", "b=2"),
    )
    .unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/")).unwrap();

    // Assert
    let cookies: Vec<&str> = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);
}

#[test]
fn xml_content_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new().content(ResponseContent::xml(
            "<Response><SpeakSentence>hello</SpeakSentence></Response>",
        )),
    )
    .unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/")).unwrap();

    // Assert
    assert_eq!(
        response.headers()["content-type"],
        "application/xml; charset=utf-8"
    );
    assert_eq!(
        response.text().unwrap(),
        "<Response><SpeakSentence>hello</SpeakSentence></Response>"
    );
}

#[test]
fn invalid_status_code_is_captured_test() {
    // Arrange
    let server = MockServer::start_on(LOCAL_PREFIX, RequestHandler::new().status(42)).unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/")).unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().unwrap(), "");
    assert!(matches!(
        server.error().as_deref(),
        Some(DispatchError::InvalidStatusCode(42))
    ));
}

#[test]
fn wait_for_request_count_test() {
    // Arrange
    let server = MockServer::start_on(LOCAL_PREFIX, RequestHandler::new().status(202)).unwrap();
    let url = server.url("/");

    // Act
    let client = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(50));
        reqwest::blocking::get(url).unwrap().status().as_u16()
    });

    // Assert
    assert!(server.wait_for_request_count(1, std::time::Duration::from_secs(5)));
    assert_eq!(client.join().unwrap(), 202);
    assert!(!server.wait_for_request_count(2, std::time::Duration::from_millis(20)));
}

#[test]
fn content_type_replaces_scripted_header_test() {
    // Arrange
    let server = MockServer::start_on(
        LOCAL_PREFIX,
        RequestHandler::new()
            .send_header("Content-Type", "text/html")
            .content(ResponseContent::xml("<Response/>")),
    )
    .unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/")).unwrap();

    // Assert
    let content_types: Vec<_> = response.headers().get_all("content-type").iter().collect();
    assert_eq!(content_types, vec!["application/xml; charset=utf-8"]);
    server.assert_no_errors();
}
