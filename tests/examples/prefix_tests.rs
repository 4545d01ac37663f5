use seqmock::prelude::*;

#[test]
fn requests_outside_prefix_are_not_dispatched_test() {
    // Arrange
    let server = MockServer::start_on(
        "http://127.0.0.1:0/api/",
        RequestHandler::new().path_and_query("/api/v1/calls"),
    )
    .unwrap();

    // Act
    let outside = reqwest::blocking::get(server.url("/health")).unwrap();
    let inside = reqwest::blocking::get(server.url("/api/v1/calls")).unwrap();

    // Assert
    assert_eq!(outside.status(), 404);
    assert_eq!(inside.status(), 200);
    assert_eq!(server.request_count(), 1);
    server.assert_no_errors();
    assert_eq!(
        server.base_url(),
        format!("http://127.0.0.1:{}/api", server.port())
    );
}

#[test]
fn invalid_prefix_fails_at_construction_test() {
    let result = MockServer::start_on("ftp://127.0.0.1:0/", RequestHandler::new());
    assert!(matches!(result, Err(seqmock::Error::UnsupportedScheme(_))));

    let result = MockServer::start_on("definitely not a url", RequestHandler::new());
    assert!(matches!(result, Err(seqmock::Error::InvalidPrefix(_))));
}

#[test]
fn builder_test() {
    // Arrange
    let server = MockServer::builder()
        .prefix("http://127.0.0.1:0/")
        .shutdown_timeout(std::time::Duration::from_secs(1))
        .start(RequestHandler::new().status(204))
        .unwrap();

    // Act
    let response = reqwest::blocking::get(server.url("/")).unwrap();

    // Assert
    assert_eq!(response.status(), 204);
    assert_eq!(server.address().ip().to_string(), "127.0.0.1");
    assert_ne!(server.port(), 0);
}

#[test]
fn start_uses_prefix_from_environment_test() {
    // Arrange
    std::env::set_var("SEQMOCK_PREFIX", "http://127.0.0.1:0/env/");

    // Act
    let server = MockServer::start(RequestHandler::new().path_and_query("/env/ping")).unwrap();
    let response = reqwest::blocking::get(server.url("/env/ping")).unwrap();

    // Assert
    assert_eq!(response.status(), 200);
    assert_eq!(
        server.base_url(),
        format!("http://127.0.0.1:{}/env", server.port())
    );
    server.assert_no_errors();
    server.assert_request_count(1);
}
