//! Error information-disclosure tests.
//!
//! `Error::into_response` must never forward internal details (SQL
//! fragments, file paths) to the HTTP client, while authorization denials
//! keep their explanatory message.

use racine::{Denial, Error};

fn body_of(err: Error) -> String {
    let body = err.into_response().into_body();
    let bytes = tokio_test::block_on(http_body_util::BodyExt::collect(body))
        .unwrap()
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Errors created with `Error::Internal(...)` do not reach the caller.
#[test]
fn internal_error_hides_sql() {
    let body_str = body_of(Error::Internal(
        "Failed to query SELECT * FROM users WHERE id = 'x'".into(),
    ));
    assert!(
        !body_str.contains("SELECT"),
        "SQL fragment leaked to client: {body_str}"
    );
    assert!(
        body_str.contains("Internal server error"),
        "Expected generic error message, got: {body_str}"
    );
}

/// `Error::Io` wraps an `std::io::Error` whose message often contains
/// filesystem paths.
#[test]
fn io_error_hides_paths() {
    let io_err = std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "No such file: /etc/secret/config.toml",
    );
    let body_str = body_of(Error::Io(io_err));
    assert!(
        !body_str.contains("/etc/secret"),
        "Filesystem path leaked to client: {body_str}"
    );
    assert!(body_str.contains("Internal server error"));
}

/// Ownership denials name the resource kind but no record data.
#[test]
fn denial_message_names_only_the_resource_kind() {
    let body_str = body_of(Error::from(Denial::NotOwner { resource: "tree" }));
    assert!(
        body_str.contains("not the owner of this tree"),
        "Expected ownership denial message, got: {body_str}"
    );
}
