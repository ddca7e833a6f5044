//! Configuration security tests.
//!
//! Verifies secret handling across config layers and checks for
//! accidental secret exposure through `Debug`.

use racine::config::{Auth, ConfigLoader, Overrides};

/// The config loader strips `jwt_secret` from TOML files before applying
/// environment / CLI overrides.
#[test]
fn jwt_secret_stripped_from_config_file() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[auth]
jwt_secret = "should_be_stripped"
token_expiry_days = 7
"#
    )
    .unwrap();

    let loader = ConfigLoader::new("CFGTEST");
    let config = loader
        .load(
            Some(file.path()),
            &Overrides {
                jwt_secret: Some("cli_override_secret"),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(
        config.auth.jwt_secret, "cli_override_secret",
        "CLI secret must override file secret"
    );
    assert_eq!(config.auth.token_expiry_days, 7);
}

/// A secret that only appears in the config file does not count.
#[test]
fn file_secret_alone_is_rejected() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[auth]\njwt_secret = \"only_in_the_file_and_long_enough!\"").unwrap();

    let result = ConfigLoader::new("CFGTEST_FILEONLY").load(Some(file.path()), &Overrides::default());
    assert!(matches!(result, Err(racine::Error::Config(_))));
}

/// `Debug` output of `Auth` never contains the raw JWT secret.
#[test]
fn debug_output_redacts_jwt_secret() {
    let auth = Auth {
        jwt_secret: "SUPER_SECRET_VALUE".to_string(),
        token_expiry_days: 30,
    };
    let debug_output = format!("{auth:?}");
    assert!(
        !debug_output.contains("SUPER_SECRET_VALUE"),
        "Debug output leaks the JWT secret: {debug_output}"
    );

    let config = racine::Config {
        auth,
        ..Default::default()
    };
    assert!(!format!("{config:?}").contains("SUPER_SECRET_VALUE"));
}
