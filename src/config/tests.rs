use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.contents.ttl = Some(60);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        contents_ttl_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(
        settings.contents.ttl_for("example", "hour"),
        Ok(Duration::from_secs(5))
    );
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn bundled_storage_defaults_to_postgres() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.storage.content_backend, StorageBackend::Postgres);
    assert_eq!(
        settings.storage.fetch_history_backend,
        StorageBackend::Postgres
    );
    assert!(settings.storage.needs_database());
}

#[test]
fn unbundled_storage_requires_explicit_models() {
    let mut raw = RawSettings::default();
    raw.storage.bundled = Some(false);
    raw.storage.fetch_history_model = Some("memory".to_string());

    let err = Settings::from_raw(raw).expect_err("content model missing");
    match err {
        LoadError::Invalid { key, .. } => assert_eq!(key, "storage.content_model"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn storage_overrides_select_memory_backends() {
    let mut raw = RawSettings::default();
    raw.storage.bundled = Some(false);
    raw.apply_storage_overrides(&StorageOverrides {
        content_model: Some("memory".to_string()),
        fetch_history_model: Some("Memory".to_string()),
        ..Default::default()
    });

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.storage.needs_database());
}

#[test]
fn unknown_storage_backend_is_rejected() {
    let mut raw = RawSettings::default();
    raw.storage.content_model = Some("redis".to_string());

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key, .. }) if key == "storage.content_model"
    ));
}

#[test]
fn content_overrides_are_upper_cased() {
    let mut raw = RawSettings::default();
    raw.contents.nb_contents_kept = Some(15);
    raw.contents
        .overrides
        .insert("example_nb_contents_kept".to_string(), SettingValue::Int(20));
    raw.contents.overrides.insert(
        "example_hour_nb_contents_kept".to_string(),
        SettingValue::Text("30".to_string()),
    );

    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.contents.nb_contents_kept_for("example", "hour"), Ok(30));
    assert_eq!(
        settings.contents.nb_contents_kept_for("example", "french_educ"),
        Ok(20)
    );
    assert_eq!(settings.contents.nb_contents_kept_for("gitlab", "issue"), Ok(15));
}

#[test]
fn malformed_content_override_fails_at_load() {
    let mut raw = RawSettings::default();
    raw.contents.overrides.insert(
        "gitlab_ttl".to_string(),
        SettingValue::Text("soon".to_string()),
    );

    assert!(matches!(
        Settings::from_raw(raw),
        Err(LoadError::Invalid { key, .. }) if key == "contents.overrides.GITLAB_TTL"
    ));
}

#[test]
fn negative_global_retention_is_rejected() {
    let mut raw = RawSettings::default();
    raw.contents.nb_contents_kept = Some(-1);

    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn provider_endpoint_must_be_a_url() {
    let mut raw = RawSettings::default();
    raw.providers.french_educ_endpoint = Some("not a url".to_string());

    assert!(Settings::from_raw(raw).is_err());

    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(
        settings.providers.french_educ_endpoint,
        DEFAULT_FRENCH_EDUC_ENDPOINT
    );
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["dalec"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_refresh_arguments() {
    let args = CliArgs::parse_from([
        "dalec",
        "refresh",
        "example",
        "hour",
        "--channel",
        "quarter",
        "--channel-object",
        "2024-01-01 10:00:00Z",
        "--channel-object",
        "2024-01-02 10:00:00Z",
        "--force",
        "--database-url",
        "postgres://example",
    ]);

    match args.command.expect("refresh command") {
        Command::Refresh(refresh) => {
            assert_eq!(refresh.app, "example");
            assert_eq!(refresh.content_type, "hour");
            assert_eq!(refresh.channel.as_deref(), Some("quarter"));
            assert_eq!(refresh.channel_objects.len(), 2);
            assert!(refresh.force);
            assert!(!refresh.continue_on_error);
            assert_eq!(
                refresh.storage.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_providers_arguments() {
    let args = CliArgs::parse_from(["dalec", "providers", "--autoload"]);
    match args.command.expect("providers command") {
        Command::Providers(providers) => assert!(providers.autoload),
        _ => panic!("wrong command parsed"),
    }
}
