use super::*;

#[test]
fn defaults_match_documented_values() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.feed.page_size.get(), 10);
    assert_eq!(settings.feed.index_cache_ttl, Duration::from_secs(20));
    assert!(settings.cache.enabled);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
    assert!(settings.database.url.is_none());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.feed.page_size = Some(25);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        feed_page_size: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.feed.page_size.get(), 5);
}

#[test]
fn unset_overrides_keep_file_values() {
    let mut raw = RawSettings::default();
    raw.feed.index_cache_seconds = Some(60);
    raw.apply_serve_overrides(&ServeOverrides::default());

    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.feed.index_cache_ttl, Duration::from_secs(60));
}

#[test]
fn zero_page_size_is_rejected() {
    let mut raw = RawSettings::default();
    raw.feed.page_size = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero page size");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "feed.page_size",
            ..
        }
    ));
}

#[test]
fn zero_index_cache_ttl_is_rejected() {
    let mut raw = RawSettings::default();
    raw.feed.index_cache_seconds = Some(0);

    let err = Settings::from_raw(raw).expect_err("zero ttl");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "feed.index_cache_seconds",
            ..
        }
    ));
}

#[test]
fn bcrypt_cost_out_of_range_is_rejected() {
    let mut raw = RawSettings::default();
    raw.auth.bcrypt_cost = Some(3);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn blank_database_url_is_treated_as_missing() {
    let mut raw = RawSettings::default();
    raw.database.url = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn invalid_log_level_names_the_key() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid level");
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn admin_commands_accept_database_override() {
    let args = CliArgs::try_parse_from([
        "yatube",
        "groups",
        "--database-url",
        "postgres://localhost/yatube",
        "create",
        "--title",
        "Cats",
    ])
    .expect("valid arguments");

    let Some(Command::Groups(groups)) = args.command.as_ref() else {
        panic!("expected groups command");
    };
    assert_eq!(
        groups.database.database_url.as_deref(),
        Some("postgres://localhost/yatube")
    );
    assert!(matches!(
        &groups.command,
        GroupsCommand::Create(CreateGroupArgs { title, slug: None, .. }) if title == "Cats"
    ));

    let mut raw = RawSettings::default();
    raw.apply_database_override(&groups.database);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://localhost/yatube")
    );
}

#[test]
fn serve_is_optional() {
    let args = CliArgs::try_parse_from(["yatube"]).expect("valid arguments");
    assert!(args.command.is_none());

    let args = CliArgs::try_parse_from(["yatube", "serve", "--server-port", "9000", "--log-json", "yes"])
        .expect("valid arguments");
    let Some(Command::Serve(serve)) = args.command else {
        panic!("expected serve command");
    };
    assert_eq!(serve.overrides.server_port, Some(9000));
    assert_eq!(serve.overrides.log_json, Some(true));
}

#[test]
fn posts_delete_parses_uuid() {
    let id = uuid::Uuid::new_v4();
    let id_text = id.to_string();
    let args = CliArgs::try_parse_from(["yatube", "posts", "delete", id_text.as_str()])
        .expect("valid arguments");
    let Some(Command::Posts(posts)) = args.command else {
        panic!("expected posts command");
    };
    let PostsCommand::Delete { post_id } = posts.command;
    assert_eq!(post_id, id);

    assert!(CliArgs::try_parse_from(["yatube", "posts", "delete", "not-a-uuid"]).is_err());
}
