use super::*;

#[test]
fn telemetry_defaults_to_stderr_only() {
    let config: TelemetryConfig = toml::from_str("").unwrap();
    assert_eq!(config.level, "info");
    assert!(config.otlp.is_none());
}

#[test]
fn otlp_section_enables_export() {
    let toml = r#"
        level = "debug"

        [otlp]
        endpoint = "http://otel-collector:4318"
        protocol = "http"
        sample_ratio = 0.25
    "#;
    let config: TelemetryConfig = toml::from_str(toml).unwrap();
    assert_eq!(config.level, "debug");
    let otlp = config.otlp.unwrap();
    assert_eq!(otlp.endpoint, "http://otel-collector:4318");
    assert_eq!(otlp.protocol, OtlpProtocol::Http);
    assert!((otlp.sample_ratio - 0.25).abs() < f64::EPSILON);
    assert_eq!(otlp.timeout_seconds, 10);
}

#[test]
fn empty_otlp_section_uses_defaults() {
    let config: TelemetryConfig = toml::from_str("[otlp]").unwrap();
    let otlp = config.otlp.unwrap();
    assert_eq!(otlp.endpoint, "http://localhost:4317");
    assert_eq!(otlp.protocol, OtlpProtocol::Grpc);
    assert!((otlp.sample_ratio - 1.0).abs() < f64::EPSILON);
}

#[test]
fn unknown_otlp_protocol_fails_to_parse() {
    let err = WorkerConfig::from_toml("[telemetry.otlp]\nprotocol = \"udp\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn empty_file_uses_defaults() {
    let config = WorkerConfig::from_toml("").unwrap();
    assert!(config.directory.pool_id.is_none());
    assert_eq!(config.directory.cognito.aws.region, "us-east-1");
    assert!(config.queue.is_none());
    assert_eq!(config.resolver.max_history, 5);
    assert_eq!(config.resolver.subject_mode, SubjectMode::All);
    assert_eq!(config.consumer.error_backoff(), Duration::from_secs(1));
    assert!(config.telemetry.otlp.is_none());
}

#[test]
fn full_config() {
    let toml = r#"
        [directory]
        pool_id = "eu-west-1_Pool"
        region = "eu-west-1"
        role_arn = "arn:aws:iam::111111111111:role/auth-audit"
        operation_timeout_seconds = 10

        [queue]
        region = "eu-west-1"
        queue_url = "https://sqs.eu-west-1.amazonaws.com/111111111111/auth-events"
        max_messages = 5
        wait_time_seconds = 10

        [resolver]
        max_history = 10
        subject_mode = "last_only"

        [consumer]
        error_backoff_ms = 250
    "#;
    let config = WorkerConfig::from_toml(toml).unwrap();
    assert_eq!(config.directory.pool_id.as_deref(), Some("eu-west-1_Pool"));
    assert_eq!(config.directory.cognito.aws.region, "eu-west-1");
    assert_eq!(
        config.directory.cognito.aws.operation_timeout(),
        Some(Duration::from_secs(10))
    );

    let queue = config.queue_config().unwrap();
    assert_eq!(queue.max_messages, 5);
    assert_eq!(queue.wait_time_seconds, 10);

    let resolver = config.resolver_config(None).unwrap();
    assert_eq!(resolver.pool_id.as_str(), "eu-west-1_Pool");
    assert_eq!(resolver.max_history, 10);
    assert_eq!(resolver.subject_mode, SubjectMode::LastOnly);
    assert_eq!(config.consumer.error_backoff(), Duration::from_millis(250));
}

#[test]
fn missing_pool_id_is_an_error() {
    let config = WorkerConfig::from_toml("").unwrap();
    assert!(matches!(
        config.resolver_config(None),
        Err(ConfigError::MissingPoolId)
    ));
}

#[test]
fn blank_pool_id_is_an_error() {
    let config = WorkerConfig::from_toml("[directory]\npool_id = \"  \"").unwrap();
    assert!(matches!(
        config.pool_id(Some(String::new())),
        Err(ConfigError::MissingPoolId)
    ));
}

#[test]
fn env_pool_id_takes_precedence() {
    let config = WorkerConfig::from_toml("[directory]\npool_id = \"from-file\"").unwrap();
    let pool = config.pool_id(Some("from-env".to_owned())).unwrap();
    assert_eq!(pool.as_str(), "from-env");

    let pool = config.pool_id(Some(" ".to_owned())).unwrap();
    assert_eq!(pool.as_str(), "from-file");
}

#[test]
fn invalid_history_cap_is_rejected() {
    let config =
        WorkerConfig::from_toml("[directory]\npool_id = \"p\"\n[resolver]\nmax_history = 100")
            .unwrap();
    assert!(matches!(
        config.resolver_config(None),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn unknown_subject_mode_fails_to_parse() {
    let err = WorkerConfig::from_toml("[resolver]\nsubject_mode = \"first\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn queue_section_is_required_for_consumer() {
    let config = WorkerConfig::from_toml("").unwrap();
    assert!(matches!(config.queue_config(), Err(ConfigError::Invalid(_))));
}

#[test]
fn invalid_queue_section_is_rejected() {
    let toml = r#"
        [queue]
        queue_url = "https://sqs.us-east-1.amazonaws.com/1/q"
        max_messages = 50
    "#;
    let config = WorkerConfig::from_toml(toml).unwrap();
    assert!(matches!(config.queue_config(), Err(ConfigError::Invalid(_))));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let config = WorkerConfig::load(Path::new("/nonexistent/authtrail.toml")).unwrap();
    assert!(config.directory.pool_id.is_none());
}

#[test]
fn sample_config_file_is_valid() {
    let config = WorkerConfig::from_toml(include_str!("../../../../authtrail.toml")).unwrap();
    assert_eq!(
        config.resolver_config(None).unwrap().pool_id.as_str(),
        "us-east-1_AbCdEfGhI"
    );
    config.queue_config().unwrap();
}
