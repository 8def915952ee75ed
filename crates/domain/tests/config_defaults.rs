use std::io::Write;

use tb_domain::config::{Config, ConfigSeverity, Vertical};

#[test]
fn default_listens_on_localhost_8000() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8000);
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://localhost:*".to_string()));
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn default_known_servers_cover_three_verticals() {
    let config = Config::default();
    assert_eq!(
        config.discovery.known_servers,
        vec![
            "opc.tcp://localhost:4840",
            "opc.tcp://localhost:4841",
            "opc.tcp://localhost:4842",
        ]
    );
    let verticals: Vec<_> = config.simulator.endpoints.iter().map(|e| e.vertical).collect();
    assert_eq!(
        verticals,
        vec![Vertical::OilGas, Vertical::LifeSciences, Vertical::Discrete]
    );
}

#[test]
fn partial_file_keeps_other_defaults() {
    let config = Config::from_toml_str(
        r#"
[server]
port = 9100

[discovery]
known_servers = ["http://plc-1:4840"]
"#,
    )
    .unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.discovery.known_servers, vec!["http://plc-1:4840"]);
    assert_eq!(config.discovery.endpoint_timeout_ms, 30_000);
    assert_eq!(config.observability.service_name, "tagbridge");
}

#[test]
fn http_known_server_is_accepted_by_validation() {
    let config = Config::from_toml_str(
        r#"
[discovery]
known_servers = ["http://plc-1:4840"]
"#,
    )
    .unwrap();
    assert!(config
        .validate()
        .iter()
        .all(|i| i.severity != ConfigSeverity::Error));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = Config::from_toml_str("[server\nport = ").unwrap_err();
    assert!(err.to_string().starts_with("config:"));
}

#[test]
fn load_missing_file_returns_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.server.port, 8000);
}

#[test]
fn load_reads_file_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[simulator]\nenabled = true\ntick_ms = 250").unwrap();
    let config = Config::load(file.path()).unwrap();
    assert!(config.simulator.enabled);
    assert_eq!(config.simulator.tick_ms, 250);
}
