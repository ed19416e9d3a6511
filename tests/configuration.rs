use todoflow::Config;

#[test]
fn default_config_loads_with_expected_ports_and_sidecar() {
    let config = Config::load(None).expect("default config");

    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.ports.command, 8001);
    assert_eq!(config.server.ports.recurring, 8002);
    assert_eq!(config.server.ports.notification, 8003);
    assert_eq!(config.server.ports.gateway, 8004);
    assert_eq!(config.server.ports.audit, 8005);

    assert_eq!(config.sidecar.base_url, "http://localhost:3500");
    assert_eq!(config.sidecar.pubsub, "todo-pubsub");
    assert_eq!(config.sidecar.state_store, "todo-statestore");
    assert_eq!(config.sidecar.command_app_id, "command-service");

    // The secret ships empty; services requiring it refuse to start.
    assert!(config.auth.jwt_secret.is_empty());
}
