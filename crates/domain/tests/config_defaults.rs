use vb_domain::config::Config;

fn minimal_toml() -> &'static str {
    r#"
        [llm]
        ws_url = "wss://api.openai.com/v1/realtime"

        [order_backend]
        base_url = "https://backend.example.com"

        [carrier]
        account_sid = "AC123"
        from_number = "+15005550006"
        public_host = "bridge.example.com"
    "#
}

#[test]
fn default_host_is_wildcard() {
    let config = Config::load_from_str(minimal_toml()).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 8080);
}

#[test]
fn explicit_host_and_port_override_defaults() {
    let toml_str = format!(
        "{}\n[server]\nhost = \"127.0.0.1\"\nport = 3210\n",
        minimal_toml()
    );
    let config = Config::load_from_str(&toml_str).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3210);
}

#[test]
fn required_sections_missing_from_toml_fail_to_parse() {
    let err = Config::load_from_str("[server]\nport = 9000\n");
    assert!(err.is_err());
}
