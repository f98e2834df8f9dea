use super::*;
use tempfile::TempDir;

#[test]
fn load_existing_config_falls_back_to_defaults() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::write(temp_dir.path().join("config.toml"), "not [valid toml")
        .expect("should write config");

    let config = load_existing_config(temp_dir.path()).expect("config loaded successfully");
    assert_eq!(config.get_base_dir(), temp_dir.path());
    assert!(!config.ollama.host.is_empty());
    assert!(config.ollama.port > 0);
    assert!(config.ollama.batch_size > 0);
}

#[test]
fn model_names_must_not_be_blank() {
    assert!(non_empty(&"llama3.2".to_string()).is_ok());
    assert!(non_empty(&"   ".to_string()).is_err());
}

#[test]
fn unreachable_server_fails_connection_test() {
    let ollama = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    assert!(!test_ollama_connection(&ollama));
}
