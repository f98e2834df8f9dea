use super::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            ollama: OllamaConfig {
                protocol: "https".to_string(),
                host: "test-host".to_string(),
                port: 8080,
                embedding_model: "test-embed".to_string(),
                generation_model: "test-chat".to_string(),
                batch_size: 32,
                timeout_seconds: 10,
                retry_attempts: 2,
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [ollama
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [ollama]
            host = "custom-host"

            [chunking]
            window = 1000
        "#;

        let config: Config = toml::from_str(partial_toml).expect("partial config should parse");
        assert_eq!(config.ollama.host, "custom-host");
        assert_eq!(config.ollama.port, 11434);
        assert_eq!(config.chunking.window, 1000);
        assert_eq!(config.chunking.overlap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation_edge_cases() {
        let config = Config {
            ollama: OllamaConfig {
                host: String::new(),
                port: 80,
                ..OllamaConfig::default()
            },
            ..Config::default()
        };

        let result = config.validate();
        assert!(result.is_err()); // Empty host should be invalid
    }

    #[test]
    fn ollama_url_generation_with_different_hosts() {
        let configs = vec![
            ("http", "localhost", 11434, "http://localhost:11434/"),
            ("http", "127.0.0.1", 8080, "http://127.0.0.1:8080/"),
            (
                "https",
                "secure.example.com",
                443,
                "https://secure.example.com/",
            ),
        ];

        for (protocol, host, port, expected_url) in configs {
            let config = Config {
                ollama: OllamaConfig {
                    protocol: protocol.to_string(),
                    host: host.to_string(),
                    port,
                    ..OllamaConfig::default()
                },
                ..Config::default()
            };

            let url = config.ollama_url().expect("ollama_url is ok");
            assert_eq!(url.as_str(), expected_url);
        }
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidProtocol("ftp".to_string()),
            ConfigError::InvalidPort(0),
            ConfigError::InvalidBatchSize(0),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidOverlap {
                overlap: 5,
                window: 5,
            },
            ConfigError::DirectoryError,
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(message.len() > 10); // Ensure meaningful error messages
        }
    }

    #[test]
    fn explicit_home_wins() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let home = resolve_home(Some(temp_dir.path())).expect("explicit home resolves");
        assert_eq!(home, temp_dir.path());
    }

    #[test]
    #[serial]
    fn home_from_environment() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var(settings::HOME_ENV_VAR, temp_dir.path());
        }
        let home = resolve_home(None);
        // SAFETY: as above
        unsafe {
            std::env::remove_var(settings::HOME_ENV_VAR);
        }

        assert_eq!(home.expect("env home resolves"), Path::new(temp_dir.path()));
    }

    #[test]
    #[serial]
    fn home_defaults_to_platform_data_dir() {
        let saved = std::env::var_os(settings::HOME_ENV_VAR);
        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::remove_var(settings::HOME_ENV_VAR);
        }
        let home = resolve_home(None);
        if let Some(value) = saved {
            // SAFETY: as above
            unsafe {
                std::env::set_var(settings::HOME_ENV_VAR, value);
            }
        }

        match dirs::data_dir() {
            Some(dir) => assert_eq!(home.expect("default home resolves"), dir.join("log-qa")),
            None => assert!(matches!(home, Err(ConfigError::DirectoryError))),
        }
    }
}
