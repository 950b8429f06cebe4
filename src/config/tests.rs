use super::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::config::settings::CONFIG_DIR_ENV;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.document.path = "papers/react.pdf".into();
        original_config.vector_store.index_name = "papers".to_string();
        original_config.llm.max_tokens = Some(512);
        original_config.prompt.template_file = Some("prompts/strict.toml".into());

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
            [chunking
            chunk_size = "large"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let result: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(result, Config::default());
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [document]
            path = "data/2210.03629v3.pdf"

            [chunking]
            separator = "\n"
            chunk_size = 1000
            chunk_overlap = 200
            oversized_runs = "split"

            [embedding]
            base_url = "https://api.cohere.com"
            model = "embed-english-v3.0"
            batch_size = 96

            [vector_store]
            backend = "pinecone"
            index_name = "rag-demo"
            namespace = "default"
            metric = "cosine"
            cloud = "aws"
            region = "us-east-1"
            top_k = 4

            [llm]
            model = "gemma2-9b-it"
            temperature = 0.1

            [session]
            max_turns = 20
            persist = false
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml correctly");
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "gemma2-9b-it");
        assert_eq!(config.session.max_turns, 20);
        assert!(!config.session.persist);
    }

    #[test]
    fn explicit_config_dir_wins() {
        let dir = resolve_config_dir(Some(Path::new("/tmp/custom")))
            .expect("explicit dir always resolves");
        assert_eq!(dir, Path::new("/tmp/custom"));
    }

    #[test]
    #[serial]
    fn config_dir_from_environment() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");

        // SAFETY: serialized with every other test touching the environment
        unsafe {
            std::env::set_var(CONFIG_DIR_ENV, temp_dir.path());
        }
        let resolved = resolve_config_dir(None);
        unsafe {
            std::env::remove_var(CONFIG_DIR_ENV);
        }

        assert_eq!(
            resolved.expect("env override resolves"),
            temp_dir.path().to_path_buf()
        );
    }
}
