use super::*;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn default_template_matches_retrieval_chat_prompt() {
    let template = PromptTemplate::builtin("retrieval-qa-chat").expect("builtin exists");
    let (system, human) = template.render("doc one\n\ndoc two", "What is ReAct?");

    assert_eq!(
        system,
        "Answer any use questions based solely on the context below:\n\n<context>\ndoc one\n\ndoc two\n</context>"
    );
    assert_eq!(human, "What is ReAct?");
}

#[test]
fn every_builtin_resolves() {
    for id in BUILTIN_TEMPLATES {
        let template = PromptTemplate::builtin(id).expect("builtin exists");
        assert_eq!(template.name, *id);
        assert!(PromptTemplate::new(id.to_string(), template.system, template.human).is_ok());
    }
    assert!(PromptTemplate::builtin("nope").is_none());
}

#[test]
fn placeholders_in_values_are_not_expanded() {
    let template = PromptTemplate::new("t", "ctx: {context}", "q: {input}").expect("valid");
    let (system, human) = template.render("mentions {input} literally", "{context}?");

    assert_eq!(system, "ctx: mentions {input} literally");
    assert_eq!(human, "q: {context}?");
}

#[test]
fn unrelated_braces_are_kept() {
    let template =
        PromptTemplate::new("t", "json {\"a\": 1} {context}", "{input} {x}").expect("valid");
    let (system, human) = template.render("C", "I");

    assert_eq!(system, "json {\"a\": 1} C");
    assert_eq!(human, "I {x}");
}

#[test]
fn missing_placeholder_is_rejected() {
    assert!(matches!(
        PromptTemplate::new("t", "no context here", "{input}"),
        Err(ConfigError::InvalidTemplate(_))
    ));
    assert!(matches!(
        PromptTemplate::new("t", "{context}", "no question"),
        Err(ConfigError::InvalidTemplate(_))
    ));
}

#[test]
fn join_context_uses_blank_lines() {
    let docs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    assert_eq!(join_context(&docs), "a\n\nb\n\nc");
    assert_eq!(join_context(&[]), "");
}

#[test]
fn resolves_template_file_relative_to_base_dir() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    std::fs::create_dir_all(temp_dir.path().join("prompts")).expect("should create dir");
    std::fs::write(
        temp_dir.path().join("prompts/terse.toml"),
        "system = \"Context:\\n{context}\"\nhuman = \"Q: {input}\"\n",
    )
    .expect("should write template");

    let config = PromptConfig {
        template: "retrieval-qa-chat".to_string(),
        template_file: Some(PathBuf::from("prompts/terse.toml")),
    };

    let template = PromptTemplate::resolve(&config, temp_dir.path()).expect("template resolves");

    assert_eq!(template.name, "terse");
    assert_eq!(template.render("C", "I"), ("Context:\nC".to_string(), "Q: I".to_string()));
}

#[test]
fn unknown_builtin_is_config_error() {
    let config = PromptConfig {
        template: "mystery".to_string(),
        template_file: None,
    };

    assert!(matches!(
        PromptTemplate::resolve(&config, Path::new(".")),
        Err(ConfigError::InvalidTemplate(_))
    ));
}
