use super::*;
use std::sync::Mutex;

/// Records the messages it receives and answers with a fixed reply
struct RecordingModel {
    reply: String,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingModel {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl ChatModel for &RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }

    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen
            .lock()
            .expect("lock not poisoned")
            .push(messages.to_vec());
        Ok(self.reply.clone())
    }
}

fn turn(question: &str, answer: &str) -> ChatTurn {
    ChatTurn::new(question, answer)
}

fn default_template() -> PromptTemplate {
    PromptTemplate::builtin("retrieval-qa-chat").expect("builtin exists")
}

#[test]
fn message_constructors_set_roles() {
    assert_eq!(ChatMessage::system("s").role, Role::System);
    assert_eq!(ChatMessage::user("u").role, Role::User);
    assert_eq!(ChatMessage::assistant("a").role, Role::Assistant);
    assert_eq!(
        serde_json::to_value(ChatMessage::user("u")).expect("serializes"),
        serde_json::json!({ "role": "user", "content": "u" })
    );
}

#[test]
fn generator_renders_context_and_question() {
    let model = RecordingModel::new("grounded answer");
    let generator = PromptedGenerator::new(&model, default_template());
    let context = vec!["first doc".to_string(), "second doc".to_string()];

    let answer = generator
        .generate("What is ReAct?", &context, &[])
        .expect("generation succeeds");

    assert_eq!(answer, "grounded answer");
    let seen = model.seen.lock().expect("lock not poisoned");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 2);
    assert!(seen[0][0].content.contains("first doc\n\nsecond doc"));
    assert_eq!(seen[0][1], ChatMessage::user("What is ReAct?"));
}

#[test]
fn history_is_excluded_by_default() {
    let model = RecordingModel::new("a");
    let generator = PromptedGenerator::new(&model, default_template());

    let messages = generator.messages("now?", &[], &[turn("before?", "earlier")]);

    assert_eq!(messages.len(), 2);
}

#[test]
fn recent_history_precedes_question() {
    let model = RecordingModel::new("a");
    let generator = PromptedGenerator::new(&model, default_template()).with_history_turns(2);
    let history = vec![
        turn("q1", "a1"),
        turn("q2", "a2"),
        turn("q3", "a3"),
    ];

    let messages = generator.messages("q4", &["ctx".to_string()], &history);

    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents[1..], ["q2", "a2", "q3", "a3", "q4"]);
    assert_eq!(messages[2].role, Role::Assistant);
    assert_eq!(messages[0].role, Role::System);
}
