use super::*;
use tempfile::TempDir;

#[test]
fn push_keeps_chronological_order() {
    let mut conversation = Conversation::new(10);
    conversation.push(ChatTurn::new("q1", "a1"));
    conversation.push(ChatTurn::new("q2", "a2"));

    let questions: Vec<&str> = conversation.turns().map(|t| t.question.as_str()).collect();
    assert_eq!(questions, vec!["q1", "q2"]);
    assert_eq!(conversation.len(), 2);
}

#[test]
fn oldest_turn_is_evicted_when_full() {
    let mut conversation = Conversation::new(2);
    assert!(conversation.push(ChatTurn::new("q1", "a1")).is_none());
    assert!(conversation.push(ChatTurn::new("q2", "a2")).is_none());

    let evicted = conversation
        .push(ChatTurn::new("q3", "a3"))
        .expect("oldest evicted");

    assert_eq!(evicted.question, "q1");
    assert_eq!(conversation.len(), 2);
    assert_eq!(conversation.evicted(), 1);
    assert_eq!(conversation.recent(5)[0].question, "q2");
}

#[test]
fn zero_capacity_is_raised_to_one() {
    let mut conversation = Conversation::new(0);
    conversation.push(ChatTurn::new("q1", "a1"));
    conversation.push(ChatTurn::new("q2", "a2"));

    assert_eq!(conversation.max_turns(), 1);
    assert_eq!(conversation.len(), 1);
}

#[test]
fn recent_returns_tail() {
    let mut conversation = Conversation::new(10);
    for i in 0..4 {
        conversation.push(ChatTurn::new(format!("q{}", i), format!("a{}", i)));
    }

    let recent: Vec<String> = conversation
        .recent(2)
        .into_iter()
        .map(|t| t.question)
        .collect();
    assert_eq!(recent, vec!["q2", "q3"]);
    assert!(conversation.recent(0).is_empty());
}

#[test]
fn transcript_ends_with_pending_exchange() {
    let mut conversation = Conversation::new(10);
    conversation.push(ChatTurn::new("What is ReAct?", "A prompting method."));

    let transcript = conversation.transcript(Some(("Who wrote it?", None)));

    assert_eq!(
        transcript,
        "You: What is ReAct?\nAssistant: A prompting method.\n\nYou: Who wrote it?\nAssistant: ...\n\n"
    );
    assert_eq!(Conversation::new(1).transcript(None), "");
}

#[tokio::test]
async fn in_memory_session_records_turns() {
    let mut session = ChatSession::start(None, 3, None)
        .await
        .expect("session starts");

    session
        .record(ChatTurn::new("q", "a"))
        .await
        .expect("turn recorded");

    assert!(!session.is_persistent());
    assert_eq!(session.conversation().len(), 1);
}

#[tokio::test]
async fn persisted_session_can_be_resumed() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("database opens");

    let mut session = ChatSession::start(Some(database.clone()), 10, Some("paper"))
        .await
        .expect("session starts");
    for i in 0..3 {
        session
            .record(ChatTurn::new(format!("q{}", i), format!("a{}", i)))
            .await
            .expect("turn recorded");
    }
    let id = session.conversation().id().to_string();

    let resumed = ChatSession::resume(database, &id, 2)
        .await
        .expect("session resumes");

    let questions: Vec<&str> = resumed
        .conversation()
        .turns()
        .map(|t| t.question.as_str())
        .collect();
    assert_eq!(questions, vec!["q1", "q2"]);
    assert_eq!(resumed.conversation().id(), id);
}

#[tokio::test]
async fn resuming_unknown_session_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let database = Database::initialize_from_config_dir(temp_dir.path())
        .await
        .expect("database opens");

    assert!(matches!(
        ChatSession::resume(database, "missing", 5).await,
        Err(RagError::Config(_))
    ));
}
