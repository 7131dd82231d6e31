use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use scamwatch::auth::{CredentialStore, PasswordHasher};
use scamwatch::bot::CommandDispatcher;
use scamwatch::bot::replies;
use scamwatch::chat::InboundMessage;
use scamwatch::history::InteractionLog;
use scamwatch::providers::{CompletionProvider, ProviderError};
use scamwatch::session::{Identity, InactivitySweeper, SessionRegistry, SessionStatus};
use scamwatch::storage::{FileStore, MemoryStore, Store};
use scamwatch::utils::ScamWatchError;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Answers every prompt with "re: <prompt>"
struct EchoProvider;

#[async_trait]
impl CompletionProvider for EchoProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        Ok(format!("re: {prompt}"))
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

struct Bot {
    registry: Arc<SessionRegistry>,
    history: Arc<InteractionLog>,
    dispatcher: CommandDispatcher,
}

fn bot_on(store: Arc<dyn Store>, cap: usize) -> Bot {
    let credentials = Arc::new(CredentialStore::new(
        Arc::clone(&store),
        PasswordHasher::minimal(),
    ));
    let registry = Arc::new(SessionRegistry::new(Arc::clone(&store), credentials));
    let history = Arc::new(InteractionLog::new(store, NonZeroUsize::new(cap).unwrap()));
    let dispatcher = CommandDispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&history),
        Arc::new(EchoProvider),
    );
    Bot {
        registry,
        history,
        dispatcher,
    }
}

impl Bot {
    async fn say(&self, chat: &str, text: &str) -> String {
        self.dispatcher
            .handle(&InboundMessage::new("telegram", chat, text))
            .await
    }
}

#[tokio::test]
async fn test_alice_session_lifecycle() {
    let bot = bot_on(Arc::new(MemoryStore::new()), 10);
    let chat = Identity::from("1001");

    assert_eq!(bot.say("1001", "/register alice pw1").await, replies::REGISTER_SUCCESS);
    let first = bot.registry.current(&chat).await.unwrap().unwrap();
    assert_eq!(first.status, SessionStatus::Active);
    assert_eq!(first.username, "alice");

    let err = bot.registry.start_session(&chat, "alice").await.unwrap_err();
    assert!(matches!(err, ScamWatchError::AlreadyLoggedIn { .. }));

    assert_eq!(bot.say("1001", "/logout").await, replies::LOGOUT_SUCCESS);
    assert!(bot.registry.current(&chat).await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(bot.say("1001", "/login alice pw1").await.starts_with("Login successful!"));
    let second = bot.registry.current(&chat).await.unwrap().unwrap();
    assert_eq!(second.status, SessionStatus::Active);
    assert!(second.started_at > first.started_at);
}

#[tokio::test]
async fn test_history_cap_keeps_latest() {
    let bot = bot_on(Arc::new(MemoryStore::new()), 2);
    bot.say("2002", "/register bob pw").await;

    for request in ["r1", "r2", "r3"] {
        assert_eq!(bot.say("2002", request).await, format!("re: {request}"));
    }

    let kept: Vec<String> = bot
        .history
        .recent("bob", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.request_text)
        .collect();
    assert_eq!(kept, vec!["r2", "r3"]);
}

#[tokio::test]
async fn test_idle_session_is_swept_and_gated() {
    let bot = bot_on(Arc::new(MemoryStore::new()), 10);
    let chat = Identity::from("3003");
    bot.say("3003", "/register carol pw").await;

    let sweeper = InactivitySweeper::new(
        Arc::clone(&bot.registry),
        Duration::from_secs(60),
        Duration::from_secs(60),
    );

    // Nothing is idle yet
    let report = sweeper.run_cycle().await.unwrap();
    assert_eq!(report.expired, 0);

    let later = Utc::now() + ChronoDuration::seconds(61);
    let report = sweeper.sweep_at(later).await.unwrap();
    assert_eq!(report.expired, 1);
    assert!(bot.registry.current(&chat).await.unwrap().is_none());

    assert_eq!(bot.say("3003", "/tips").await, replies::NOT_LOGGED_IN);
    assert!(bot.say("3003", "/login carol pw").await.starts_with("Login successful!"));
}

#[tokio::test]
async fn test_users_isolated_across_chats() {
    let bot = bot_on(Arc::new(MemoryStore::new()), 10);
    bot.say("1", "/register alice pw").await;
    bot.say("2", "/register bob pw").await;

    bot.say("1", "alice question").await;
    bot.say("2", "bob question").await;

    assert!(bot.say("1", "/history").await.contains("alice question"));
    assert!(!bot.say("1", "/history").await.contains("bob question"));
}

#[tokio::test]
async fn test_file_store_keeps_accounts_and_history_across_restart() {
    let dir = TempDir::new().unwrap();
    {
        let store: Arc<dyn Store> = Arc::new(FileStore::open(dir.path()).await.unwrap());
        let bot = bot_on(store, 10);
        bot.say("1", "/register alice pw").await;
        bot.say("1", "remember me").await;
    }

    let store: Arc<dyn Store> = Arc::new(FileStore::open(dir.path()).await.unwrap());
    let bot = bot_on(store, 10);

    // The session survived too; a new chat must log in with the stored password
    assert_eq!(
        bot.say("9", "/login alice wrong").await,
        "Invalid username or password. Please try again."
    );
    assert!(bot.say("9", "/login alice pw").await.starts_with("Login successful!"));
    assert!(bot.say("9", "/history").await.contains("remember me"));
}
