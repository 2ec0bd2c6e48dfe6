#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use taskbreak::ai::{AiError, ChatMessage, CompletionOptions, CompletionProvider};
use taskbreak::db::Database;

type Responder = Box<dyn Fn() -> Result<String, AiError> + Send + Sync>;

/// Completion provider that answers every call from a closure and records
/// what it was asked.
pub struct ScriptedProvider {
    respond: Responder,
    calls: AtomicUsize,
    last_messages: Mutex<Vec<ChatMessage>>,
}

impl ScriptedProvider {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn() -> Result<String, AiError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            last_messages: Mutex::new(Vec::new()),
        })
    }

    pub fn answering(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move || Ok(text.clone()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.last_messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: CompletionOptions,
    ) -> Result<String, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        (self.respond)()
    }
}

pub fn memory_db() -> Database {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    db
}

/// Makes every insert of a task named `name` fail.
pub fn fail_inserts_named(db: &Database, name: &str) {
    db.execute_batch(&format!(
        "CREATE TRIGGER fail_insert BEFORE INSERT ON tasks
         WHEN NEW.name = '{}'
         BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
        name
    ))
    .expect("Failed to create trigger");
}
