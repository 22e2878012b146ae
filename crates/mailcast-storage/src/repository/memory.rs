//! In-memory settings repository
//!
//! Keeps the whole document in process. Used when no database is
//! configured and as the persistence double in tests.

use crate::models::{SettingsAction, SettingsBundle};
use crate::repository::SettingsRepository;
use async_trait::async_trait;
use mailcast_common::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryState {
    bundle: SettingsBundle,
    journal: Vec<SettingsAction>,
}

/// Memory settings repository
#[derive(Default)]
pub struct MemorySettingsRepository {
    state: Mutex<MemoryState>,
    fail_writes: AtomicBool,
}

impl MemorySettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_bundle(bundle: SettingsBundle) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                bundle,
                journal: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Every action persisted so far, in order
    pub async fn journal(&self) -> Vec<SettingsAction> {
        self.state.lock().await.journal.clone()
    }

    /// Make subsequent writes fail, simulating an unavailable store
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Database("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn load(&self) -> Result<SettingsBundle> {
        Ok(self.state.lock().await.bundle.clone())
    }

    async fn replace(&self, bundle: &SettingsBundle) -> Result<()> {
        self.check_writable()?;
        self.state.lock().await.bundle = bundle.clone();
        Ok(())
    }

    async fn apply(&self, actions: &[SettingsAction]) -> Result<()> {
        self.check_writable()?;

        let mut state = self.state.lock().await;
        let mut next = state.bundle.clone();
        for action in actions {
            next.apply(action)?;
        }
        state.bundle = next;
        state.journal.extend_from_slice(actions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionKind, Template};
    use pretty_assertions::assert_eq;

    fn template(id: &str) -> Template {
        Template {
            id: id.to_string(),
            name: format!("Template {}", id),
            content: "<p>Hi {{name}}</p>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_apply_persists_and_journals() {
        let repo = MemorySettingsRepository::new();
        repo.apply(&[SettingsAction::AddTemplate(template("t1"))])
            .await
            .unwrap();

        let bundle = repo.load().await.unwrap();
        assert_eq!(bundle.templates, vec![template("t1")]);

        let kinds: Vec<ActionKind> = repo.journal().await.iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, vec![ActionKind::AddTemplate]);
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing() {
        let repo = MemorySettingsRepository::new();
        let result = repo
            .apply(&[
                SettingsAction::AddTemplate(template("t1")),
                SettingsAction::DeleteTemplate("missing".to_string()),
            ])
            .await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(repo.load().await.unwrap().templates.is_empty());
        assert!(repo.journal().await.is_empty());
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let repo = MemorySettingsRepository::with_bundle(SettingsBundle {
            templates: vec![template("t1")],
            ..Default::default()
        });
        repo.fail_writes(true);

        let result = repo.replace(&SettingsBundle::default()).await;
        assert!(matches!(result, Err(Error::Database(_))));
        assert_eq!(repo.load().await.unwrap().templates.len(), 1);

        repo.fail_writes(false);
        repo.replace(&SettingsBundle::default()).await.unwrap();
        assert!(repo.load().await.unwrap().templates.is_empty());
    }
}
