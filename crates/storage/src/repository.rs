use async_trait::async_trait;
use quiz_core::model::{CompletionSummary, ModuleId, QuizModule, RewardOverride};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::catalog::Catalog;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Storage identifier for a persisted completion.
///
/// `i64` to match `SQLite` row ids.
pub type CompletionId = i64;

/// A persisted completion together with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRow {
    pub id: CompletionId,
    pub summary: CompletionSummary,
}

impl CompletionRow {
    #[must_use]
    pub fn new(id: CompletionId, summary: CompletionSummary) -> Self {
        Self { id, summary }
    }
}

/// Read access to quiz content.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// Fetch a module by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no module has that id.
    async fn get_module(&self, id: &ModuleId) -> Result<Arc<QuizModule>, StorageError>;

    /// All modules in catalog order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backing store cannot be read.
    async fn list_modules(&self) -> Result<Vec<Arc<QuizModule>>, StorageError>;
}

/// The "game data" lookup: reward overrides keyed by an opaque string.
#[async_trait]
pub trait RewardOverrideRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` for backend failures; a missing key is `Ok(None)`.
    async fn get_override(&self, key: &str) -> Result<Option<RewardOverride>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the override cannot be stored.
    async fn set_override(&self, key: &str, value: RewardOverride) -> Result<(), StorageError>;
}

/// Completed runs handed off by the session layer.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Persist a completion and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the completion cannot be stored.
    async fn append_completion(
        &self,
        summary: &CompletionSummary,
    ) -> Result<CompletionId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn get_completion(&self, id: CompletionId) -> Result<CompletionSummary, StorageError>;

    /// Newest first, at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn list_completions(
        &self,
        module_id: &ModuleId,
        limit: u32,
    ) -> Result<Vec<CompletionRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    modules: Arc<Mutex<Catalog>>,
    overrides: Arc<Mutex<HashMap<String, RewardOverride>>>,
    completions: Arc<Mutex<Vec<CompletionRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_catalog(catalog: Catalog) -> Self {
        Self {
            modules: Arc::new(Mutex::new(catalog)),
            ..Self::default()
        }
    }

    /// Add a module; an existing id is a conflict.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is taken.
    pub fn insert_module(&self, module: QuizModule) -> Result<(), StorageError> {
        let mut guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.insert(module) {
            Ok(())
        } else {
            Err(StorageError::Conflict)
        }
    }
}

#[async_trait]
impl ModuleRepository for InMemoryRepository {
    async fn get_module(&self, id: &ModuleId) -> Result<Arc<QuizModule>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).ok_or(StorageError::NotFound)
    }

    async fn list_modules(&self) -> Result<Vec<Arc<QuizModule>>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.modules().to_vec())
    }
}

#[async_trait]
impl RewardOverrideRepository for InMemoryRepository {
    async fn get_override(&self, key: &str) -> Result<Option<RewardOverride>, StorageError> {
        let guard = self
            .overrides
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).copied())
    }

    async fn set_override(&self, key: &str, value: RewardOverride) -> Result<(), StorageError> {
        let mut guard = self
            .overrides
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.to_owned(), value);
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn append_completion(
        &self,
        summary: &CompletionSummary,
    ) -> Result<CompletionId, StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = guard.last().map_or(1, |row| row.id + 1);
        guard.push(CompletionRow::new(id, summary.clone()));
        Ok(id)
    }

    async fn get_completion(&self, id: CompletionId) -> Result<CompletionSummary, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.summary.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_completions(
        &self,
        module_id: &ModuleId,
        limit: u32,
    ) -> Result<Vec<CompletionRow>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<CompletionRow> = guard
            .iter()
            .filter(|row| row.summary.module_id() == module_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.summary
                .completed_at()
                .cmp(&a.summary.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub modules: Arc<dyn ModuleRepository>,
    pub overrides: Arc<dyn RewardOverrideRepository>,
    pub completions: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory(catalog: Catalog) -> Self {
        let repo = InMemoryRepository::with_catalog(catalog);
        let modules: Arc<dyn ModuleRepository> = Arc::new(repo.clone());
        let overrides: Arc<dyn RewardOverrideRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo);
        Self {
            modules,
            overrides,
            completions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{QuizOutcome, Reward};
    use quiz_core::time::fixed_now;

    fn completion(module: &str, minutes: i64, correct: u32) -> CompletionSummary {
        let started = fixed_now();
        let outcome = QuizOutcome {
            total_stages: 5,
            correct_count: correct,
            passed: correct == 5,
            reward: Reward::new(if correct == 5 { 20 } else { 0 }, 0),
        };
        CompletionSummary::from_outcome(
            ModuleId::from(module),
            started,
            started + Duration::minutes(minutes),
            &outcome,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn builtin_catalog_is_served() {
        let repo = InMemoryRepository::with_catalog(Catalog::builtin().unwrap());
        let module = repo
            .get_module(&ModuleId::from("AvoidingPanicDecisions"))
            .await
            .unwrap();
        assert_eq!(module.total_stages(), 5);
        assert!(matches!(
            repo.get_module(&ModuleId::from("Nope")).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn completions_list_newest_first_per_module() {
        let repo = InMemoryRepository::new();
        repo.append_completion(&completion("A", 1, 5)).await.unwrap();
        repo.append_completion(&completion("B", 2, 5)).await.unwrap();
        let latest = repo.append_completion(&completion("A", 3, 4)).await.unwrap();

        let rows = repo.list_completions(&ModuleId::from("A"), 10).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, latest);
        assert!(!rows[0].summary.passed());

        let limited = repo.list_completions(&ModuleId::from("A"), 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn overrides_round_trip() {
        let repo = InMemoryRepository::new();
        assert_eq!(repo.get_override("k").await.unwrap(), None);
        repo.set_override("k", Reward::new(30, 15)).await.unwrap();
        assert_eq!(
            repo.get_override("k").await.unwrap(),
            Some(Reward::new(30, 15))
        );
    }
}
