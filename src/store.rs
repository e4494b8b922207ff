use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::types::{FormDocument, LiveGameUpdate, WatchedEntityId};

/// Document store holding each watched form and its games.
#[async_trait]
pub trait FormStore: Send + Sync {
    async fn get(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError>;

    /// Point update of the single game whose fixture id matches.
    /// Sibling games are left untouched.
    async fn update_nested_game(
        &self,
        id: &WatchedEntityId,
        fixture_id: &str,
        update: &LiveGameUpdate,
    ) -> Result<(), StoreError>;

    async fn exists(&self, id: &WatchedEntityId) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Insert or replace a whole document.
    async fn insert(&self, doc: FormDocument) -> Result<(), StoreError>;

    async fn remove(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError>;
}

/// Read a JSON array of forms from disk.
pub fn load_forms(path: &Path) -> Result<Vec<FormDocument>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let docs: Vec<FormDocument> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(docs)
}

/// In-process store keyed by form id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    forms: RwLock<HashMap<WatchedEntityId, FormDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON file containing an array of forms.
    pub fn load_json(path: &Path) -> Result<Self> {
        Ok(Self::from_documents(load_forms(path)?))
    }

    pub fn from_documents(docs: impl IntoIterator<Item = FormDocument>) -> Self {
        let forms = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            forms: RwLock::new(forms),
        }
    }

    /// Snapshot of every stored form id.
    pub async fn ids(&self) -> Vec<WatchedEntityId> {
        let mut ids: Vec<_> = self.forms.read().await.keys().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }
}

#[async_trait]
impl FormStore for MemoryStore {
    async fn get(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError> {
        Ok(self.forms.read().await.get(id).cloned())
    }

    async fn update_nested_game(
        &self,
        id: &WatchedEntityId,
        fixture_id: &str,
        update: &LiveGameUpdate,
    ) -> Result<(), StoreError> {
        let mut forms = self.forms.write().await;
        let doc = forms
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let game = doc
            .games
            .iter_mut()
            .find(|g| g.fixture_id.as_deref() == Some(fixture_id))
            .ok_or_else(|| StoreError::GameNotFound {
                form_id: id.clone(),
                fixture_id: fixture_id.to_string(),
            })?;
        game.apply_live_update(update);
        debug!("[{id}] Stored live update for fixture {fixture_id}");
        Ok(())
    }

    async fn insert(&self, doc: FormDocument) -> Result<(), StoreError> {
        self.forms.write().await.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn remove(&self, id: &WatchedEntityId) -> Result<Option<FormDocument>, StoreError> {
        Ok(self.forms.write().await.remove(id))
    }
}
