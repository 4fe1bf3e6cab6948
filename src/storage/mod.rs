//! Storage layer for document records and uploaded bytes

pub mod blobs;

use crate::types::{CategoryId, Document, DocumentId, OwnerId};
use crate::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub use blobs::BlobStore;

/// One document behind its own lock. `None` once deleted.
type Slot = Arc<Mutex<Option<Document>>>;

/// Upload order plus an id index over the same slots
#[derive(Default)]
struct Slots {
    order: Vec<DocumentId>,
    index: HashMap<DocumentId, Slot>,
}

impl Slots {
    fn in_order(&self) -> Vec<Slot> {
        self.order
            .iter()
            .filter_map(|id| self.index.get(id).cloned())
            .collect()
    }
}

/// An owner's collection
#[derive(Default)]
struct Shelf {
    slots: RwLock<Slots>,
}

impl Shelf {
    async fn slot(&self, id: &str) -> Option<Slot> {
        self.slots.read().await.index.get(id).cloned()
    }
}

/// In-memory document store partitioned by owner
///
/// Every document has its own mutex, so writes to different documents never
/// wait on each other and writes to the same document are serialized. The
/// owner map lock is only held long enough to find a shelf.
#[derive(Default)]
pub struct DocumentStore {
    owners: RwLock<HashMap<OwnerId, Arc<Shelf>>>,
}

impl DocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn shelf(&self, owner: &str) -> Option<Arc<Shelf>> {
        self.owners.read().await.get(owner).cloned()
    }

    async fn shelf_or_create(&self, owner: &str) -> Arc<Shelf> {
        if let Some(shelf) = self.shelf(owner).await {
            return shelf;
        }
        self.owners
            .write()
            .await
            .entry(owner.to_string())
            .or_default()
            .clone()
    }

    async fn slot(&self, owner: &str, id: &str) -> Result<Slot> {
        let shelf = self
            .shelf(owner)
            .await
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;
        shelf
            .slot(id)
            .await
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))
    }

    /// Append a document to its owner's collection
    pub async fn insert(&self, document: Document) -> Result<()> {
        self.insert_at(usize::MAX, document).await
    }

    /// Put a document taken out with [`DocumentStore::take`] back at its old
    /// position, or at the end if the collection has shrunk since
    pub async fn restore(&self, position: usize, document: Document) -> Result<()> {
        self.insert_at(position, document).await
    }

    async fn insert_at(&self, position: usize, document: Document) -> Result<()> {
        let shelf = self.shelf_or_create(&document.owner_id).await;
        let mut slots = shelf.slots.write().await;

        if slots.index.contains_key(&document.id) {
            return Err(crate::Error::InvalidInput(format!(
                "Document {} already exists",
                document.id
            )));
        }

        let position = position.min(slots.order.len());
        slots.order.insert(position, document.id.clone());
        slots
            .index
            .insert(document.id.clone(), Arc::new(Mutex::new(Some(document))));
        Ok(())
    }

    /// Get a copy of one document
    pub async fn get(&self, owner: &str, id: &str) -> Result<Document> {
        let slot = self.slot(owner, id).await?;
        let guard = slot.lock().await;
        guard
            .clone()
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))
    }

    /// Copy of an owner's documents in upload order
    pub async fn snapshot(&self, owner: &str) -> Vec<Document> {
        let Some(shelf) = self.shelf(owner).await else {
            return Vec::new();
        };

        let slots = shelf.slots.read().await.in_order();

        let mut documents = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(doc) = slot.lock().await.as_ref() {
                documents.push(doc.clone());
            }
        }
        documents
    }

    /// Apply `f` to one document while holding its lock
    pub async fn update<F, R>(&self, owner: &str, id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&mut Document) -> R,
    {
        let slot = self.slot(owner, id).await?;
        let mut guard = slot.lock().await;
        match guard.as_mut() {
            Some(doc) => Ok(f(doc)),
            None => Err(crate::Error::NotFound(id.to_string())),
        }
    }

    /// Replace a document's category. Repeating the same update is a no-op.
    pub async fn update_category(
        &self,
        owner: &str,
        id: &str,
        category: CategoryId,
    ) -> Result<Document> {
        self.update(owner, id, move |doc| {
            doc.category = category;
            doc.clone()
        })
        .await
    }

    /// Add tags to a document, skipping ones it already has
    pub async fn add_tags(&self, owner: &str, id: &str, tags: &[String]) -> Result<Document> {
        self.update(owner, id, |doc| {
            doc.add_tags(tags);
            doc.clone()
        })
        .await
    }

    /// Remove a document permanently, returning it
    pub async fn delete(&self, owner: &str, id: &str) -> Result<Document> {
        self.take(owner, id).await.map(|(_, document)| document)
    }

    /// Remove a document, returning it with the position it held in upload
    /// order
    pub async fn take(&self, owner: &str, id: &str) -> Result<(usize, Document)> {
        let shelf = self
            .shelf(owner)
            .await
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;
        let slot = shelf
            .slot(id)
            .await
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;

        // Empty the slot first so writers still holding it see NotFound
        let removed = slot
            .lock()
            .await
            .take()
            .ok_or_else(|| crate::Error::NotFound(id.to_string()))?;

        let mut slots = shelf.slots.write().await;
        slots.index.remove(id);
        let position = slots
            .order
            .iter()
            .position(|slot_id| slot_id == id)
            .unwrap_or(slots.order.len());
        if position < slots.order.len() {
            slots.order.remove(position);
        }

        Ok((position, removed))
    }

    /// Owners with at least one shelf
    pub async fn owners(&self) -> Vec<OwnerId> {
        self.owners.read().await.keys().cloned().collect()
    }

    /// Number of documents an owner has
    pub async fn len(&self, owner: &str) -> usize {
        let Some(shelf) = self.shelf(owner).await else {
            return 0;
        };
        let len = shelf.slots.read().await.order.len();
        len
    }

    /// Whether the store holds no documents at all
    pub async fn is_empty(&self) -> bool {
        for owner in self.owners().await {
            if self.len(&owner).await > 0 {
                return false;
            }
        }
        true
    }

    /// Save the store to disk as JSON
    ///
    /// The file is written next to `path` and renamed into place.
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        let mut owners = self.owners().await;
        owners.sort();

        let mut documents = Vec::new();
        for owner in owners {
            documents.extend(self.snapshot(&owner).await);
        }

        let data = StoreData {
            version: SNAPSHOT_VERSION,
            documents,
        };
        let json = serde_json::to_vec_pretty(&data)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;

        tracing::debug!("Saved {} documents to {}", data.documents.len(), path.display());
        Ok(())
    }

    /// Load a store from disk
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = tokio::fs::read(path.as_ref()).await?;
        let data: StoreData = serde_json::from_slice(&json)?;

        if data.version != SNAPSHOT_VERSION {
            return Err(crate::Error::Config(format!(
                "Unsupported snapshot version {} (expected {})",
                data.version, SNAPSHOT_VERSION
            )));
        }

        let store = Self::new();
        for document in data.documents {
            store.insert(document).await?;
        }
        Ok(store)
    }
}

const SNAPSHOT_VERSION: u32 = 1;

/// Serializable store data
#[derive(serde::Serialize, serde::Deserialize)]
struct StoreData {
    version: u32,
    documents: Vec<Document>,
}
