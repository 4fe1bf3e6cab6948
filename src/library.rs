//! Per-owner document library tying categorization, storage and search together
//!
//! Both the web server and the CLI go through [`Library`].

use crate::categorize::Categorizer;
use crate::config::Config;
use crate::intake::{self, IncomingFile};
use crate::search::{self, SearchFilters};
use crate::stats::{self, StatsOverview};
use crate::storage::{BlobStore, DocumentStore};
use crate::taxonomy::Taxonomy;
use crate::types::{Document, Page};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Listing parameters shared by the list and search operations
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub query: String,
    pub filters: SearchFilters,
    pub offset: usize,
    /// Falls back to the configured default page size
    pub limit: Option<usize>,
}

pub struct Library {
    config: Config,
    taxonomy: Arc<Taxonomy>,
    categorizer: Categorizer,
    store: DocumentStore,
    blobs: BlobStore,
    persist_lock: Mutex<()>,
}

impl Library {
    /// Build a library with an empty store
    pub fn new(config: Config, taxonomy: Arc<Taxonomy>, categorizer: Categorizer) -> Self {
        Self::with_store(config, taxonomy, categorizer, DocumentStore::new())
    }

    pub fn with_store(
        config: Config,
        taxonomy: Arc<Taxonomy>,
        categorizer: Categorizer,
        store: DocumentStore,
    ) -> Self {
        let blobs = BlobStore::new(config.storage.uploads_dir());
        Self {
            config,
            taxonomy,
            categorizer,
            store,
            blobs,
            persist_lock: Mutex::new(()),
        }
    }

    /// Open the library described by `config`: load the taxonomy and, if
    /// persistence is on, the last saved snapshot
    pub async fn open(config: Config) -> Result<Self> {
        let taxonomy = match &config.taxonomy_path {
            Some(path) => Arc::new(Taxonomy::load(path)?),
            None => Arc::new(Taxonomy::builtin()),
        };
        let categorizer = Categorizer::new(taxonomy.clone());

        let snapshot = config.storage.snapshot_path();
        let store = if config.storage.persist && snapshot.exists() {
            let store = DocumentStore::load(&snapshot).await?;
            tracing::info!("Loaded document snapshot from {}", snapshot.display());
            store
        } else {
            if config.storage.persist {
                tracing::warn!("No snapshot at {}, starting empty", snapshot.display());
            }
            DocumentStore::new()
        };

        Ok(Self::with_store(config, taxonomy, categorizer, store))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Validate, categorize and store one incoming file
    pub async fn ingest(&self, owner: &str, file: IncomingFile) -> Result<Document> {
        let mime_type = file.mime_type();
        intake::validate(&file, &mime_type, &self.config.upload)?;

        let categorization = self.categorizer.categorize_opt(file.filename.as_deref(), &mime_type);
        let id = uuid::Uuid::new_v4().to_string();
        let content_hash = self.blobs.put(owner, &id, &file.bytes).await?;

        let document = Document {
            id,
            name: file.name().to_string(),
            mime_type,
            size_bytes: file.size(),
            category: categorization.category_id,
            confidence: categorization.confidence,
            uploaded_at: Utc::now(),
            tags: Vec::new(),
            owner_id: owner.to_string(),
            content_hash: Some(content_hash),
        };

        if let Err(e) = self.store.insert(document.clone()).await {
            self.blobs.remove(owner, &document.id).await?;
            return Err(e);
        }

        tracing::info!(
            owner = owner,
            document = %document.id,
            category = %document.category,
            "Stored {}",
            document.name
        );
        Ok(document)
    }

    /// Ingest several files as one upload. Validation runs on the whole batch
    /// before anything is stored, and a later storage or snapshot failure
    /// removes whatever part of the batch was already stored.
    pub async fn ingest_batch(&self, owner: &str, files: Vec<IncomingFile>) -> Result<Vec<Document>> {
        if files.is_empty() {
            return Err(crate::Error::InvalidInput("No files uploaded".to_string()));
        }
        if files.len() > self.config.upload.max_files {
            return Err(crate::Error::InvalidInput(format!(
                "Too many files: {} (limit {})",
                files.len(),
                self.config.upload.max_files
            )));
        }
        for file in &files {
            intake::validate(file, &file.mime_type(), &self.config.upload)?;
        }

        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            match self.ingest(owner, file).await {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    self.discard(owner, &documents).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.persist().await {
            self.discard(owner, &documents).await;
            return Err(e);
        }
        Ok(documents)
    }

    /// Undo the ingestion of `documents`
    async fn discard(&self, owner: &str, documents: &[Document]) {
        for doc in documents {
            if let Err(e) = self.store.delete(owner, &doc.id).await {
                tracing::warn!(owner = owner, document = %doc.id, "Rollback of record failed: {}", e);
            }
            if let Err(e) = self.blobs.remove(owner, &doc.id).await {
                tracing::warn!(owner = owner, document = %doc.id, "Rollback of content failed: {}", e);
            }
        }
        tracing::warn!(owner = owner, "Discarded {} documents of a failed upload", documents.len());
    }

    /// Filter and page an owner's documents
    pub async fn list(&self, owner: &str, params: &ListParams) -> Page<Document> {
        let documents = self.store.snapshot(owner).await;
        let limit = self.config.search.effective_limit(params.limit);

        let matched: Vec<Document> = search::search(
            &documents,
            &self.taxonomy,
            &params.query,
            Some(&params.filters),
        )
        .into_iter()
        .cloned()
        .collect();

        search::paginate(matched, params.offset, limit)
    }

    pub async fn get(&self, owner: &str, id: &str) -> Result<Document> {
        self.store.get(owner, id).await
    }

    /// A document together with its stored bytes
    pub async fn read_content(&self, owner: &str, id: &str) -> Result<(Document, Vec<u8>)> {
        let document = self.store.get(owner, id).await?;
        let bytes = self.blobs.get(owner, id).await?;
        Ok((document, bytes))
    }

    /// Move a document to another category of the taxonomy
    pub async fn recategorize(&self, owner: &str, id: &str, category: &str) -> Result<Document> {
        if !self.taxonomy.contains(category) {
            return Err(crate::Error::InvalidInput(format!("Unknown category: {}", category)));
        }

        let (previous, document) = self
            .store
            .update(owner, id, |doc| {
                let previous = std::mem::replace(&mut doc.category, category.to_string());
                (previous, doc.clone())
            })
            .await?;

        if let Err(e) = self.persist().await {
            // Only undo if nobody has moved the document again meanwhile
            let undo = self
                .store
                .update(owner, id, |doc| {
                    if doc.category == category {
                        doc.category = previous;
                    }
                })
                .await;
            if let Err(undo_err) = undo {
                tracing::warn!(owner = owner, document = id, "Rollback failed: {}", undo_err);
            }
            return Err(e);
        }

        tracing::info!(owner = owner, document = id, "Recategorized as {}", category);
        Ok(document)
    }

    pub async fn add_tags(&self, owner: &str, id: &str, tags: &[String]) -> Result<Document> {
        let (added, document) = self
            .store
            .update(owner, id, |doc| {
                let before = doc.tags.len();
                doc.add_tags(tags);
                (doc.tags[before..].to_vec(), doc.clone())
            })
            .await?;

        if let Err(e) = self.persist().await {
            let undo = self
                .store
                .update(owner, id, |doc| doc.tags.retain(|t| !added.contains(t)))
                .await;
            if let Err(undo_err) = undo {
                tracing::warn!(owner = owner, document = id, "Rollback failed: {}", undo_err);
            }
            return Err(e);
        }

        Ok(document)
    }

    /// Delete a document and its stored bytes
    pub async fn delete(&self, owner: &str, id: &str) -> Result<Document> {
        let (position, document) = self.store.take(owner, id).await?;

        if let Err(e) = self.persist().await {
            if let Err(undo_err) = self.store.restore(position, document).await {
                tracing::warn!(owner = owner, document = id, "Rollback failed: {}", undo_err);
            }
            return Err(e);
        }

        // The record is gone for good at this point, a stray file is harmless
        if let Err(e) = self.blobs.remove(owner, id).await {
            tracing::warn!(owner = owner, document = id, "Failed to remove content: {}", e);
        }
        tracing::info!(owner = owner, document = id, "Deleted {}", document.name);

        Ok(document)
    }

    pub async fn stats(&self, owner: &str) -> StatsOverview {
        let documents = self.store.snapshot(owner).await;
        stats::overview(&documents, &self.taxonomy, Utc::now())
    }

    /// Write the snapshot if persistence is enabled
    pub async fn persist(&self) -> Result<()> {
        if !self.config.storage.persist {
            return Ok(());
        }
        let _guard = self.persist_lock.lock().await;
        self.store.save(self.config.storage.snapshot_path()).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::categorize::FixedConfidence;
    use tempfile::TempDir;

    pub(crate) fn test_library(temp_dir: &TempDir) -> Library {
        let mut config = Config::default();
        config.storage.data_dir = temp_dir.path().to_path_buf();
        let taxonomy = Arc::new(Taxonomy::builtin());
        let categorizer = Categorizer::with_scorer(taxonomy.clone(), Box::new(FixedConfidence(0.9)));
        Library::new(config, taxonomy, categorizer)
    }

    fn pdf(name: &str) -> IncomingFile {
        IncomingFile::new(name, Some("application/pdf".to_string()), b"%PDF-1.4 test".to_vec())
    }

    #[tokio::test]
    async fn test_ingest_categorizes_and_stores() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);

        let doc = library.ingest("alice", pdf("Passport_Copy.pdf")).await.unwrap();
        assert_eq!(doc.category, "legal");
        assert_eq!(doc.confidence, 0.9);
        assert_eq!(doc.mime_type, "application/pdf");
        assert_eq!(doc.size_bytes, 13);
        assert!(doc.content_hash.is_some());

        let (stored, bytes) = library.read_content("alice", &doc.id).await.unwrap();
        assert_eq!(stored, doc);
        assert_eq!(bytes, b"%PDF-1.4 test");
    }

    #[tokio::test]
    async fn test_ingest_without_filename_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);

        let file = IncomingFile {
            filename: None,
            declared_type: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        };
        let doc = library.ingest("alice", file).await.unwrap();
        assert_eq!(doc.category, "miscellaneous");
        assert_eq!(doc.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);

        let files = vec![
            pdf("bank_statement.pdf"),
            IncomingFile::new("archive.zip", Some("application/zip".to_string()), b"PK".to_vec()),
        ];
        assert!(matches!(
            library.ingest_batch("alice", files).await,
            Err(crate::Error::UnsupportedFileType(_))
        ));
        assert_eq!(library.store().len("alice").await, 0);

        assert!(library.ingest_batch("alice", Vec::new()).await.is_err());

        let too_many: Vec<IncomingFile> = (0..11).map(|i| pdf(&format!("{}.pdf", i))).collect();
        assert!(matches!(
            library.ingest_batch("alice", too_many).await,
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);

        for i in 0..7 {
            library.ingest("alice", pdf(&format!("bank_statement_{}.pdf", i))).await.unwrap();
        }
        library.ingest("alice", pdf("Passport_Copy.pdf")).await.unwrap();
        library.ingest("bob", pdf("bank_statement_bob.pdf")).await.unwrap();

        let params = ListParams {
            query: "statement".to_string(),
            offset: 5,
            limit: Some(5),
            ..ListParams::default()
        };
        let page = library.list("alice", &params).await;
        assert_eq!(page.total, 7);
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_more);
        assert_eq!(page.items[0].name, "bank_statement_5.pdf");

        let params = ListParams {
            filters: SearchFilters {
                category: Some("legal".to_string()),
                tags: None,
            },
            ..ListParams::default()
        };
        let page = library.list("alice", &params).await;
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 50);
    }

    #[tokio::test]
    async fn test_recategorize() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        let doc = library.ingest("alice", pdf("scan.pdf")).await.unwrap();

        assert!(matches!(
            library.recategorize("alice", &doc.id, "recipes").await,
            Err(crate::Error::InvalidInput(_))
        ));

        let updated = library.recategorize("alice", &doc.id, "medical").await.unwrap();
        let again = library.recategorize("alice", &doc.id, "medical").await.unwrap();
        assert_eq!(updated, again);
        assert_eq!(library.get("alice", &doc.id).await.unwrap().category, "medical");
        // Everything else is untouched
        assert_eq!(updated.name, doc.name);
        assert_eq!(updated.confidence, doc.confidence);
        assert_eq!(updated.uploaded_at, doc.uploaded_at);
    }

    #[tokio::test]
    async fn test_delete_removes_content() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        let doc = library.ingest("alice", pdf("scan.pdf")).await.unwrap();

        library.delete("alice", &doc.id).await.unwrap();
        assert!(matches!(
            library.get("alice", &doc.id).await,
            Err(crate::Error::NotFound(_))
        ));
        assert!(!library.blobs.path_for("alice", &doc.id).exists());
    }

    #[tokio::test]
    async fn test_persist_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        let doc = library.ingest("alice", pdf("lease.pdf")).await.unwrap();
        library.add_tags("alice", &doc.id, &["home".to_string()]).await.unwrap();

        let reopened = Library::open(library.config().clone()).await.unwrap();
        let loaded = reopened.get("alice", &doc.id).await.unwrap();
        assert_eq!(loaded.category, "property");
        assert_eq!(loaded.tags, vec!["home"]);
    }

    /// Occupy the snapshot path with a directory so every save fails
    fn block_snapshot(library: &Library) {
        let path = library.config().storage.snapshot_path();
        if path.is_file() {
            std::fs::remove_file(&path).unwrap();
        }
        std::fs::create_dir_all(&path).unwrap();
    }

    #[tokio::test]
    async fn test_failed_snapshot_discards_upload() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        block_snapshot(&library);

        let result = library
            .ingest_batch("alice", vec![pdf("lease.pdf"), pdf("scan.pdf")])
            .await;
        assert!(result.is_err());
        assert_eq!(library.store().len("alice").await, 0);
        let owner_dir = library.blobs.root().join("alice");
        let leftovers = std::fs::read_dir(&owner_dir).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);

        // A retry after the disk recovers stores each file exactly once
        std::fs::remove_dir(library.config().storage.snapshot_path()).unwrap();
        let docs = library
            .ingest_batch("alice", vec![pdf("lease.pdf"), pdf("scan.pdf")])
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(library.store().len("alice").await, 2);
    }

    #[tokio::test]
    async fn test_failed_snapshot_keeps_previous_state() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        let first = library.ingest("alice", pdf("lease.pdf")).await.unwrap();
        let doc = library.ingest("alice", pdf("scan.pdf")).await.unwrap();
        library.ingest("alice", pdf("receipt.pdf")).await.unwrap();
        library.add_tags("alice", &doc.id, &["old".to_string()]).await.unwrap();
        block_snapshot(&library);

        assert!(library.recategorize("alice", &doc.id, "medical").await.is_err());
        assert!(library
            .add_tags("alice", &doc.id, &["old".to_string(), "new".to_string()])
            .await
            .is_err());
        assert!(library.delete("alice", &doc.id).await.is_err());

        let kept = library.get("alice", &doc.id).await.unwrap();
        assert_eq!(kept.category, "miscellaneous");
        assert_eq!(kept.tags, vec!["old"]);

        let (_, bytes) = library.read_content("alice", &doc.id).await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4 test");

        // Still in its upload slot
        let order: Vec<String> = library.store().snapshot("alice").await.into_iter().map(|d| d.id).collect();
        assert_eq!(order[0], first.id);
        assert_eq!(order[1], doc.id);
    }

    #[tokio::test]
    async fn test_stats() {
        let temp_dir = TempDir::new().unwrap();
        let library = test_library(&temp_dir);
        library.ingest("alice", pdf("lease.pdf")).await.unwrap();
        library.ingest("alice", pdf("scan.pdf")).await.unwrap();

        let stats = library.stats("alice").await;
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.categorized_documents, 1);
        assert_eq!(stats.organization_score, 50);
        assert_eq!(stats.recent_uploads, 2);
    }
}
