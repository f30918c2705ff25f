use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_stream::StreamExt;
use tracing::{debug, instrument};

use crate::codec::PayloadCodec;
use crate::error::{QueueError, QueueResult};
use crate::store::{BoxStream, Filter, InsertOutcome, StoreBackend, StoredDoc};
use crate::types::record::FIELD_DATA;
use crate::types::Fingerprint;

/// Collection holding all documents
const COLLECTION: &str = "documents";
/// Secondary-indexed field for reverse resource lookup
const FIELD_RESOURCES: &str = "resources";

/// Lazy stream of decoded documents; finite and non-restartable
pub type DocumentStream<T> = BoxStream<QueueResult<Document<T>>>;

/// A keyed document with the set of resources it references.
///
/// `id` is caller-supplied and globally unique within the store; `resources`
/// backs the reverse lookup "find documents referencing resource X".
#[derive(Debug, Clone, PartialEq)]
pub struct Document<T> {
    pub id: String,
    pub data: T,
    pub resources: BTreeSet<Fingerprint>,
}

impl<T> Document<T> {
    pub fn new<S: Into<String>>(id: S, data: T) -> Self {
        Self {
            id: id.into(),
            data,
            resources: BTreeSet::new(),
        }
    }

    /// Builder-style resource reference
    pub fn with_resource(mut self, resource: Fingerprint) -> Self {
        self.resources.insert(resource);
        self
    }
}

/// Keyed document store with a secondary index on resource fingerprints.
///
/// A thin CRUD layer over the same atomic store the queue uses. Every
/// document handed out by a stream or lookup passes through the codec; raw
/// stored shapes never escape.
pub struct DocumentStore<T, B> {
    backend: Arc<B>,
    codec: Arc<dyn PayloadCodec<T>>,
}

impl<T, B> DocumentStore<T, B>
where
    T: Send + Sync + 'static,
    B: StoreBackend,
{
    /// Open the store, declaring the resource index
    pub async fn new(backend: Arc<B>, codec: Arc<dyn PayloadCodec<T>>) -> QueueResult<Self> {
        backend.ensure_index(COLLECTION, FIELD_RESOURCES).await?;
        Ok(Self { backend, codec })
    }

    /// Store a new document; an existing id fails with
    /// [`QueueError::DocumentExists`]
    #[instrument(skip(self, document), fields(id = %document.id))]
    pub async fn create(&self, document: &Document<T>) -> QueueResult<()> {
        let doc = self.encode_document(document)?;
        match self.backend.insert_unique(COLLECTION, doc).await? {
            InsertOutcome::Inserted => {
                debug!("document created");
                Ok(())
            }
            InsertOutcome::AlreadyExists => Err(QueueError::DocumentExists(document.id.clone())),
        }
    }

    /// Fetch a document by id
    pub async fn retrieve(&self, id: &str) -> QueueResult<Option<Document<T>>> {
        match self.backend.get(COLLECTION, id).await? {
            Some(doc) => Ok(Some(decode_document(self.codec.as_ref(), &doc)?)),
            None => Ok(None),
        }
    }

    /// Overwrite a document unconditionally (upsert; no existence check)
    #[instrument(skip(self, document), fields(id = %document.id))]
    pub async fn update(&self, document: &Document<T>) -> QueueResult<()> {
        let doc = self.encode_document(document)?;
        self.backend.put(COLLECTION, doc).await?;
        Ok(())
    }

    /// Remove a document; a missing id is a no-op
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> QueueResult<()> {
        self.backend.remove_by_id(COLLECTION, id).await?;
        Ok(())
    }

    /// Lazy stream of documents whose resource set contains `resource`,
    /// decoded at consumption time
    pub async fn find_by_resource(&self, resource: &Fingerprint) -> QueueResult<DocumentStream<T>> {
        let filter = Filter::new(FIELD_RESOURCES, Value::from(resource.as_str()));
        self.stream(Some(filter)).await
    }

    /// Lazy stream of every document in the store
    pub async fn iter(&self) -> QueueResult<DocumentStream<T>> {
        self.stream(None).await
    }

    /// Number of stored documents
    pub async fn count(&self) -> QueueResult<u64> {
        Ok(self.backend.count(COLLECTION).await?)
    }

    /// Irrecoverably drop every document and re-declare the resource index
    #[instrument(skip(self))]
    pub async fn clean(&self) -> QueueResult<()> {
        self.backend.drop_collection(COLLECTION).await?;
        self.backend.ensure_index(COLLECTION, FIELD_RESOURCES).await?;
        Ok(())
    }

    async fn stream(&self, filter: Option<Filter>) -> QueueResult<DocumentStream<T>> {
        let raw = self.backend.find(COLLECTION, filter).await?;
        let codec = Arc::clone(&self.codec);
        let decoded = raw.map(move |doc| {
            let doc = doc?;
            decode_document(codec.as_ref(), &doc)
        });
        Ok(Box::pin(decoded))
    }

    fn encode_document(&self, document: &Document<T>) -> QueueResult<StoredDoc> {
        let resources: Vec<Value> = document
            .resources
            .iter()
            .map(|fp| Value::from(fp.as_str()))
            .collect();
        Ok(StoredDoc::new(document.id.as_str())
            .with_field(FIELD_DATA, self.codec.encode(&document.data)?)
            .with_field(FIELD_RESOURCES, Value::Array(resources)))
    }
}

fn decode_document<T>(codec: &dyn PayloadCodec<T>, doc: &StoredDoc) -> QueueResult<Document<T>> {
    let data_value = doc
        .get(FIELD_DATA)
        .ok_or_else(|| QueueError::malformed(COLLECTION, "missing data field"))?;
    let data = codec.decode(data_value)?;

    let resources = match doc.get(FIELD_RESOURCES) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(Fingerprint::from)
            .collect(),
        _ => BTreeSet::new(),
    };

    Ok(Document {
        id: doc.id.clone(),
        data,
        resources,
    })
}
