//! In-memory database and collection handles.
//!
//! Every collection keeps its documents in insertion order, which is the natural order
//! used when no sort is given, together with its index definitions. Unique indexes are
//! enforced on every write.

use async_trait::async_trait;
use bson::{Bson, Document, doc, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use docservice_core::{
    backend::{
        CollectionHandle, Database, DatabaseBuilder, DeleteResult, DocumentCursor, InsertOneResult,
        UpdateResult,
    },
    error::ServiceResult,
    filter::{Expr, FieldOp},
    model::ID_FIELD,
    options::{
        AggregateOptions, CollectionOptions, CreateIndexOptions, DeleteOptions, DropIndexOptions,
        FindOptions, InsertOneOptions, ListIndexesOptions, UpdateManyOptions, UpdateOneOptions,
    },
    query::{IndexKeys, IndexRef, MongoProjection, MongoQuery, UpdateObject},
};

use crate::{
    error::{MemoryStoreError, MemoryStoreResult},
    evaluator::{Matcher, get_path},
    pipeline::{aggregate, project, sort_documents},
    update::{apply_update, set_path},
};

const ID_INDEX: &str = "_id_";

#[derive(Debug, Clone, PartialEq)]
struct IndexSpec {
    name: String,
    keys: Document,
    unique: bool,
    sparse: bool,
}

impl IndexSpec {
    fn id() -> Self {
        Self {
            name: ID_INDEX.to_string(),
            keys: doc! { ID_FIELD: 1 },
            unique: true,
            sparse: false,
        }
    }

    fn describe(&self) -> Document {
        let mut description = doc! { "v": 2, "key": self.keys.clone(), "name": self.name.clone() };
        if self.unique && self.name != ID_INDEX {
            description.insert("unique", true);
        }
        if self.sparse {
            description.insert("sparse", true);
        }
        description
    }

    /// Returns the indexed values of `document`, or `None` if a sparse index skips it.
    fn key_of(&self, document: &Document) -> Option<Vec<Bson>> {
        let values = self
            .keys
            .keys()
            .map(|field| get_path(document, field).cloned())
            .collect::<Vec<_>>();

        if self.sparse && values.iter().all(Option::is_none) {
            return None;
        }

        Some(values.into_iter().map(|value| value.unwrap_or(Bson::Null)).collect())
    }
}

#[derive(Debug)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexSpec>,
}

impl Default for CollectionState {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            indexes: vec![IndexSpec::id()],
        }
    }
}

impl CollectionState {
    /// Checks that `candidate` does not collide with any other document on a unique index.
    ///
    /// `position` is the index of the candidate when it replaces a stored document.
    fn check_unique(&self, collection: &str, candidate: &Document, position: Option<usize>) -> MemoryStoreResult<()> {
        for index in self.indexes.iter().filter(|index| index.unique) {
            let Some(key) = index.key_of(candidate) else {
                continue;
            };

            let collides = self
                .documents
                .iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != position)
                .any(|(_, other)| index.key_of(other).as_ref() == Some(&key));

            if collides {
                return Err(duplicate_key(collection, index, &key));
            }
        }

        Ok(())
    }

    fn matching(&self, matcher: &Matcher) -> ServiceResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in self.documents.iter().enumerate() {
            if matcher.matches(document)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }
}

fn duplicate_key(collection: &str, index: &IndexSpec, key: &[Bson]) -> MemoryStoreError {
    let key = index
        .keys
        .keys()
        .zip(key)
        .map(|(field, value)| format!("{field}: {value}"))
        .collect::<Vec<_>>()
        .join(", ");

    MemoryStoreError::DuplicateKey {
        collection: collection.to_string(),
        index: index.name.clone(),
        key: format!("{{ {key} }}"),
    }
}

type StoreMap = HashMap<String, CollectionState>;

/// Thread-safe in-memory database.
///
/// `MemoryDatabase` is cloneable and uses an `Arc`-wrapped internal state, so it can be
/// shared across services and async tasks. Clones share the same data.
///
/// Collection options are accepted and ignored: there is a single copy of every document,
/// so read preferences and concerns have nothing to act on.
///
/// # Example
///
/// ```ignore
/// use docservice::{prelude::*, memory::MemoryDatabase};
///
/// let database = MemoryDatabase::new();
/// let users: Service<_, UserCreate, UserUpdate> = Service::new(database.clone(), "users");
/// let posts: Service<_, PostCreate, PostUpdate> = Service::new(database, "posts");
/// ```
#[derive(Clone, Debug)]
pub struct MemoryDatabase {
    name: Arc<str>,
    store: Arc<RwLock<StoreMap>>,
    sessions: Arc<AtomicU64>,
}

impl MemoryDatabase {
    /// Creates a new empty database named `memory`.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// Creates a new empty database with the given name.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
            store: Arc::new(RwLock::new(StoreMap::new())),
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates a builder for constructing a `MemoryDatabase`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use docservice::memory::MemoryDatabase;
    /// use docservice::backend::DatabaseBuilder;
    ///
    /// let database = MemoryDatabase::builder().name("app").build().await?;
    /// ```
    pub fn builder() -> MemoryDatabaseBuilder {
        MemoryDatabaseBuilder::default()
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts a session.
    ///
    /// Sessions carry no transactional scope in memory. They count the operations run
    /// under them, which lets callers check that a session was threaded through.
    pub fn start_session(&self) -> MemorySession {
        MemorySession {
            id: self.sessions.fetch_add(1, Ordering::SeqCst),
            operations: 0,
        }
    }

    /// Lists the collections that hold documents or indexes.
    pub async fn list_collection_names(&self) -> Vec<String> {
        let mut names = self.store.read().await.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }

    /// Drops a collection with its documents and indexes.
    pub async fn drop_collection(&self, name: &str) {
        self.store.write().await.remove(name);
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for MemoryDatabase {
    type Collection = MemoryCollection;

    fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection {
        tracing::trace!(database = %self.name, collection = name, ?options, "binding memory collection");

        MemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
        }
    }
}

/// A session of a [`MemoryDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySession {
    id: u64,
    operations: u64,
}

impl MemorySession {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of operations run under this session.
    pub fn operation_count(&self) -> u64 {
        self.operations
    }
}

fn track(session: Option<&mut MemorySession>) {
    if let Some(session) = session {
        session.operations += 1;
    }
}

/// A handle to one collection of a [`MemoryDatabase`].
#[derive(Debug, Clone)]
pub struct MemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
}

impl MemoryCollection {
    async fn snapshot(&self) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(&self.name)
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }

    async fn find_documents(
        &self,
        query: &MongoQuery,
        projection: Option<&MongoProjection>,
        options: &FindOptions,
    ) -> ServiceResult<Vec<Document>> {
        let matcher = Matcher::new(query)?;
        let mut documents = Vec::new();
        for document in self.snapshot().await {
            if matcher.matches(&document)? {
                documents.push(document);
            }
        }

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort)?;
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(0) | None => usize::MAX,
            Some(limit) => limit.unsigned_abs() as usize,
        };

        let documents = documents.into_iter().skip(skip).take(limit);
        match projection {
            Some(projection) => Ok(documents
                .map(|document| project(document, projection))
                .collect::<MemoryStoreResult<_>>()?),
            None => Ok(documents.collect()),
        }
    }

    async fn update(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        multi: bool,
        upsert: bool,
    ) -> ServiceResult<UpdateResult> {
        let matcher = Matcher::new(&query)?;
        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();

        let mut positions = state.matching(&matcher)?;
        if !multi {
            positions.truncate(1);
        }

        if positions.is_empty() {
            if !upsert {
                return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: None });
            }

            let mut document = seed_from_query(matcher.expr())?;
            apply_update(&mut document, &update, true)?;
            let id = document
                .get(ID_FIELD)
                .cloned()
                .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
            if !document.contains_key(ID_FIELD) {
                document = with_leading_id(id.clone(), document);
            }

            state.check_unique(&self.name, &document, None)?;
            state.documents.push(document);

            tracing::trace!(collection = %self.name, upserted_id = %id, "memory upsert");
            return Ok(UpdateResult { matched_count: 0, modified_count: 0, upserted_id: Some(id) });
        }

        let mut modified = 0;
        for position in &positions {
            let mut document = state.documents[*position].clone();
            apply_update(&mut document, &update, false)?;

            if document != state.documents[*position] {
                state.check_unique(&self.name, &document, Some(*position))?;
                state.documents[*position] = document;
                modified += 1;
            }
        }

        Ok(UpdateResult {
            matched_count: positions.len() as u64,
            modified_count: modified,
            upserted_id: None,
        })
    }

    async fn delete(&self, query: MongoQuery, multi: bool) -> ServiceResult<DeleteResult> {
        let matcher = Matcher::new(&query)?;
        let mut store = self.store.write().await;
        let Some(state) = store.get_mut(&self.name) else {
            return Ok(DeleteResult { deleted_count: 0 });
        };

        let mut positions = state.matching(&matcher)?;
        if !multi {
            positions.truncate(1);
        }

        for position in positions.iter().rev() {
            state.documents.remove(*position);
        }

        Ok(DeleteResult { deleted_count: positions.len() as u64 })
    }
}

/// Builds the document an upsert starts from: the equality conditions of the query.
fn seed_from_query(expr: &Expr) -> ServiceResult<Document> {
    let mut document = Document::new();
    seed(expr, &mut document)?;
    Ok(document)
}

fn seed(expr: &Expr, document: &mut Document) -> MemoryStoreResult<()> {
    match expr {
        Expr::And(exprs) => {
            for expr in exprs {
                seed(expr, document)?;
            }
        }
        Expr::Field { field, op: FieldOp::Eq, value } => set_path(document, field, value.clone())?,
        _ => {}
    }
    Ok(())
}

/// Prepends the identifier to a document that has none.
fn with_leading_id(id: Bson, document: Document) -> Document {
    let mut with_id = doc! { ID_FIELD: id };
    for (key, value) in document {
        with_id.insert(key, value);
    }
    with_id
}

fn cursor<'a>(documents: Vec<Document>) -> DocumentCursor<'a> {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl CollectionHandle for MemoryCollection {
    type Session = MemorySession;

    fn name(&self) -> &str {
        &self.name
    }

    async fn aggregate<'a>(
        &'a self,
        pipeline: Vec<Document>,
        session: Option<&'a mut MemorySession>,
        _options: AggregateOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        track(session);
        let documents = aggregate(self.snapshot().await, &pipeline)?;
        Ok(cursor(documents))
    }

    async fn create_index(
        &self,
        keys: IndexKeys,
        name: String,
        unique: bool,
        session: Option<&mut MemorySession>,
        options: CreateIndexOptions,
    ) -> ServiceResult<String> {
        track(session);
        let index = IndexSpec {
            name,
            keys: keys.to_document(),
            unique,
            sparse: options.sparse.unwrap_or(false),
        };

        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();

        if let Some(existing) = state.indexes.iter().find(|existing| existing.name == index.name) {
            if *existing == index {
                return Ok(index.name);
            }
            return Err(MemoryStoreError::IndexConflict(index.name).into());
        }

        if index.unique {
            let mut seen: Vec<Vec<Bson>> = Vec::new();
            for key in state.documents.iter().filter_map(|document| index.key_of(document)) {
                if seen.contains(&key) {
                    return Err(duplicate_key(&self.name, &index, &key).into());
                }
                seen.push(key);
            }
        }

        tracing::debug!(collection = %self.name, index = %index.name, "memory index created");
        let name = index.name.clone();
        state.indexes.push(index);

        Ok(name)
    }

    async fn drop_index(
        &self,
        index: IndexRef,
        session: Option<&mut MemorySession>,
        _options: DropIndexOptions,
    ) -> ServiceResult<()> {
        track(session);
        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();

        let position = match &index {
            IndexRef::Name(name) => state.indexes.iter().position(|spec| &spec.name == name),
            IndexRef::Keys(keys) => {
                let keys = keys.to_document();
                state.indexes.iter().position(|spec| spec.keys == keys)
            }
        };

        match position {
            Some(position) if state.indexes[position].name == ID_INDEX => Err(MemoryStoreError::CannotDropIdIndex.into()),
            Some(position) => {
                state.indexes.remove(position);
                Ok(())
            }
            None => Err(MemoryStoreError::IndexNotFound(index.name()).into()),
        }
    }

    async fn drop_indexes(&self, session: Option<&mut MemorySession>, _options: DropIndexOptions) -> ServiceResult<()> {
        track(session);
        let mut store = self.store.write().await;
        if let Some(state) = store.get_mut(&self.name) {
            state.indexes.retain(|spec| spec.name == ID_INDEX);
        }
        Ok(())
    }

    async fn list_indexes<'a>(
        &'a self,
        session: Option<&'a mut MemorySession>,
        _options: ListIndexesOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        track(session);
        let store = self.store.read().await;
        let indexes = match store.get(&self.name) {
            Some(state) => state.indexes.iter().map(IndexSpec::describe).collect(),
            None => Vec::new(),
        };
        Ok(cursor(indexes))
    }

    async fn delete_one(&self, query: MongoQuery, session: Option<&mut MemorySession>, _options: DeleteOptions) -> ServiceResult<DeleteResult> {
        track(session);
        self.delete(query, false).await
    }

    async fn delete_many(&self, query: MongoQuery, session: Option<&mut MemorySession>, _options: DeleteOptions) -> ServiceResult<DeleteResult> {
        track(session);
        self.delete(query, true).await
    }

    async fn find<'a>(
        &'a self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&'a mut MemorySession>,
        options: FindOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        track(session);
        let documents = self.find_documents(&query, projection.as_ref(), &options).await?;
        Ok(cursor(documents))
    }

    async fn find_one(
        &self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&mut MemorySession>,
        options: FindOptions,
    ) -> ServiceResult<Option<Document>> {
        track(session);
        let options = FindOptions { limit: Some(1), ..options };
        let documents = self.find_documents(&query, projection.as_ref(), &options).await?;
        Ok(documents.into_iter().next())
    }

    async fn insert_one(
        &self,
        mut document: Document,
        session: Option<&mut MemorySession>,
        _options: InsertOneOptions,
    ) -> ServiceResult<InsertOneResult> {
        track(session);
        let inserted_id = match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document = with_leading_id(id.clone(), document);
                id
            }
        };

        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();
        state.check_unique(&self.name, &document, None)?;
        state.documents.push(document);

        tracing::trace!(collection = %self.name, %inserted_id, "memory insert");
        Ok(InsertOneResult { inserted_id })
    }

    async fn update_one(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut MemorySession>,
        options: UpdateOneOptions,
    ) -> ServiceResult<UpdateResult> {
        track(session);
        self.update(query, update, false, options.upsert.unwrap_or(false)).await
    }

    async fn update_many(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut MemorySession>,
        options: UpdateManyOptions,
    ) -> ServiceResult<UpdateResult> {
        track(session);
        self.update(query, update, true, options.upsert.unwrap_or(false)).await
    }
}

/// Builder for constructing [`MemoryDatabase`] instances.
///
/// # Example
///
/// ```ignore
/// use docservice::memory::MemoryDatabase;
/// use docservice::backend::DatabaseBuilder;
///
/// let database = MemoryDatabase::builder().name("test").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryDatabaseBuilder {
    name: Option<String>,
}

impl MemoryDatabaseBuilder {
    /// Sets the database name. Defaults to `memory`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl DatabaseBuilder for MemoryDatabaseBuilder {
    type Database = MemoryDatabase;

    /// Builds a new, empty [`MemoryDatabase`]. This always succeeds.
    async fn build(self) -> ServiceResult<Self::Database> {
        Ok(match self.name {
            Some(name) => MemoryDatabase::named(name),
            None => MemoryDatabase::new(),
        })
    }
}
