//! The generic CRUD service.
//!
//! A [`Service`] binds a shared [`Database`] handle to one named collection and forwards
//! typed application intent to it. It is parameterized over an insert shape `I` and an
//! update shape `U`; the [`ServiceHooks`] turn those into store payloads.
//!
//! # Example
//!
//! ```ignore
//! use docservice::{prelude::*, memory::MemoryDatabase};
//!
//! let database = MemoryDatabase::new();
//! let users: Service<_, UserCreate, UserUpdate> = Service::new(database, "users");
//!
//! let created = users.insert_one(&UserCreate { name: "Alice".into() }, None, None).await?;
//! let id = StrObjectId::try_from(&created.inserted_id)?;
//!
//! users.update_by_id(&id, &UserUpdate { name: Patch::Set("Bob".into()), ..Default::default() }, None, None).await?;
//! let stored = users.get_by_id(&id, None, None, None).await?;
//! ```

use bson::{Document, doc};
use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use crate::{
    backend::{CollectionHandle, Database, DeleteResult, DocumentCursor, InsertOneResult, UpdateResult},
    error::ServiceResult,
    id::StrObjectId,
    model::{ID_FIELD, InsertModel, UpdateModel},
    options::{
        AggregateOptions, CollectionOptions, CreateIndexOptions, DeleteOptions, DropIndexOptions,
        FindOptions, InsertOneOptions, ListIndexesOptions, UpdateManyOptions, UpdateOneOptions,
    },
    provider::DatabaseProvider,
    query::{IndexKeys, IndexRef, MongoProjection, MongoQuery, UpdateObject},
    validator::Validator,
};

/// The session type of the collections resolved by database `D`.
pub type SessionOf<D> = <<D as Database>::Collection as CollectionHandle>::Session;

/// Extension points of a [`Service`].
///
/// Both hooks run before any store call; an error aborts the operation.
pub trait ServiceHooks<I: InsertModel, U: UpdateModel>: Send + Sync {
    /// Converts insert data into the document to store.
    ///
    /// The default serializes the entire model.
    fn prepare_for_insert(&self, data: &I) -> ServiceResult<Document> {
        data.to_insert_document()
    }

    /// Converts update data into the update object to apply.
    ///
    /// The default is `{ "$set": <explicitly set fields> }`, so fields the caller did not
    /// set are left untouched in the stored document.
    fn prepare_for_update(&self, data: &U) -> ServiceResult<UpdateObject> {
        Ok(UpdateObject::set(data.to_set_document()?))
    }
}

/// The default hooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl<I: InsertModel, U: UpdateModel> ServiceHooks<I, U> for DefaultHooks {}

/// Typed CRUD service over one collection.
///
/// The collection handle is resolved from the database handle, the collection name and
/// the collection options on first use, exactly once, and reused afterwards.
pub struct Service<D, I, U, H = DefaultHooks>
where
    D: Database,
    I: InsertModel,
    U: UpdateModel,
    H: ServiceHooks<I, U>,
{
    database: D,
    collection_name: String,
    collection_options: CollectionOptions,
    collection: OnceLock<D::Collection>,
    hooks: H,
    validators: Vec<Arc<dyn Validator<I, U>>>,
    _marker: PhantomData<fn(I, U)>,
}

impl<D, I, U> Service<D, I, U, DefaultHooks>
where
    D: Database,
    I: InsertModel,
    U: UpdateModel,
{
    /// Creates a service with the default hooks.
    pub fn new(database: D, collection_name: impl Into<String>) -> Self {
        Self::with_hooks(database, collection_name, DefaultHooks)
    }

    /// Creates a service from a database provider.
    pub fn from_provider<P>(provider: &P, collection_name: impl Into<String>) -> Self
    where
        P: DatabaseProvider<Database = D>,
    {
        Self::new(provider.database(), collection_name)
    }
}

impl<D, I, U, H> Service<D, I, U, H>
where
    D: Database,
    I: InsertModel,
    U: UpdateModel,
    H: ServiceHooks<I, U>,
{
    /// Creates a service with custom hooks.
    pub fn with_hooks(database: D, collection_name: impl Into<String>, hooks: H) -> Self {
        Self {
            database,
            collection_name: collection_name.into(),
            collection_options: CollectionOptions::default(),
            collection: OnceLock::new(),
            hooks,
            validators: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Sets the collection-level configuration.
    pub fn with_collection_options(mut self, options: CollectionOptions) -> Self {
        self.collection_options = options;
        self.collection = OnceLock::new();
        self
    }

    /// Registers a validator. Validators run in registration order.
    pub fn with_validator(mut self, validator: impl Validator<I, U> + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// The name of the collection the service works with.
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// The collection-level configuration.
    pub fn collection_options(&self) -> &CollectionOptions {
        &self.collection_options
    }

    /// The shared database handle.
    pub fn database(&self) -> &D {
        &self.database
    }

    /// The hooks of the service.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// The collection handle of the service, resolved on first access.
    pub fn collection(&self) -> &D::Collection {
        self.collection.get_or_init(|| {
            tracing::debug!(collection = %self.collection_name, "resolving collection handle");
            self.database
                .collection(&self.collection_name, &self.collection_options)
        })
    }

    /// Runs an aggregation pipeline. Stages are passed through uninterpreted.
    pub async fn aggregate<'a>(
        &'a self,
        pipeline: Vec<Document>,
        session: Option<&'a mut SessionOf<D>>,
        options: impl Into<Option<AggregateOptions>>,
    ) -> ServiceResult<DocumentCursor<'a>> {
        tracing::trace!(collection = %self.collection_name, stages = pipeline.len(), "aggregate");
        self.collection()
            .aggregate(pipeline, session, options.into().unwrap_or_default())
            .await
    }

    /// Creates an index and returns its name.
    pub async fn create_index(
        &self,
        keys: impl Into<IndexKeys>,
        name: impl Into<String>,
        unique: bool,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<CreateIndexOptions>>,
    ) -> ServiceResult<String> {
        let name = name.into();
        tracing::debug!(collection = %self.collection_name, index = %name, unique, "create_index");
        self.collection()
            .create_index(keys.into(), name, unique, session, options.into().unwrap_or_default())
            .await
    }

    /// Drops the given index, referenced by name or by key specification.
    pub async fn drop_index(
        &self,
        index: impl Into<IndexRef>,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> ServiceResult<()> {
        let index = index.into();
        tracing::debug!(collection = %self.collection_name, index = %index.name(), "drop_index");
        self.collection()
            .drop_index(index, session, options.into().unwrap_or_default())
            .await
    }

    /// Drops all indexes of the collection.
    pub async fn drop_indexes(
        &self,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> ServiceResult<()> {
        tracing::debug!(collection = %self.collection_name, "drop_indexes");
        self.collection()
            .drop_indexes(session, options.into().unwrap_or_default())
            .await
    }

    /// Returns a cursor over the index descriptions of the collection.
    pub async fn list_indexes<'a>(
        &'a self,
        session: Option<&'a mut SessionOf<D>>,
        options: impl Into<Option<ListIndexesOptions>>,
    ) -> ServiceResult<DocumentCursor<'a>> {
        tracing::trace!(collection = %self.collection_name, "list_indexes");
        self.collection()
            .list_indexes(session, options.into().unwrap_or_default())
            .await
    }

    /// Deletes the document with the given ID.
    ///
    /// Equivalent to `delete_one({ "_id": id })`.
    pub async fn delete_by_id(
        &self,
        id: &StrObjectId,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ServiceResult<DeleteResult> {
        self.delete_one(by_id(id), session, options).await
    }

    /// Deletes the first document matching `query`.
    pub async fn delete_one(
        &self,
        query: impl Into<Option<MongoQuery>>,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ServiceResult<DeleteResult> {
        let query = query.into().unwrap_or_default();
        tracing::debug!(collection = %self.collection_name, ?query, "delete_one");
        self.collection()
            .delete_one(query, session, options.into().unwrap_or_default())
            .await
    }

    /// Deletes every document matching `query`.
    pub async fn delete_many(
        &self,
        query: impl Into<Option<MongoQuery>>,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<DeleteOptions>>,
    ) -> ServiceResult<DeleteResult> {
        let query = query.into().unwrap_or_default();
        tracing::debug!(collection = %self.collection_name, ?query, "delete_many");
        self.collection()
            .delete_many(query, session, options.into().unwrap_or_default())
            .await
    }

    /// Returns a lazy cursor over the matching documents. Nothing is materialized.
    pub async fn find<'a>(
        &'a self,
        query: impl Into<Option<MongoQuery>>,
        projection: impl Into<Option<MongoProjection>>,
        session: Option<&'a mut SessionOf<D>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ServiceResult<DocumentCursor<'a>> {
        let query = query.into().unwrap_or_default();
        tracing::trace!(collection = %self.collection_name, ?query, "find");
        self.collection()
            .find(query, projection.into(), session, options.into().unwrap_or_default())
            .await
    }

    /// Returns the first matching document, or `None` if there are no matches.
    pub async fn find_one(
        &self,
        query: impl Into<Option<MongoQuery>>,
        projection: impl Into<Option<MongoProjection>>,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ServiceResult<Option<Document>> {
        let query = query.into().unwrap_or_default();
        tracing::trace!(collection = %self.collection_name, ?query, "find_one");
        self.collection()
            .find_one(query, projection.into(), session, options.into().unwrap_or_default())
            .await
    }

    /// Returns the document with the given ID if it exists.
    ///
    /// Equivalent to `find_one({ "_id": id }, projection)`.
    pub async fn get_by_id(
        &self,
        id: &StrObjectId,
        projection: impl Into<Option<MongoProjection>>,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<FindOptions>>,
    ) -> ServiceResult<Option<Document>> {
        self.find_one(by_id(id), projection, session, options).await
    }

    /// Validates and inserts the given data.
    ///
    /// # Errors
    ///
    /// Validator and hook failures are returned before the store is called.
    pub async fn insert_one(
        &self,
        data: &I,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> ServiceResult<InsertOneResult> {
        for validator in self.validators.iter().filter(|v| v.scope().inserts()) {
            validator.validate_insert(data).await?;
        }

        let document = self.hooks.prepare_for_insert(data)?;
        tracing::debug!(collection = %self.collection_name, "insert_one");
        self.collection()
            .insert_one(document, session, options.into().unwrap_or_default())
            .await
    }

    /// Updates the document with the given ID.
    ///
    /// Equivalent to `update_one({ "_id": id }, changes)`.
    pub async fn update_by_id(
        &self,
        id: &StrObjectId,
        changes: &U,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<UpdateOneOptions>>,
    ) -> ServiceResult<UpdateResult> {
        self.update_one(by_id(id), changes, session, options).await
    }

    /// Applies `changes` to the first document matching `query`.
    pub async fn update_one(
        &self,
        query: impl Into<Option<MongoQuery>>,
        changes: &U,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<UpdateOneOptions>>,
    ) -> ServiceResult<UpdateResult> {
        let (query, update) = self.prepare_update(query.into(), changes).await?;
        tracing::debug!(collection = %self.collection_name, ?query, "update_one");
        self.collection()
            .update_one(query, update, session, options.into().unwrap_or_default())
            .await
    }

    /// Applies `changes` to every document matching `query`.
    pub async fn update_many(
        &self,
        query: impl Into<Option<MongoQuery>>,
        changes: &U,
        session: Option<&mut SessionOf<D>>,
        options: impl Into<Option<UpdateManyOptions>>,
    ) -> ServiceResult<UpdateResult> {
        let (query, update) = self.prepare_update(query.into(), changes).await?;
        tracing::debug!(collection = %self.collection_name, ?query, "update_many");
        self.collection()
            .update_many(query, update, session, options.into().unwrap_or_default())
            .await
    }

    async fn prepare_update(
        &self,
        query: Option<MongoQuery>,
        changes: &U,
    ) -> ServiceResult<(MongoQuery, UpdateObject)> {
        for validator in self.validators.iter().filter(|v| v.scope().updates()) {
            validator.validate_update(query.as_ref(), changes).await?;
        }

        let update = self.hooks.prepare_for_update(changes)?;

        Ok((query.unwrap_or_default(), update))
    }
}

fn by_id(id: &StrObjectId) -> MongoQuery {
    doc! { ID_FIELD: id }
}

impl<D, I, U, H> fmt::Debug for Service<D, I, U, H>
where
    D: Database,
    I: InsertModel,
    U: UpdateModel,
    H: ServiceHooks<I, U>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("database", &self.database)
            .field("collection_name", &self.collection_name)
            .field("collection_options", &self.collection_options)
            .field("resolved", &self.collection.get().is_some())
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{DatabaseBuilder, DeleteResult},
        error::{ServiceError, ValidationError},
        model::{FieldState, Patch},
        options::ReadConcern,
        validator::ValidateOn,
    };
    use async_trait::async_trait;
    use bson::Bson;
    use futures::{StreamExt, stream};
    use serde::Serialize;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Insert(Document, InsertOneOptions),
        UpdateOne(Document, UpdateObject, UpdateOneOptions),
        UpdateMany(Document, UpdateObject, UpdateManyOptions),
        DeleteOne(Document, DeleteOptions),
        FindOne(Document, Option<Document>, FindOptions),
        Find(Document),
    }

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        resolutions: AtomicUsize,
        resolved_with: Mutex<Option<CollectionOptions>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[derive(Debug, Clone, Default)]
    struct RecordingDatabase(Arc<Recorder>);

    #[derive(Debug)]
    struct RecordingCollection {
        name: String,
        recorder: Arc<Recorder>,
    }

    impl Database for RecordingDatabase {
        type Collection = RecordingCollection;

        fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection {
            self.0.resolutions.fetch_add(1, Ordering::SeqCst);
            *self.0.resolved_with.lock().unwrap() = Some(options.clone());
            RecordingCollection { name: name.to_string(), recorder: self.0.clone() }
        }
    }

    struct RecordingBuilder;

    #[async_trait]
    impl DatabaseBuilder for RecordingBuilder {
        type Database = RecordingDatabase;

        async fn build(self) -> ServiceResult<Self::Database> {
            Ok(RecordingDatabase::default())
        }
    }

    #[async_trait]
    impl CollectionHandle for RecordingCollection {
        type Session = ();

        fn name(&self) -> &str {
            &self.name
        }

        async fn aggregate<'a>(
            &'a self,
            pipeline: Vec<Document>,
            _session: Option<&'a mut ()>,
            _options: AggregateOptions,
        ) -> ServiceResult<DocumentCursor<'a>> {
            Ok(stream::iter(pipeline.into_iter().map(Ok)).boxed())
        }

        async fn create_index(
            &self,
            _keys: IndexKeys,
            name: String,
            _unique: bool,
            _session: Option<&mut ()>,
            _options: CreateIndexOptions,
        ) -> ServiceResult<String> {
            Ok(name)
        }

        async fn drop_index(&self, _index: IndexRef, _session: Option<&mut ()>, _options: DropIndexOptions) -> ServiceResult<()> {
            Ok(())
        }

        async fn drop_indexes(&self, _session: Option<&mut ()>, _options: DropIndexOptions) -> ServiceResult<()> {
            Ok(())
        }

        async fn list_indexes<'a>(
            &'a self,
            _session: Option<&'a mut ()>,
            _options: ListIndexesOptions,
        ) -> ServiceResult<DocumentCursor<'a>> {
            Ok(stream::iter([Ok(doc! { "name": "_id_" })]).boxed())
        }

        async fn delete_one(&self, query: Document, _session: Option<&mut ()>, options: DeleteOptions) -> ServiceResult<DeleteResult> {
            self.recorder.record(Call::DeleteOne(query, options));
            Ok(DeleteResult { deleted_count: 1 })
        }

        async fn delete_many(&self, _query: Document, _session: Option<&mut ()>, _options: DeleteOptions) -> ServiceResult<DeleteResult> {
            Ok(DeleteResult { deleted_count: 0 })
        }

        async fn find<'a>(
            &'a self,
            query: Document,
            _projection: Option<Document>,
            _session: Option<&'a mut ()>,
            _options: FindOptions,
        ) -> ServiceResult<DocumentCursor<'a>> {
            self.recorder.record(Call::Find(query));
            Ok(stream::empty().boxed())
        }

        async fn find_one(
            &self,
            query: Document,
            projection: Option<Document>,
            _session: Option<&mut ()>,
            options: FindOptions,
        ) -> ServiceResult<Option<Document>> {
            self.recorder.record(Call::FindOne(query, projection, options));
            Ok(None)
        }

        async fn insert_one(&self, document: Document, _session: Option<&mut ()>, options: InsertOneOptions) -> ServiceResult<InsertOneResult> {
            let inserted_id = document
                .get(ID_FIELD)
                .cloned()
                .unwrap_or_else(|| Bson::ObjectId(bson::oid::ObjectId::new()));
            self.recorder.record(Call::Insert(document, options));
            Ok(InsertOneResult { inserted_id })
        }

        async fn update_one(
            &self,
            query: Document,
            update: UpdateObject,
            _session: Option<&mut ()>,
            options: UpdateOneOptions,
        ) -> ServiceResult<UpdateResult> {
            self.recorder.record(Call::UpdateOne(query, update, options));
            Ok(UpdateResult { matched_count: 1, modified_count: 1, upserted_id: None })
        }

        async fn update_many(
            &self,
            query: Document,
            update: UpdateObject,
            _session: Option<&mut ()>,
            options: UpdateManyOptions,
        ) -> ServiceResult<UpdateResult> {
            self.recorder.record(Call::UpdateMany(query, update, options));
            Ok(UpdateResult { matched_count: 2, modified_count: 2, upserted_id: None })
        }
    }

    #[derive(Debug, Serialize)]
    struct Create {
        name: String,
    }

    #[derive(Debug, Default, Serialize)]
    struct Changes {
        a: Patch<i32>,
        b: Patch<String>,
        c: Option<bool>,
    }

    impl UpdateModel for Changes {
        fn to_set_document(&self) -> ServiceResult<Document> {
            let mut document = crate::model::serialize_document(self)?;
            if FieldState::is_unset(&self.a) {
                document.remove("a");
            }
            if FieldState::is_unset(&self.b) {
                document.remove("b");
            }
            if FieldState::is_unset(&self.c) {
                document.remove("c");
            }
            Ok(document)
        }
    }

    type TestService<H = DefaultHooks> = Service<RecordingDatabase, Create, Changes, H>;

    fn service() -> (TestService, Arc<Recorder>) {
        let database = RecordingDatabase::default();
        let recorder = database.0.clone();
        (Service::new(database, "things"), recorder)
    }

    fn some_id() -> StrObjectId {
        StrObjectId::parse("65a1f0c2e4b0a1b2c3d4e5f6").unwrap()
    }

    #[tokio::test]
    async fn resolves_the_collection_once() {
        let database = RecordingDatabase::default();
        let recorder = database.0.clone();
        let options = CollectionOptions { read_concern: Some(ReadConcern::Majority), ..Default::default() };
        let service: TestService = Service::new(database, "things").with_collection_options(options.clone());

        assert_eq!(recorder.resolutions.load(Ordering::SeqCst), 0);

        service.find_one(None, None, None, None).await.unwrap();
        service.delete_one(doc! {}, None, None).await.unwrap();
        service.insert_one(&Create { name: "a".into() }, None, None).await.unwrap();

        assert_eq!(recorder.resolutions.load(Ordering::SeqCst), 1);
        assert_eq!(*recorder.resolved_with.lock().unwrap(), Some(options));
        assert_eq!(service.collection().name(), "things");
    }

    #[tokio::test]
    async fn insert_sends_the_full_model_without_identifier() {
        let (service, recorder) = service();

        let result = service.insert_one(&Create { name: "a".into() }, None, None).await.unwrap();

        assert!(matches!(result.inserted_id, Bson::ObjectId(_)));
        assert_eq!(
            recorder.calls(),
            vec![Call::Insert(doc! { "name": "a" }, InsertOneOptions::default())],
        );
    }

    #[tokio::test]
    async fn update_sets_only_explicit_fields() {
        let (service, recorder) = service();
        let changes = Changes { a: Patch::Set(5), ..Default::default() };

        service.update_one(doc! { "k": 1 }, &changes, None, None).await.unwrap();

        assert_eq!(
            recorder.calls(),
            vec![Call::UpdateOne(
                doc! { "k": 1 },
                UpdateObject::Document(doc! { "$set": { "a": 5 } }),
                UpdateOneOptions::default(),
            )],
        );
    }

    #[tokio::test]
    async fn update_by_id_matches_update_one() {
        let (service, recorder) = service();
        let changes = Changes { b: Patch::Set("x".into()), c: Some(false), ..Default::default() };
        let options = UpdateOneOptions { upsert: Some(true), ..Default::default() };

        service.update_by_id(&some_id(), &changes, None, options.clone()).await.unwrap();
        service.update_one(doc! { "_id": some_id() }, &changes, None, options).await.unwrap();

        let calls = recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
    }

    #[tokio::test]
    async fn by_id_lookups_delegate() {
        let (service, recorder) = service();
        let projection = doc! { "name": 1 };

        let found = service.get_by_id(&some_id(), projection.clone(), None, None).await.unwrap();
        service.delete_by_id(&some_id(), None, None).await.unwrap();

        assert_eq!(found, None);
        assert_eq!(
            recorder.calls(),
            vec![
                Call::FindOne(doc! { "_id": some_id() }, Some(projection), FindOptions::default()),
                Call::DeleteOne(doc! { "_id": some_id() }, DeleteOptions::default()),
            ],
        );
    }

    #[tokio::test]
    async fn missing_queries_become_empty_documents() {
        let (service, recorder) = service();

        let mut cursor = service.find(None, None, None, None).await.unwrap();
        assert!(cursor.next().await.is_none());
        drop(cursor);

        service.update_many(None, &Changes::default(), None, None).await.unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Call::Find(doc! {}),
                Call::UpdateMany(doc! {}, UpdateObject::set(doc! {}), UpdateManyOptions::default()),
            ],
        );
    }

    struct Rejecting;

    impl ServiceHooks<Create, Changes> for Rejecting {
        fn prepare_for_insert(&self, data: &Create) -> ServiceResult<Document> {
            Err(ValidationError::Rule(format!("{} is reserved", data.name)).into())
        }

        fn prepare_for_update(&self, _data: &Changes) -> ServiceResult<UpdateObject> {
            Ok(UpdateObject::Pipeline(vec![doc! { "$set": { "touched": true } }]))
        }
    }

    #[tokio::test]
    async fn hooks_can_reject_and_reshape() {
        let database = RecordingDatabase::default();
        let recorder = database.0.clone();
        let service: TestService<Rejecting> = Service::with_hooks(database, "things", Rejecting);

        let err = service.insert_one(&Create { name: "root".into() }, None, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(ValidationError::Rule(_))));
        assert!(recorder.calls().is_empty());

        service.update_one(None, &Changes::default(), None, None).await.unwrap();
        assert_eq!(
            recorder.calls(),
            vec![Call::UpdateOne(
                doc! {},
                UpdateObject::Pipeline(vec![doc! { "$set": { "touched": true } }]),
                UpdateOneOptions::default(),
            )],
        );
    }

    struct NoEmptyNames {
        seen_queries: Arc<Mutex<Vec<Option<Document>>>>,
    }

    #[async_trait]
    impl Validator<Create, Changes> for NoEmptyNames {
        fn scope(&self) -> ValidateOn {
            ValidateOn::InsertUpdate
        }

        async fn validate_insert(&self, data: &Create) -> Result<(), ValidationError> {
            if data.name.is_empty() {
                return Err(ValidationError::Rule("name must not be empty".into()));
            }
            Ok(())
        }

        async fn validate_update(&self, query: Option<&Document>, data: &Changes) -> Result<(), ValidationError> {
            self.seen_queries.lock().unwrap().push(query.cloned());
            match &data.b {
                Patch::Set(name) if name.is_empty() => Err(ValidationError::Rule("name must not be empty".into())),
                _ => Ok(()),
            }
        }
    }

    struct InsertOnly(Arc<AtomicUsize>);

    #[async_trait]
    impl Validator<Create, Changes> for InsertOnly {
        fn scope(&self) -> ValidateOn {
            ValidateOn::Insert
        }

        async fn validate_update(&self, _query: Option<&Document>, _data: &Changes) -> Result<(), ValidationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn validators_run_before_the_store() {
        let (service, recorder) = service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let update_calls = Arc::new(AtomicUsize::new(0));
        let service = service
            .with_validator(NoEmptyNames { seen_queries: seen.clone() })
            .with_validator(InsertOnly(update_calls.clone()));

        let err = service.insert_one(&Create { name: String::new() }, None, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let empty = Changes { b: Patch::Set(String::new()), ..Default::default() };
        assert!(service.update_by_id(&some_id(), &empty, None, None).await.is_err());
        assert!(recorder.calls().is_empty());

        service.update_many(None, &Changes::default(), None, None).await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(doc! { "_id": some_id() }), None]);
        assert_eq!(update_calls.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.calls().len(), 1);
    }

    #[tokio::test]
    async fn index_and_aggregate_pass_through() {
        let (service, _) = service();

        let name = service.create_index("email", "email_unique", true, None, None).await.unwrap();
        service.drop_index(IndexKeys::field("email"), None, None).await.unwrap();
        service.drop_indexes(None, None).await.unwrap();

        let indexes = service.list_indexes(None, None).await.unwrap().collect::<Vec<_>>().await;
        let stages = vec![doc! { "$match": { "a": 1 } }, doc! { "$limit": 1 }];
        let echoed = service
            .aggregate(stages.clone(), None, None)
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect::<Vec<_>>()
            .await;

        assert_eq!(name, "email_unique");
        assert_eq!(indexes.len(), 1);
        assert_eq!(echoed, stages);
    }

    #[tokio::test]
    async fn services_can_come_from_providers() {
        let database = RecordingBuilder.build().await.unwrap();
        let shared = database.clone();
        let provider = move || shared.clone();

        let service: TestService = Service::from_provider(&provider, "things");
        service.delete_many(None, None, None).await.unwrap();

        assert_eq!(service.collection_name(), "things");
        assert_eq!(database.0.resolutions.load(Ordering::SeqCst), 1);
    }
}
