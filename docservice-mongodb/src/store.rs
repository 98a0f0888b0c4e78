use async_trait::async_trait;
use bson::{Document, ser::serialize_to_document};
use futures::{StreamExt, TryStreamExt, stream};
use mongodb::{
    Client, ClientSession, IndexModel, SessionCursor,
    options::ClientOptions,
};
use serde::{Serialize, de::DeserializeOwned};

use docservice_core::{
    backend::{
        CollectionHandle, Database, DatabaseBuilder, DeleteResult, DocumentCursor, InsertOneResult,
        UpdateResult,
    },
    error::{ServiceError, ServiceResult},
    options::{
        AggregateOptions, CollectionOptions, CreateIndexOptions, DeleteOptions, DropIndexOptions,
        FindOptions, InsertOneOptions, ListIndexesOptions, UpdateManyOptions, UpdateOneOptions,
    },
    provider::ClientProvider,
    query::{IndexKeys, IndexRef, MongoProjection, MongoQuery, UpdateObject},
};

use crate::options::{IntoDriver, collection_options, create_index_options, find_one_options};

fn store_error(err: mongodb::error::Error) -> ServiceError {
    ServiceError::store(err)
}

fn into_modifications(update: UpdateObject) -> mongodb::options::UpdateModifications {
    match update {
        UpdateObject::Document(document) => mongodb::options::UpdateModifications::Document(document),
        UpdateObject::Pipeline(pipeline) => mongodb::options::UpdateModifications::Pipeline(pipeline),
    }
}

/// Drives a session-bound cursor with its session, one document at a time.
fn session_stream<'a, T>(cursor: SessionCursor<T>, session: &'a mut ClientSession) -> DocumentCursor<'a>
where
    T: DeserializeOwned + Serialize + Send + 'a,
{
    stream::unfold((cursor, session), |(mut cursor, session)| async move {
        let item = cursor.next(session).await?;
        Some((into_document(item), (cursor, session)))
    })
    .boxed()
}

fn into_document<T: Serialize>(item: mongodb::error::Result<T>) -> ServiceResult<Document> {
    Ok(serialize_to_document(&item.map_err(store_error)?)?)
}

/// A MongoDB database handle.
///
/// Wraps the driver's `Database` together with the `Client` it belongs to. Cloning is
/// cheap and clones share the connection pool.
///
/// # Example
///
/// ```ignore
/// use docservice::{backend::DatabaseBuilder, mongodb::MongoDatabase};
///
/// let database = MongoDatabase::builder("mongodb://localhost:27017", "app")
///     .app_name("billing")
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoDatabase {
    client: Client,
    database: mongodb::Database,
}

impl MongoDatabase {
    pub fn new(client: Client, database: &str) -> Self {
        let handle = client.database(database);
        Self { client, database: handle }
    }

    /// Creates a database handle from a client provider.
    pub fn from_provider<P>(provider: &P, database: &str) -> Self
    where
        P: ClientProvider<Client = Client>,
    {
        Self::new(provider.client(), database)
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDatabaseBuilder {
        MongoDatabaseBuilder::new(dsn, database)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The driver's database handle.
    pub fn inner(&self) -> &mongodb::Database {
        &self.database
    }

    /// Starts a client session to pass to service operations.
    pub async fn start_session(&self) -> ServiceResult<ClientSession> {
        self.client.start_session().await.map_err(store_error)
    }

    /// Closes the connection pool.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}

impl Database for MongoDatabase {
    type Collection = MongoCollection;

    fn collection(&self, name: &str, options: &CollectionOptions) -> Self::Collection {
        MongoCollection {
            name: name.to_string(),
            inner: self
                .database
                .collection_with_options(name, collection_options(options.clone())),
        }
    }
}

/// A MongoDB collection handle.
#[derive(Debug, Clone)]
pub struct MongoCollection {
    name: String,
    inner: mongodb::Collection<Document>,
}

impl MongoCollection {
    /// The driver's collection handle.
    pub fn inner(&self) -> &mongodb::Collection<Document> {
        &self.inner
    }
}

#[async_trait]
impl CollectionHandle for MongoCollection {
    type Session = ClientSession;

    fn name(&self) -> &str {
        &self.name
    }

    async fn aggregate<'a>(
        &'a self,
        pipeline: Vec<Document>,
        session: Option<&'a mut ClientSession>,
        options: AggregateOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        let action = self.inner.aggregate(pipeline).with_options(options.into_driver()?);

        match session {
            Some(session) => {
                let cursor = action.session(&mut *session).await.map_err(store_error)?;
                Ok(session_stream(cursor, session))
            }
            None => Ok(action.await.map_err(store_error)?.map_err(store_error).boxed()),
        }
    }

    async fn create_index(
        &self,
        keys: IndexKeys,
        name: String,
        unique: bool,
        session: Option<&mut ClientSession>,
        options: CreateIndexOptions,
    ) -> ServiceResult<String> {
        let (index_options, command_options) = create_index_options(name, unique, options)?;
        let model = IndexModel::builder()
            .keys(keys.to_document())
            .options(index_options)
            .build();

        let action = self.inner.create_index(model).with_options(command_options);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        tracing::debug!(collection = %self.name, index = %result.index_name, "index created");
        Ok(result.index_name)
    }

    async fn drop_index(
        &self,
        index: IndexRef,
        session: Option<&mut ClientSession>,
        options: DropIndexOptions,
    ) -> ServiceResult<()> {
        let action = self.inner.drop_index(index.name()).with_options(options.into_driver()?);
        match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)
    }

    async fn drop_indexes(&self, session: Option<&mut ClientSession>, options: DropIndexOptions) -> ServiceResult<()> {
        let action = self.inner.drop_indexes().with_options(options.into_driver()?);
        match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)
    }

    async fn list_indexes<'a>(
        &'a self,
        session: Option<&'a mut ClientSession>,
        options: ListIndexesOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        let action = self.inner.list_indexes().with_options(options.into_driver()?);

        match session {
            Some(session) => {
                let cursor = action.session(&mut *session).await.map_err(store_error)?;
                Ok(session_stream::<IndexModel>(cursor, session))
            }
            None => Ok(action
                .await
                .map_err(store_error)?
                .map(into_document)
                .boxed()),
        }
    }

    async fn delete_one(&self, query: MongoQuery, session: Option<&mut ClientSession>, options: DeleteOptions) -> ServiceResult<DeleteResult> {
        let action = self.inner.delete_one(query).with_options(options.into_driver()?);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn delete_many(&self, query: MongoQuery, session: Option<&mut ClientSession>, options: DeleteOptions) -> ServiceResult<DeleteResult> {
        let action = self.inner.delete_many(query).with_options(options.into_driver()?);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        Ok(DeleteResult { deleted_count: result.deleted_count })
    }

    async fn find<'a>(
        &'a self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&'a mut ClientSession>,
        options: FindOptions,
    ) -> ServiceResult<DocumentCursor<'a>> {
        let mut options = options.into_driver()?;
        options.projection = projection;
        let action = self.inner.find(query).with_options(options);

        match session {
            Some(session) => {
                let cursor = action.session(&mut *session).await.map_err(store_error)?;
                Ok(session_stream(cursor, session))
            }
            None => Ok(action.await.map_err(store_error)?.map_err(store_error).boxed()),
        }
    }

    async fn find_one(
        &self,
        query: MongoQuery,
        projection: Option<MongoProjection>,
        session: Option<&mut ClientSession>,
        options: FindOptions,
    ) -> ServiceResult<Option<Document>> {
        let mut options = find_one_options(options)?;
        options.projection = projection;
        let action = self.inner.find_one(query).with_options(options);

        match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)
    }

    async fn insert_one(
        &self,
        document: Document,
        session: Option<&mut ClientSession>,
        options: InsertOneOptions,
    ) -> ServiceResult<InsertOneResult> {
        let action = self.inner.insert_one(document).with_options(options.into_driver()?);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        Ok(InsertOneResult { inserted_id: result.inserted_id })
    }

    async fn update_one(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut ClientSession>,
        options: UpdateOneOptions,
    ) -> ServiceResult<UpdateResult> {
        let action = self
            .inner
            .update_one(query, into_modifications(update))
            .with_options(options.into_driver()?);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        query: MongoQuery,
        update: UpdateObject,
        session: Option<&mut ClientSession>,
        options: UpdateManyOptions,
    ) -> ServiceResult<UpdateResult> {
        let action = self
            .inner
            .update_many(query, into_modifications(update))
            .with_options(options.into_driver()?);
        let result = match session {
            Some(session) => action.session(session).await,
            None => action.await,
        }
        .map_err(store_error)?;

        Ok(UpdateResult {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }
}

/// Builder for [`MongoDatabase`] handles.
pub struct MongoDatabaseBuilder {
    dsn: String,
    database: String,
    app_name: Option<String>,
}

impl MongoDatabaseBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
            app_name: None,
        }
    }

    /// Sets the application name reported to the server.
    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[async_trait]
impl DatabaseBuilder for MongoDatabaseBuilder {
    type Database = MongoDatabase;

    async fn build(self) -> ServiceResult<Self::Database> {
        let mut options = ClientOptions::parse(&self.dsn)
            .await
            .map_err(|e| ServiceError::Initialization(e.to_string()))?;
        if self.app_name.is_some() {
            options.app_name = self.app_name;
        }

        let client = Client::with_options(options).map_err(|e| ServiceError::Initialization(e.to_string()))?;
        tracing::debug!(database = %self.database, "mongodb client created");

        Ok(MongoDatabase::new(client, &self.database))
    }
}
