use async_trait::async_trait;
use docservice::{
    memory::{MemoryDatabase, MemoryStoreError},
    prelude::*,
};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DocumentModel)]
struct User {
    #[serde(rename = "_id")]
    id: StrObjectId,
    name: String,
    email: String,
    age: i32,
    nickname: Option<String>,
    created_at: UtcDateTime,
}

#[derive(Debug, Serialize)]
struct UserCreate {
    name: String,
    email: String,
    age: i32,
    nickname: Option<String>,
    created_at: UtcDateTime,
}

#[derive(Debug, Default, Serialize, UpdateModel)]
struct UserUpdate {
    name: Patch<String>,
    #[serde(rename = "mail")]
    email: Option<String>,
    age: Patch<i32>,
    nickname: Patch<Option<String>>,
}

type Users = Service<MemoryDatabase, UserCreate, UserUpdate>;

fn created_at() -> UtcDateTime {
    UtcDateTime::parse("2024-03-01T12:30:00").unwrap()
}

fn alice() -> UserCreate {
    UserCreate {
        name: "Alice".into(),
        email: "alice@example.com".into(),
        age: 34,
        nickname: Some("al".into()),
        created_at: created_at(),
    }
}

fn person(name: &str, age: i32) -> UserCreate {
    UserCreate {
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        age,
        nickname: None,
        created_at: created_at(),
    }
}

async fn insert(users: &Users, data: &UserCreate) -> StrObjectId {
    let created = users.insert_one(data, None, None).await.unwrap();
    StrObjectId::try_from(&created.inserted_id).unwrap()
}

async fn load(users: &Users, id: &StrObjectId) -> User {
    let document = users.get_by_id(id, None, None, None).await.unwrap().unwrap();
    User::from_document(document).unwrap()
}

#[tokio::test]
async fn inserted_users_can_be_read_back() {
    let users = Users::new(MemoryDatabase::new(), "users");

    let id = insert(&users, &alice()).await;
    let user = load(&users, &id).await;

    assert_eq!(user.id, id);
    assert_eq!(user.name, "Alice");
    assert_eq!(user.nickname.as_deref(), Some("al"));
    assert_eq!(user.created_at, created_at());
}

#[tokio::test]
async fn missing_documents_read_as_none() {
    let users = Users::new(MemoryDatabase::new(), "users");

    assert!(users.get_by_id(&StrObjectId::new(), None, None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn updates_touch_only_the_fields_that_were_set() {
    let users = Users::new(MemoryDatabase::new(), "users");
    let id = insert(&users, &alice()).await;

    let result = users
        .update_by_id(&id, &UserUpdate { age: Patch::Set(35), ..Default::default() }, None, None)
        .await
        .unwrap();

    assert_eq!(result.matched_count, 1);
    assert_eq!(result.modified_count, 1);

    let user = load(&users, &id).await;
    assert_eq!(user.age, 35);
    assert_eq!(user.name, "Alice");
    assert_eq!(user.nickname.as_deref(), Some("al"));
}

#[tokio::test]
async fn updates_can_explicitly_write_null() {
    let users = Users::new(MemoryDatabase::new(), "users");
    let id = insert(&users, &alice()).await;

    users
        .update_by_id(&id, &UserUpdate { nickname: Patch::Set(None), ..Default::default() }, None, None)
        .await
        .unwrap();

    let document = users.get_by_id(&id, None, None, None).await.unwrap().unwrap();
    assert_eq!(document.get("nickname"), Some(&bson::Bson::Null));
    assert_eq!(document.get_str("name").unwrap(), "Alice");
}

#[tokio::test]
async fn renamed_update_fields_use_their_wire_name() {
    let users = Users::new(MemoryDatabase::new(), "users");

    let changes = UserUpdate { email: Some("a@example.org".into()), ..Default::default() };

    assert_eq!(changes.to_set_document().unwrap(), doc! { "mail": "a@example.org" });
    assert!(UserUpdate::default().to_set_document().unwrap().is_empty());

    let id = insert(&users, &alice()).await;
    users.update_by_id(&id, &changes, None, None).await.unwrap();

    let document = users.get_by_id(&id, None, None, None).await.unwrap().unwrap();
    assert_eq!(document.get_str("mail").unwrap(), "a@example.org");
    assert_eq!(document.get_str("email").unwrap(), "alice@example.com");
}

#[derive(Debug, Default, Serialize, UpdateModel)]
struct ProfileUpdate {
    bio: Patch<String>,
    #[serde(rename(serialize = "display", deserialize = "displayName"))]
    display_name: Patch<String>,
    #[serde(skip)]
    revision: u32,
}

#[test]
fn unset_fields_stay_out_under_split_renames() {
    let changes = ProfileUpdate { bio: "hi".to_string().into(), revision: 7, ..Default::default() };

    assert_eq!(changes.to_set_document().unwrap(), doc! { "bio": "hi" });

    let renamed = ProfileUpdate { display_name: "Al".to_string().into(), ..Default::default() };
    assert_eq!(renamed.to_set_document().unwrap(), doc! { "display": "Al" });
}

#[tokio::test]
async fn update_many_applies_to_every_match() {
    let users = Users::new(MemoryDatabase::new(), "users");
    for (name, age) in [("Bob", 17), ("Carol", 16), ("Dave", 40)] {
        insert(&users, &person(name, age)).await;
    }

    let result = users
        .update_many(
            Filter::lt("age", 18).to_document().unwrap(),
            &UserUpdate { nickname: Patch::Set(Some("minor".into())), ..Default::default() },
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.matched_count, 2);

    let minors = users
        .find(doc! { "nickname": "minor" }, doc! { "name": 1 }, None, None)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    let names = minors.iter().map(|d| d.get_str("name").unwrap()).collect::<Vec<_>>();
    assert_eq!(names, ["Bob", "Carol"]);
}

#[tokio::test]
async fn delete_by_id_reports_the_count() {
    let users = Users::new(MemoryDatabase::new(), "users");
    let id = insert(&users, &alice()).await;

    let deleted = users.delete_by_id(&id, None, None).await.unwrap();
    assert_eq!(DeleteResultModel::from(deleted), DeleteResultModel { delete_count: 1 });

    let again = users.delete_by_id(&id, None, None).await.unwrap();
    assert_eq!(again.deleted_count, 0);
}

#[tokio::test]
async fn find_honours_sort_skip_and_limit() {
    let users = Users::new(MemoryDatabase::new(), "users");
    for (name, age) in [("Bob", 30), ("Carol", 25), ("Dave", 40), ("Erin", 35)] {
        insert(&users, &person(name, age)).await;
    }

    let options = FindOptions {
        sort: Some(doc! { "age": -1 }),
        skip: Some(1),
        limit: Some(2),
        ..Default::default()
    };
    let found = users
        .find(None, None, None, options)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    let ages = found.iter().map(|d| d.get_i32("age").unwrap()).collect::<Vec<_>>();
    assert_eq!(ages, [35, 30]);
}

#[tokio::test]
async fn unique_indexes_surface_the_store_error() {
    let users = Users::new(MemoryDatabase::new(), "users");
    let name = users.create_index("email", "email_unique", true, None, None).await.unwrap();
    assert_eq!(name, "email_unique");

    insert(&users, &alice()).await;
    let err = users.insert_one(&alice(), None, None).await.unwrap_err();

    assert!(matches!(
        err.downcast_store_ref::<MemoryStoreError>(),
        Some(MemoryStoreError::DuplicateKey { index, .. }) if index == "email_unique",
    ));

    let indexes = users
        .list_indexes(None, None)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();
    assert_eq!(indexes.len(), 2);

    users.drop_index("email_unique", None, None).await.unwrap();
    users.insert_one(&alice(), None, None).await.unwrap();
}

#[tokio::test]
async fn sessions_are_threaded_through() {
    let database = MemoryDatabase::new();
    let users = Users::new(database.clone(), "users");
    let mut session = database.start_session();

    let created = users.insert_one(&alice(), Some(&mut session), None).await.unwrap();
    let id = StrObjectId::try_from(&created.inserted_id).unwrap();
    users.get_by_id(&id, None, Some(&mut session), None).await.unwrap();
    users.delete_by_id(&id, Some(&mut session), None).await.unwrap();

    assert_eq!(session.operation_count(), 3);
}

#[tokio::test]
async fn api_representation_uses_plain_strings() {
    let users = Users::new(MemoryDatabase::new(), "users");
    let id = insert(&users, &alice()).await;

    let json = load(&users, &id).await.to_api_json().unwrap();

    assert_eq!(json["id"], id.to_hex());
    assert_eq!(json["created_at"], "2024-03-01T12:30:00Z");
    assert!(json.get("_id").is_none());
}

#[tokio::test]
async fn aggregations_run_against_the_collection() {
    let users = Users::new(MemoryDatabase::new(), "users");
    for (name, age) in [("Bob", 30), ("Carol", 25), ("Dave", 40)] {
        insert(&users, &person(name, age)).await;
    }

    let output = users
        .aggregate(vec![doc! { "$match": { "age": { "$gte": 30 } } }, doc! { "$count": "adults" }], None, None)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap();

    assert_eq!(output, [doc! { "adults": 2_i64 }]);
}

struct Stamped;

impl ServiceHooks<UserCreate, UserUpdate> for Stamped {
    fn prepare_for_update(&self, data: &UserUpdate) -> ServiceResult<UpdateObject> {
        let mut fields = data.to_set_document()?;
        fields.insert("updated_at", created_at());
        Ok(UpdateObject::set(fields))
    }
}

#[tokio::test]
async fn hooks_reshape_updates() {
    let users: Service<_, UserCreate, UserUpdate, Stamped> = Service::with_hooks(MemoryDatabase::new(), "users", Stamped);
    let created = users.insert_one(&alice(), None, None).await.unwrap();
    let id = StrObjectId::try_from(&created.inserted_id).unwrap();

    users
        .update_by_id(&id, &UserUpdate { name: "Alicia".to_string().into(), ..Default::default() }, None, None)
        .await
        .unwrap();

    let document = users.get_by_id(&id, None, None, None).await.unwrap().unwrap();
    assert_eq!(document.get_str("name").unwrap(), "Alicia");
    assert_eq!(UtcDateTime::from(*document.get_datetime("updated_at").unwrap()), created_at());
}

struct UniqueEmail {
    users: Users,
}

#[async_trait]
impl Validator<UserCreate, UserUpdate> for UniqueEmail {
    fn scope(&self) -> ValidateOn {
        ValidateOn::Insert
    }

    async fn validate_insert(&self, data: &UserCreate) -> Result<(), ValidationError> {
        let taken = self
            .users
            .find_one(doc! { "email": data.email.as_str() }, None, None, None)
            .await
            .map_err(|err| ValidationError::Rule(err.to_string()))?;

        match taken {
            Some(_) => Err(ValidationError::Rule(format!("{} is already registered", data.email))),
            None => Ok(()),
        }
    }
}

#[tokio::test]
async fn validators_run_before_the_store_is_called() {
    let database = MemoryDatabase::new();
    let users = Users::new(database.clone(), "users")
        .with_validator(UniqueEmail { users: Users::new(database.clone(), "users") });

    insert(&users, &alice()).await;
    let err = users.insert_one(&alice(), None, None).await.unwrap_err();

    assert!(matches!(err, ServiceError::Validation(ValidationError::Rule(_))));
    let count = users
        .find(None, None, None, None)
        .await
        .unwrap()
        .try_collect::<Vec<_>>()
        .await
        .unwrap()
        .len();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn services_can_be_built_from_providers() {
    let database = MemoryDatabase::named("app");
    let provider = {
        let database = database.clone();
        move || database.clone()
    };

    let users: Users = Service::from_provider(&provider, "users");
    insert(&users, &alice()).await;

    assert_eq!(users.database().name(), "app");
    assert_eq!(database.list_collection_names().await, ["users"]);
}
