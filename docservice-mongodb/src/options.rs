//! Translation of backend-agnostic options into MongoDB driver options.
//!
//! Unset fields stay unset so the server applies its own defaults. Fields the driver has
//! no counterpart for are dropped with a warning.

use bson::{Document, de::deserialize_from_document};
use mongodb::options as driver;

use docservice_core::{
    error::ServiceResult,
    options::{
        Acknowledgment, AggregateOptions, CollectionOptions, CreateIndexOptions, CursorType, DeleteOptions,
        DropIndexOptions, FindOptions, Hint, InsertOneOptions, ListIndexesOptions, ReadConcern, ReadPreference,
        UpdateManyOptions, UpdateOneOptions, WriteConcern,
    },
};

/// Converts an option shape into its driver counterpart.
pub(crate) trait IntoDriver {
    type Driver;

    fn into_driver(self) -> ServiceResult<Self::Driver>;
}

fn collation(document: Option<Document>) -> ServiceResult<Option<driver::Collation>> {
    match document {
        Some(document) => Ok(Some(deserialize_from_document(document)?)),
        None => Ok(None),
    }
}

fn hint(hint: Option<Hint>) -> Option<driver::Hint> {
    hint.map(|hint| match hint {
        Hint::Keys(keys) => driver::Hint::Keys(keys),
        Hint::Name(name) => driver::Hint::Name(name),
    })
}

fn read_preference(preference: ReadPreference) -> driver::SelectionCriteria {
    driver::SelectionCriteria::ReadPreference(match preference {
        ReadPreference::Primary => driver::ReadPreference::Primary,
        ReadPreference::PrimaryPreferred => driver::ReadPreference::PrimaryPreferred { options: None },
        ReadPreference::Secondary => driver::ReadPreference::Secondary { options: None },
        ReadPreference::SecondaryPreferred => driver::ReadPreference::SecondaryPreferred { options: None },
        ReadPreference::Nearest => driver::ReadPreference::Nearest { options: None },
    })
}

fn read_concern(concern: ReadConcern) -> driver::ReadConcern {
    match concern {
        ReadConcern::Local => driver::ReadConcern::local(),
        ReadConcern::Majority => driver::ReadConcern::majority(),
        ReadConcern::Linearizable => driver::ReadConcern::linearizable(),
        ReadConcern::Available => driver::ReadConcern::available(),
        ReadConcern::Snapshot => driver::ReadConcern::snapshot(),
    }
}

fn write_concern(concern: WriteConcern) -> driver::WriteConcern {
    let mut write_concern = driver::WriteConcern::default();
    write_concern.w = concern.w.map(|w| match w {
        Acknowledgment::Nodes(n) => driver::Acknowledgment::Nodes(n),
        Acknowledgment::Majority => driver::Acknowledgment::Majority,
        Acknowledgment::Custom(tag) => driver::Acknowledgment::Custom(tag),
    });
    write_concern.journal = concern.journal;
    write_concern.w_timeout = concern.w_timeout;
    write_concern
}

fn warn_unsupported(operation: &str, option: &str) {
    tracing::warn!(operation, option, "option is not supported by the MongoDB driver and was ignored");
}

pub(crate) fn collection_options(collection: CollectionOptions) -> driver::CollectionOptions {
    let mut options = driver::CollectionOptions::default();
    options.selection_criteria = collection.read_preference.map(read_preference);
    options.read_concern = collection.read_concern.map(read_concern);
    options.write_concern = collection.write_concern.map(write_concern);
    options
}

impl IntoDriver for FindOptions {
    type Driver = driver::FindOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        if self.oplog_replay.is_some() {
            warn_unsupported("find", "oplog_replay");
        }
        if self.snapshot.is_some() {
            warn_unsupported("find", "snapshot");
        }
        if self.max_scan.is_some() {
            warn_unsupported("find", "max_scan");
        }

        let mut options = driver::FindOptions::default();
        options.skip = self.skip;
        options.limit = self.limit;
        options.no_cursor_timeout = self.no_cursor_timeout;
        options.cursor_type = self.cursor_type.map(|cursor_type| match cursor_type {
            CursorType::NonTailable => driver::CursorType::NonTailable,
            CursorType::Tailable => driver::CursorType::Tailable,
            CursorType::TailableAwait => driver::CursorType::TailableAwait,
        });
        options.sort = self.sort;
        options.allow_partial_results = self.allow_partial_results;
        options.batch_size = self.batch_size;
        options.collation = collation(self.collation)?;
        options.hint = hint(self.hint);
        options.max_time = self.max_time;
        options.max = self.max;
        options.min = self.min;
        options.return_key = self.return_key;
        options.show_record_id = self.show_record_id;
        options.comment = self.comment;
        options.allow_disk_use = self.allow_disk_use;
        options.let_vars = self.let_vars;
        Ok(options)
    }
}

/// Find options that are set but have no `find_one` counterpart.
fn find_one_dropped(find: &FindOptions) -> Vec<&'static str> {
    [
        ("limit", find.limit.is_some()),
        ("batch_size", find.batch_size.is_some()),
        ("no_cursor_timeout", find.no_cursor_timeout.is_some()),
        ("cursor_type", find.cursor_type.is_some()),
        ("allow_disk_use", find.allow_disk_use.is_some()),
        ("oplog_replay", find.oplog_replay.is_some()),
        ("snapshot", find.snapshot.is_some()),
        ("max_scan", find.max_scan.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect()
}

/// `find_one` takes the subset of find options that applies to a single document.
pub(crate) fn find_one_options(find: FindOptions) -> ServiceResult<driver::FindOneOptions> {
    for option in find_one_dropped(&find) {
        warn_unsupported("find_one", option);
    }

    let mut options = driver::FindOneOptions::default();
    options.skip = find.skip;
    options.sort = find.sort;
    options.allow_partial_results = find.allow_partial_results;
    options.collation = collation(find.collation)?;
    options.hint = hint(find.hint);
    options.max_time = find.max_time;
    options.max = find.max;
    options.min = find.min;
    options.return_key = find.return_key;
    options.show_record_id = find.show_record_id;
    options.comment = find.comment;
    options.let_vars = find.let_vars;
    Ok(options)
}

impl IntoDriver for InsertOneOptions {
    type Driver = driver::InsertOneOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::InsertOneOptions::default();
        options.bypass_document_validation = self.bypass_document_validation;
        options.comment = self.comment;
        Ok(options)
    }
}

impl IntoDriver for UpdateOneOptions {
    type Driver = driver::UpdateOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::UpdateOptions::default();
        options.upsert = self.upsert;
        options.bypass_document_validation = self.bypass_document_validation;
        options.collation = collation(self.collation)?;
        options.array_filters = self.array_filters;
        options.hint = hint(self.hint);
        options.let_vars = self.let_vars;
        options.comment = self.comment;
        Ok(options)
    }
}

impl IntoDriver for UpdateManyOptions {
    type Driver = driver::UpdateOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        UpdateOneOptions::from(self).into_driver()
    }
}

impl IntoDriver for DeleteOptions {
    type Driver = driver::DeleteOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::DeleteOptions::default();
        options.collation = collation(self.collation)?;
        options.hint = hint(self.hint);
        options.let_vars = self.let_vars;
        options.comment = self.comment;
        Ok(options)
    }
}

impl IntoDriver for AggregateOptions {
    type Driver = driver::AggregateOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::AggregateOptions::default();
        options.allow_disk_use = self.allow_disk_use;
        options.batch_size = self.batch_size;
        options.bypass_document_validation = self.bypass_document_validation;
        options.collation = collation(self.collation)?;
        options.hint = hint(self.hint);
        options.max_time = self.max_time;
        options.comment = self.comment;
        options.let_vars = self.let_vars;
        Ok(options)
    }
}

/// Splits create-index options into the per-index options and the command options.
pub(crate) fn create_index_options(
    name: String,
    unique: bool,
    create: CreateIndexOptions,
) -> ServiceResult<(driver::IndexOptions, driver::CreateIndexOptions)> {
    let mut index = driver::IndexOptions::default();
    index.name = Some(name);
    index.unique = Some(unique);
    index.background = create.background;
    index.sparse = create.sparse;
    index.expire_after = create.expire_after;
    index.partial_filter_expression = create.partial_filter_expression;
    index.collation = collation(create.collation)?;

    let mut command = driver::CreateIndexOptions::default();
    command.max_time = create.max_time;
    command.comment = create.comment;

    Ok((index, command))
}

impl IntoDriver for DropIndexOptions {
    type Driver = driver::DropIndexOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::DropIndexOptions::default();
        options.max_time = self.max_time;
        options.comment = self.comment;
        Ok(options)
    }
}

impl IntoDriver for ListIndexesOptions {
    type Driver = driver::ListIndexesOptions;

    fn into_driver(self) -> ServiceResult<Self::Driver> {
        let mut options = driver::ListIndexesOptions::default();
        options.max_time = self.max_time;
        options.batch_size = self.batch_size;
        options.comment = self.comment;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::time::Duration;

    #[test]
    fn unset_fields_stay_unset() {
        let options = FindOptions::default().into_driver().unwrap();

        assert_eq!(options.limit, None);
        assert_eq!(options.sort, None);
        assert!(options.collation.is_none());
    }

    #[test]
    fn find_options_carry_over() {
        let options = FindOptions {
            skip: Some(5),
            limit: Some(10),
            sort: Some(doc! { "a": -1 }),
            hint: Some(Hint::Name("a_-1".into())),
            collation: Some(doc! { "locale": "en", "strength": 2 }),
            max_time: Some(Duration::from_secs(1)),
            ..Default::default()
        }
        .into_driver()
        .unwrap();

        assert_eq!(options.skip, Some(5));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.sort, Some(doc! { "a": -1 }));
        assert!(matches!(options.hint, Some(driver::Hint::Name(ref name)) if name == "a_-1"));
        assert_eq!(options.collation.map(|c| c.locale), Some("en".to_string()));
        assert_eq!(options.max_time, Some(Duration::from_secs(1)));
    }

    #[test]
    fn find_one_reports_dropped_options() {
        let find = FindOptions {
            limit: Some(3),
            batch_size: Some(10),
            cursor_type: Some(CursorType::Tailable),
            allow_disk_use: Some(true),
            skip: Some(1),
            ..Default::default()
        };

        assert_eq!(find_one_dropped(&find), ["limit", "batch_size", "cursor_type", "allow_disk_use"]);
        assert!(find_one_dropped(&FindOptions::default()).is_empty());

        let options = find_one_options(find).unwrap();
        assert_eq!(options.skip, Some(1));
    }

    #[test]
    fn malformed_collations_are_rejected() {
        let options = DeleteOptions { collation: Some(doc! { "strength": 2 }), ..Default::default() };

        assert!(options.into_driver().is_err());
    }

    #[test]
    fn update_many_maps_like_update_one() {
        let options = UpdateManyOptions { upsert: Some(true), array_filters: Some(vec![doc! { "x.a": 1 }]), ..Default::default() }
            .into_driver()
            .unwrap();

        assert_eq!(options.upsert, Some(true));
        assert_eq!(options.array_filters, Some(vec![doc! { "x.a": 1 }]));
    }

    #[test]
    fn collection_options_translate() {
        let options = collection_options(CollectionOptions {
            read_preference: Some(ReadPreference::Secondary),
            read_concern: Some(ReadConcern::Majority),
            write_concern: Some(WriteConcern { w: Some(Acknowledgment::Majority), journal: Some(true), w_timeout: None }),
        });

        assert!(matches!(
            options.selection_criteria,
            Some(driver::SelectionCriteria::ReadPreference(driver::ReadPreference::Secondary { .. })),
        ));
        assert_eq!(options.read_concern, Some(driver::ReadConcern::majority()));
        let write_concern = options.write_concern.unwrap();
        assert_eq!(write_concern.w, Some(driver::Acknowledgment::Majority));
        assert_eq!(write_concern.journal, Some(true));
    }

    #[test]
    fn index_options_split() {
        let (index, command) = create_index_options(
            "email_1".into(),
            true,
            CreateIndexOptions { sparse: Some(true), max_time: Some(Duration::from_millis(500)), ..Default::default() },
        )
        .unwrap();

        assert_eq!(index.name.as_deref(), Some("email_1"));
        assert_eq!(index.unique, Some(true));
        assert_eq!(index.sparse, Some(true));
        assert_eq!(command.max_time, Some(Duration::from_millis(500)));
    }
}
