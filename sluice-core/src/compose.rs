use crate::{
    DeleteQuery, Error, InsertQuery, QueryError, QueryRunner, Record, Result, SelectQuery, Session,
    UpdateQuery, Value, ValueKey, check_count,
    phase::{self, Rows},
    RowCount,
};
use futures::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;
use std::{
    fmt::{self, Debug, Formatter},
    future::Future,
    panic::Location,
    sync::Arc,
};

/// Key property removed once the composition is attached.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StripKey {
    #[default]
    None,
    /// The key of the composed rows.
    Internal,
    /// The key of the primary rows.
    External,
}

/// How many composed rows a primary row receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// A list, absent (or empty when requested) for a primary row with no match.
    Many { empty_for_no_value: bool },
    /// Exactly one record, a missing one is an empty result error.
    One,
    /// At most one record, absent when missing.
    NoneOrOne,
}

type QueryFn = dyn Fn(Vec<Value>) -> SelectQuery<Rows> + Send + Sync;
type FetchFn = dyn Fn(Vec<Value>) -> BoxFuture<'static, Result<Vec<Record>>> + Send + Sync;

/// Source of the composed rows, called once with every distinct key.
pub enum Secondary {
    /// Select executed on the same session as the primary statement.
    Query(Box<QueryFn>),
    /// Any asynchronous fetch, for example a call to another service.
    Fetch(Box<FetchFn>),
}

/// Attaches the rows of a secondary source to the primary rows sharing their key.
pub struct Composition {
    /// Key read from the primary rows.
    pub external: String,
    /// Key read from the composed rows.
    pub internal: String,
    /// Property of the primary rows receiving the composed rows.
    pub property: String,
    pub strip: StripKey,
    pub cardinality: Cardinality,
    pub secondary: Secondary,
}

impl Debug for Composition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("external", &self.external)
            .field("internal", &self.internal)
            .field("property", &self.property)
            .field("strip", &self.strip)
            .field("cardinality", &self.cardinality)
            .finish_non_exhaustive()
    }
}

impl Composition {
    async fn apply<R: QueryRunner>(
        &self,
        records: &mut [Record],
        session: &mut Session<R>,
        location: &'static Location<'static>,
    ) -> Result<()> {
        let mut distinct: IndexMap<ValueKey, Value> = IndexMap::new();
        for record in records.iter() {
            if let Some(value) = record.get(&self.external)
                && let Some(key) = value.key()
            {
                distinct.entry(key).or_insert_with(|| value.clone());
            }
        }
        let keys: Vec<Value> = distinct.into_values().collect();
        log::trace!(
            "Composing `{}` of {} rows with the keys {:?}",
            self.property,
            records.len(),
            keys
        );
        let composed = match &self.secondary {
            Secondary::Query(query) => {
                let query = query(keys);
                query.fetch(session, location).await?
            }
            Secondary::Fetch(fetch) => fetch(keys).await?,
        };
        let mut groups: IndexMap<ValueKey, Vec<Record>> = IndexMap::new();
        for mut record in composed {
            let key = match self.strip {
                StripKey::Internal => record.remove(&self.internal),
                _ => record.get(&self.internal).cloned(),
            };
            let Some(key) = key.as_ref().and_then(Value::key) else {
                return Err(QueryError::configuration(format!(
                    "A row composed as `{}` has no value for `{}`",
                    self.property, self.internal
                )));
            };
            groups.entry(key).or_default().push(record);
        }
        for record in records.iter_mut() {
            let key = match self.strip {
                StripKey::External => record.remove(&self.external),
                _ => record.get(&self.external).cloned(),
            };
            let group = key
                .as_ref()
                .and_then(Value::key)
                .and_then(|key| groups.get(&key))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let value = match self.cardinality {
                Cardinality::Many { empty_for_no_value } => {
                    if group.is_empty() && !empty_for_no_value {
                        continue;
                    }
                    Value::List(Some(
                        group
                            .iter()
                            .map(|v| Value::Record(Some(Box::new(v.clone()))))
                            .collect(),
                    ))
                }
                Cardinality::One | Cardinality::NoneOrOne => {
                    if group.is_empty() {
                        if self.cardinality == Cardinality::One {
                            let error = Error::new(QueryError::EmptyResult {
                                operation: "compose one",
                            })
                            .context(format!("No row to compose as `{}`", self.property));
                            log::error!("{:#}", error);
                            return Err(error);
                        }
                        continue;
                    }
                    check_count("compose", group.len() as u64, &RowCount::new(..=1))?;
                    Value::Record(Some(Box::new(group[0].clone())))
                }
            };
            record.insert(self.property.clone(), value);
        }
        Ok(())
    }
}

/// Apply `compositions` in order, each one issues exactly one secondary dispatch.
pub(crate) fn apply_compositions<'a, R: QueryRunner>(
    compositions: &'a [Arc<Composition>],
    records: &'a mut Vec<Record>,
    session: &'a mut Session<R>,
    location: &'static Location<'static>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        for composition in compositions {
            composition.apply(records, session, location).await?;
        }
        Ok(())
    }
    .boxed()
}

/// Statement whose records can be completed by compositions.
pub trait Composable: Sized {
    #[doc(hidden)]
    fn compositions_mut(&mut self) -> &mut Vec<Arc<Composition>>;

    /// Attach rows whose `internal` property matches the `external` property of each record.
    fn compose(
        self,
        external: impl Into<String>,
        internal: impl Into<String>,
        property: impl Into<String>,
    ) -> Compose<Self> {
        Compose::new(self, external.into(), internal.into(), property.into(), StripKey::None)
    }

    /// Like [`Composable::compose`], the composed rows lose their `internal` property.
    fn compose_deleting_internal_property(
        self,
        external: impl Into<String>,
        internal: impl Into<String>,
        property: impl Into<String>,
    ) -> Compose<Self> {
        Compose::new(self, external.into(), internal.into(), property.into(), StripKey::Internal)
    }

    /// Like [`Composable::compose`], the records lose their `external` property.
    fn compose_deleting_external_property(
        self,
        external: impl Into<String>,
        internal: impl Into<String>,
        property: impl Into<String>,
    ) -> Compose<Self> {
        Compose::new(self, external.into(), internal.into(), property.into(), StripKey::External)
    }
}

impl Composable for SelectQuery<Rows> {
    fn compositions_mut(&mut self) -> &mut Vec<Arc<Composition>> {
        &mut self.compositions
    }
}

impl Composable for InsertQuery<phase::Returning> {
    fn compositions_mut(&mut self) -> &mut Vec<Arc<Composition>> {
        &mut self.compositions
    }
}

impl Composable for UpdateQuery<phase::Returning> {
    fn compositions_mut(&mut self) -> &mut Vec<Arc<Composition>> {
        &mut self.compositions
    }
}

impl Composable for DeleteQuery<phase::Returning> {
    fn compositions_mut(&mut self) -> &mut Vec<Arc<Composition>> {
        &mut self.compositions
    }
}

/// Composition being configured, completed by one of the `with_*` methods.
#[derive(Debug)]
pub struct Compose<Q> {
    query: Q,
    external: String,
    internal: String,
    property: String,
    strip: StripKey,
    empty_for_no_value: bool,
}

impl<Q: Composable> Compose<Q> {
    fn new(query: Q, external: String, internal: String, property: String, strip: StripKey) -> Self {
        Self {
            query,
            external,
            internal,
            property,
            strip,
            empty_for_no_value: false,
        }
    }

    /// A record with no composed row receives an empty list instead of nothing.
    pub fn use_empty_array_for_no_value(mut self) -> Self {
        self.empty_for_no_value = true;
        self
    }

    fn attach(mut self, cardinality: Cardinality, secondary: Secondary) -> Q {
        let composition = Composition {
            external: self.external,
            internal: self.internal,
            property: self.property,
            strip: self.strip,
            cardinality,
            secondary,
        };
        self.query.compositions_mut().push(Arc::new(composition));
        self.query
    }

    fn many(&self) -> Cardinality {
        Cardinality::Many {
            empty_for_no_value: self.empty_for_no_value,
        }
    }

    /// `select` receives the distinct keys and returns the rows to attach as a list.
    pub fn with_many(
        self,
        select: impl Fn(Vec<Value>) -> SelectQuery<Rows> + Send + Sync + 'static,
    ) -> Q {
        let cardinality = self.many();
        self.attach(cardinality, Secondary::Query(Box::new(select)))
    }

    pub fn with_one(
        self,
        select: impl Fn(Vec<Value>) -> SelectQuery<Rows> + Send + Sync + 'static,
    ) -> Q {
        self.attach(Cardinality::One, Secondary::Query(Box::new(select)))
    }

    pub fn with_none_or_one(
        self,
        select: impl Fn(Vec<Value>) -> SelectQuery<Rows> + Send + Sync + 'static,
    ) -> Q {
        self.attach(Cardinality::NoneOrOne, Secondary::Query(Box::new(select)))
    }

    /// `fetch` receives the distinct keys and resolves to the rows to attach as a list.
    pub fn with_many_fetched<F>(
        self,
        fetch: impl Fn(Vec<Value>) -> F + Send + Sync + 'static,
    ) -> Q
    where
        F: Future<Output = Result<Vec<Record>>> + Send + 'static,
    {
        let cardinality = self.many();
        self.attach(
            cardinality,
            Secondary::Fetch(Box::new(move |keys| fetch(keys).boxed())),
        )
    }

    pub fn with_one_fetched<F>(self, fetch: impl Fn(Vec<Value>) -> F + Send + Sync + 'static) -> Q
    where
        F: Future<Output = Result<Vec<Record>>> + Send + 'static,
    {
        self.attach(
            Cardinality::One,
            Secondary::Fetch(Box::new(move |keys| fetch(keys).boxed())),
        )
    }

    pub fn with_none_or_one_fetched<F>(
        self,
        fetch: impl Fn(Vec<Value>) -> F + Send + Sync + 'static,
    ) -> Q
    where
        F: Future<Output = Result<Vec<Record>>> + Send + 'static,
    {
        self.attach(
            Cardinality::NoneOrOne,
            Secondary::Fetch(Box::new(move |keys| fetch(keys).boxed())),
        )
    }
}
