//! Multi-model queries over a shared partition.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::Codec;
use crate::error::{ModelError, Result};
use crate::model::{Model, ModelSchema, Record};
use crate::pattern::AccessPattern;
use crate::query::{QueryBuilder, QueryOptions, QuerySpec, SortCondition};
use crate::store::{Cursor, Item, KeyAttribute, QueryPage};
use crate::table::{IndexName, Table};
use crate::template::{KeyValues, Segment};

type DecodedRecord = Box<dyn Any + Send + Sync>;
type DecodeFn = Arc<dyn Fn(Item) -> Result<DecodedRecord> + Send + Sync>;

/// One model taking part in a collection.
#[derive(Clone)]
pub struct Member {
    type_id: TypeId,
    schema: Arc<ModelSchema>,
    decode: DecodeFn,
}

impl Member {
    /// Compiles `M` as a collection member.
    pub fn of<M: Model>() -> Result<Self> {
        Ok(Self::from_codec(Codec::<M>::new()?))
    }

    pub fn from_codec<M: Model>(codec: Codec<M>) -> Self {
        let schema = Arc::clone(codec.schema());
        Self {
            type_id: TypeId::of::<M>(),
            schema,
            decode: Arc::new(move |item| {
                codec
                    .decode(item)
                    .map(|record| Box::new(record) as DecodedRecord)
            }),
        }
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }
}

impl std::fmt::Debug for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("model", &self.schema.name())
            .field("domain", &self.schema.domain())
            .finish()
    }
}

/// Validated set of models queried together on one index.
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    index: IndexName,
    members: Vec<Member>,
}

impl CollectionSchema {
    /// Checks that the members can share one partition on `index`.
    ///
    /// Members must live in the same table, declare a pattern on the index,
    /// share the exact partition template of their first such pattern and
    /// carry distinct domain tags.
    pub fn new(index: IndexName, members: Vec<Member>) -> Result<Self> {
        let Some(first) = members.first() else {
            return Err(ModelError::IncompatibleModels(
                "a collection needs at least one model".to_string(),
            ));
        };

        let reference = first_pattern(first, &index)?.partition_template();
        for member in &members[1..] {
            let schema = member.schema();
            if schema.table().name() != first.schema().table().name() {
                return Err(ModelError::IncompatibleModels(format!(
                    "{} is stored in {}, {} in {}",
                    schema.name(),
                    schema.table().name(),
                    first.schema().name(),
                    first.schema().table().name()
                )));
            }
            let template = first_pattern(member, &index)?.partition_template();
            if template.segments() != reference.segments() {
                return Err(ModelError::IncompatibleModels(format!(
                    "{} partitions {index} by {template}, {} by {reference}",
                    schema.name(),
                    first.schema().name()
                )));
            }
        }

        for (i, member) in members.iter().enumerate() {
            let duplicate = members[..i]
                .iter()
                .find(|other| other.schema().domain() == member.schema().domain());
            if let Some(other) = duplicate {
                return Err(ModelError::IncompatibleModels(format!(
                    "{} and {} share the domain tag {}",
                    other.schema().name(),
                    member.schema().name(),
                    member.schema().domain()
                )));
            }
        }

        Ok(Self { index, members })
    }

    pub fn index(&self) -> &IndexName {
        &self.index
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn table(&self) -> &Arc<Table> {
        self.members[0].schema().table()
    }

    /// The unfiltered query for the partition bound by `args`.
    ///
    /// Arguments bind the first member's placeholders positionally, the
    /// partition first. Trailing sort arguments narrow the query to the
    /// sort key prefix every member shares; without them the shared
    /// literal prefix is still used.
    pub fn query_spec(&self, args: &[Value], options: QueryOptions) -> Result<QuerySpec> {
        let schema = self.members[0].schema();
        let pattern = first_pattern(&self.members[0], &self.index)?;

        let max = pattern.arity();
        if args.len() > max {
            return Err(ModelError::TooManyArguments {
                model: schema.name().to_string(),
                index: self.index.to_string(),
                given: args.len(),
                max,
            });
        }

        let values = pattern.bind_positional(args);
        let bound = pattern.key_values(&values)?;
        let sort_fields: Vec<&str> = pattern
            .placeholders()
            .skip(pattern.partition_arity())
            .take(args.len().saturating_sub(pattern.partition_arity()))
            .filter(|name| bound.contains_key(*name))
            .collect();

        let mut spec = QueryBuilder::new(schema.table())
            .build(pattern, &values, None)?
            .with_options(options);
        spec.key.sort = self.shared_sort_prefix(&bound, &sort_fields)?;
        Ok(spec)
    }

    /// Begins-with condition on the sort key text common to every member.
    ///
    /// With sort fields bound, every member's sort template must read the
    /// same up to the last of them.
    fn shared_sort_prefix(
        &self,
        bound: &KeyValues,
        sort_fields: &[&str],
    ) -> Result<Option<SortCondition>> {
        let reference = first_pattern(&self.members[0], &self.index)?;
        let (Some(attribute), Some(reference_template)) =
            (reference.sort_attribute(), reference.sort_template())
        else {
            return Ok(None);
        };
        let head: &[Segment] = match sort_fields.last() {
            Some(last) => sort_head(reference_template.segments(), last),
            None => &[],
        };

        let mut shared: Option<String> = None;
        for member in &self.members {
            let pattern = first_pattern(member, &self.index)?;
            let Some((_, rendered)) = pattern.render_sort_prefix(bound) else {
                return Ok(None);
            };
            let leads_with_head = pattern
                .sort_template()
                .is_some_and(|template| template.segments().starts_with(head));
            if !leads_with_head {
                return Err(ModelError::IncompatibleModels(format!(
                    "{} cannot narrow the {} index by {}",
                    member.schema().name(),
                    self.index,
                    sort_fields.join(", ")
                )));
            }

            shared = Some(match shared {
                None => rendered.key,
                Some(prefix) => common_prefix(&prefix, &rendered.key).to_string(),
            });
        }

        Ok(shared
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| SortCondition::BeginsWith(KeyAttribute::new(attribute, prefix))))
    }

    /// Splits a page by domain tag and decodes each item with its member.
    ///
    /// Items tagged with a domain outside the collection are skipped and
    /// reported; an item without a tag, or one that fails to decode, fails
    /// the whole page.
    pub fn group(&self, page: QueryPage) -> Result<GroupedResult> {
        let attribute = self.table().domain_attribute().to_string();
        let mut grouped = GroupedResult {
            groups: HashMap::new(),
            skipped: Vec::new(),
            cursor: page.last_evaluated_key.map(Cursor::from_item),
        };

        for item in page.items {
            let Some(domain) = item.get(&attribute).and_then(Value::as_str) else {
                return Err(ModelError::MissingDomain { attribute });
            };
            let Some(member) = self
                .members
                .iter()
                .find(|m| m.schema().domain() == domain)
            else {
                grouped.skipped.push(domain.to_string());
                continue;
            };
            let record = (member.decode)(item)?;
            grouped
                .groups
                .entry(member.type_id)
                .or_default()
                .push(record);
        }

        Ok(grouped)
    }
}

fn first_pattern<'a>(member: &'a Member, index: &IndexName) -> Result<&'a AccessPattern> {
    member
        .schema()
        .registry()
        .on_index(index)
        .next()
        .ok_or_else(|| {
            ModelError::IncompatibleModels(format!(
                "{} declares no access pattern on the {index} index",
                member.schema().name()
            ))
        })
}

/// Segments up to and including the placeholder `last`.
fn sort_head<'a>(segments: &'a [Segment], last: &str) -> &'a [Segment] {
    segments
        .iter()
        .position(|segment| matches!(segment, Segment::Placeholder(name) if name == last))
        .map_or(segments, |at| &segments[..=at])
}

fn common_prefix<'a>(a: &'a str, b: &str) -> &'a str {
    let len = a
        .char_indices()
        .zip(b.chars())
        .take_while(|((_, x), y)| x == y)
        .last()
        .map_or(0, |((at, c), _)| at + c.len_utf8());
    &a[..len]
}

/// Decoded records of one collection query, grouped by model.
#[derive(Default)]
pub struct GroupedResult {
    groups: HashMap<TypeId, Vec<DecodedRecord>>,
    skipped: Vec<String>,
    cursor: Option<Cursor>,
}

impl GroupedResult {
    /// The records of `M`; empty when the page held none.
    pub fn get<M: Model>(&self) -> Group<'_, M> {
        Group {
            records: self
                .groups
                .get(&TypeId::of::<M>())
                .map(Vec::as_slice)
                .unwrap_or_default(),
            _model: PhantomData,
        }
    }

    /// Domain tags of the items that belonged to no member.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Continuation token of the page, if the store returned one.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Total number of decoded records.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for GroupedResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupedResult")
            .field("records", &self.len())
            .field("skipped", &self.skipped)
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Borrowed view of one model's records; iterate it as often as needed.
pub struct Group<'a, M> {
    records: &'a [DecodedRecord],
    _model: PhantomData<fn() -> M>,
}

impl<'a, M: Model> Group<'a, M> {
    pub fn iter(&self) -> impl Iterator<Item = &'a Record<M>> + 'a {
        self.records
            .iter()
            .filter_map(|record| (**record).downcast_ref::<Record<M>>())
    }

    /// The first record, `None` for an empty group.
    pub fn first(&self) -> Option<&'a Record<M>> {
        self.iter().next()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<M> Clone for Group<'_, M> {
    fn clone(&self) -> Self {
        Self {
            records: self.records,
            _model: PhantomData,
        }
    }
}

impl<'a, M: Model> IntoIterator for Group<'a, M> {
    type Item = &'a Record<M>;
    type IntoIter = Box<dyn Iterator<Item = &'a Record<M>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(
            self.records
                .iter()
                .filter_map(|record| (**record).downcast_ref::<Record<M>>()),
        )
    }
}
