use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::field::{FieldValues, Fields};
use crate::table::{IndexName, Table};

use super::{AccessPattern, AccessPatternDecl, ResolvedKey, ResolvedKeys};

/// A model's access patterns in declaration order.
///
/// Declaration order decides precedence in both directions: the first
/// pattern that resolves (saving) or matches (decoding) wins.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    model: String,
    patterns: Vec<AccessPattern>,
}

impl PatternRegistry {
    pub fn compile(
        model: &str,
        decls: &[AccessPatternDecl],
        table: &Table,
        fields: &Fields,
    ) -> Result<Self> {
        let patterns = decls
            .iter()
            .map(|decl| AccessPattern::compile(decl, table, fields))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            model: model.to_string(),
            patterns,
        })
    }

    pub fn patterns(&self) -> &[AccessPattern] {
        &self.patterns
    }

    /// Patterns declared on `index`, in order.
    pub fn on_index(&self, index: &IndexName) -> impl Iterator<Item = &AccessPattern> + '_ {
        let index = index.clone();
        self.patterns.iter().filter(move |p| *p.index() == index)
    }

    /// Indexes with at least one pattern, in order of first declaration.
    pub fn indexes(&self) -> Vec<&IndexName> {
        let mut indexes: Vec<&IndexName> = Vec::new();
        for pattern in &self.patterns {
            if !indexes.contains(&pattern.index()) {
                indexes.push(pattern.index());
            }
        }
        indexes
    }

    /// Resolves the keys to write for every index the model declares.
    ///
    /// Secondary indexes that no pattern satisfies are left out.
    pub fn resolve_for_save(&self, values: &FieldValues) -> Result<ResolvedKeys> {
        let mut keys: Vec<ResolvedKey> = Vec::new();
        let mut primary = false;

        for index in self.indexes() {
            for pattern in self.on_index(index) {
                if let Some(key) = pattern.resolve_forward(values)? {
                    primary |= index.is_primary();
                    keys.push(key);
                    break;
                }
            }
        }

        if !primary {
            return Err(ModelError::UnsatisfiedPattern {
                model: self.model.clone(),
                index: IndexName::Primary.to_string(),
            });
        }

        keys.sort_by_key(|k| !k.index.is_primary());
        Ok(ResolvedKeys::new(keys))
    }

    /// Picks the pattern a positional query on `index` runs against.
    ///
    /// The first pattern whose arity covers the arguments wins.
    pub fn resolve_for_query(
        &self,
        index: &IndexName,
        args: &[Value],
    ) -> Result<(&AccessPattern, FieldValues)> {
        let mut max = None;
        for pattern in self.on_index(index) {
            if pattern.arity() >= args.len() {
                return Ok((pattern, pattern.bind_positional(args)));
            }
            max = max.max(Some(pattern.arity()));
        }

        match max {
            None => Err(ModelError::NoPatternForIndex {
                model: self.model.clone(),
                index: index.to_string(),
            }),
            Some(max) => Err(ModelError::TooManyArguments {
                model: self.model.clone(),
                index: index.to_string(),
                given: args.len(),
                max,
            }),
        }
    }

    /// Decodes stored key text with the first matching pattern on `index`.
    pub fn reverse_decode(
        &self,
        index: &IndexName,
        partition_raw: &str,
        sort_raw: Option<&str>,
    ) -> Result<(&AccessPattern, FieldValues)> {
        for pattern in self.on_index(index) {
            if let Some(values) = pattern.resolve_reverse(partition_raw, sort_raw)? {
                return Ok((pattern, values));
            }
        }

        let key = match sort_raw {
            Some(sort) => format!("{partition_raw} / {sort}"),
            None => partition_raw.to_string(),
        };
        Err(ModelError::UndecodableKey {
            model: self.model.clone(),
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, FieldSet};
    use crate::table::Index;
    use serde_json::json;

    const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440001";

    fn table() -> Table {
        Table::builder("app", Index::new("PK").with_sort_key("SK"))
            .secondary_index("GSI1", Index::new("GSI1PK").with_sort_key("GSI1SK"))
            .build()
            .unwrap()
    }

    fn fields() -> Fields {
        let set = FieldSet::new("user")
            .field("id", FieldKind::Uuid)
            .field("email", FieldKind::String)
            .field("org", FieldKind::String);
        Fields::merge([&set]).unwrap()
    }

    fn decl(index: IndexName, partition: &str, sort: &str) -> AccessPatternDecl {
        AccessPatternDecl {
            index,
            partition: partition.to_string(),
            sort: Some(sort.to_string()),
        }
    }

    fn user_registry() -> PatternRegistry {
        PatternRegistry::compile(
            "User",
            &[
                decl(IndexName::Primary, "user:{id}", "user:{id}"),
                decl(IndexName::named("GSI1"), "user-email:{email}", "user:{id}"),
            ],
            &table(),
            &fields(),
        )
        .unwrap()
    }

    fn values(value: Value) -> FieldValues {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_save_fans_out_to_every_index() {
        let keys = user_registry()
            .resolve_for_save(&values(json!({ "id": USER_ID, "email": "a@b.com" })))
            .unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.primary().unwrap().partition.value, format!("user:{USER_ID}"));
        let gsi = keys.get(&IndexName::named("GSI1")).unwrap();
        assert_eq!(gsi.partition.value, "user-email:a@b.com");
        assert_eq!(gsi.sort.as_ref().unwrap().value, format!("user:{USER_ID}"));
    }

    #[test]
    fn test_save_omits_unsatisfied_secondary() {
        let keys = user_registry()
            .resolve_for_save(&values(json!({ "id": USER_ID, "email": null })))
            .unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.primary().is_some());
    }

    #[test]
    fn test_save_requires_primary() {
        let result = user_registry().resolve_for_save(&values(json!({ "email": "a@b.com" })));
        assert_eq!(
            result,
            Err(ModelError::UnsatisfiedPattern {
                model: "User".to_string(),
                index: "primary".to_string(),
            })
        );
    }

    #[test]
    fn test_save_takes_first_resolving_pattern() {
        let registry = PatternRegistry::compile(
            "User",
            &[
                decl(IndexName::Primary, "org:{org}", "user:{id}"),
                decl(IndexName::Primary, "user:{id}", "user:{id}"),
            ],
            &table(),
            &fields(),
        )
        .unwrap();

        let with_org = registry
            .resolve_for_save(&values(json!({ "id": USER_ID, "org": "acme" })))
            .unwrap();
        assert_eq!(with_org.primary().unwrap().partition.value, "org:acme");

        let without_org = registry
            .resolve_for_save(&values(json!({ "id": USER_ID })))
            .unwrap();
        assert_eq!(
            without_org.primary().unwrap().partition.value,
            format!("user:{USER_ID}")
        );
    }

    #[test]
    fn test_query_precedence_prefers_first_covering_pattern() {
        let registry = PatternRegistry::compile(
            "User",
            &[
                decl(IndexName::Primary, "user:{id}", "user:{id}"),
                decl(IndexName::Primary, "user:{id}", "email:{email}"),
            ],
            &table(),
            &fields(),
        )
        .unwrap();

        let (pattern, bound) = registry
            .resolve_for_query(&IndexName::Primary, &[json!(USER_ID)])
            .unwrap();
        assert_eq!(pattern.sort_template().unwrap().pattern(), "user:{id}");
        assert_eq!(bound, values(json!({ "id": USER_ID })));

        let (pattern, _) = registry
            .resolve_for_query(&IndexName::Primary, &[json!(USER_ID), json!("a@b.com")])
            .unwrap();
        assert_eq!(pattern.sort_template().unwrap().pattern(), "email:{email}");
    }

    #[test]
    fn test_query_without_pattern_on_index() {
        let registry = PatternRegistry::compile(
            "User",
            &[decl(IndexName::Primary, "user:{id}", "user:{id}")],
            &table(),
            &fields(),
        )
        .unwrap();
        assert_eq!(
            registry
                .resolve_for_query(&IndexName::named("GSI1"), &[json!("a@b.com")])
                .map(|_| ()),
            Err(ModelError::NoPatternForIndex {
                model: "User".to_string(),
                index: "GSI1".to_string(),
            })
        );
    }

    #[test]
    fn test_query_with_too_many_arguments() {
        let result = user_registry()
            .resolve_for_query(&IndexName::Primary, &[json!(USER_ID), json!("extra")])
            .map(|_| ());
        assert_eq!(
            result,
            Err(ModelError::TooManyArguments {
                model: "User".to_string(),
                index: "primary".to_string(),
                given: 2,
                max: 1,
            })
        );
    }

    #[test]
    fn test_reverse_decode() {
        let registry = user_registry();
        let (pattern, decoded) = registry
            .reverse_decode(
                &IndexName::Primary,
                &format!("user:{USER_ID}"),
                Some(&format!("user:{USER_ID}")),
            )
            .unwrap();
        assert_eq!(pattern.index(), &IndexName::Primary);
        assert_eq!(decoded, values(json!({ "id": USER_ID })));
    }

    #[test]
    fn test_reverse_decode_foreign_key() {
        let result = user_registry()
            .reverse_decode(&IndexName::Primary, "order:1", Some("order:1"))
            .map(|_| ());
        assert_eq!(
            result,
            Err(ModelError::UndecodableKey {
                model: "User".to_string(),
                key: "order:1 / order:1".to_string(),
            })
        );
    }

    #[test]
    fn test_reverse_decode_falls_through_to_later_pattern() {
        let registry = PatternRegistry::compile(
            "User",
            &[
                decl(IndexName::Primary, "org:{org}", "user:{id}"),
                decl(IndexName::Primary, "user:{id}", "user:{id}"),
            ],
            &table(),
            &fields(),
        )
        .unwrap();
        let (_, decoded) = registry
            .reverse_decode(
                &IndexName::Primary,
                &format!("user:{USER_ID}"),
                Some(&format!("user:{USER_ID}")),
            )
            .unwrap();
        assert_eq!(decoded, values(json!({ "id": USER_ID })));
    }
}
