use crate::store::{Item, ItemKey, KeyAttribute};
use crate::table::IndexName;

/// Key attributes one access pattern produced for one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub index: IndexName,
    pub partition: KeyAttribute,
    pub sort: Option<KeyAttribute>,
}

impl ResolvedKey {
    pub fn item_key(&self) -> ItemKey {
        ItemKey {
            partition: self.partition.clone(),
            sort: self.sort.clone(),
        }
    }

    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition).chain(self.sort.as_ref())
    }
}

/// The keys of every index a record populates, primary first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedKeys {
    keys: Vec<ResolvedKey>,
}

impl ResolvedKeys {
    pub(crate) fn new(keys: Vec<ResolvedKey>) -> Self {
        Self { keys }
    }

    pub fn primary(&self) -> Option<&ResolvedKey> {
        self.get(&IndexName::Primary)
    }

    pub fn get(&self, index: &IndexName) -> Option<&ResolvedKey> {
        self.keys.iter().find(|k| &k.index == index)
    }

    pub fn contains(&self, index: &IndexName) -> bool {
        self.get(index).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedKey> {
        self.keys.iter()
    }

    /// Every key attribute across indexes.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        self.keys.iter().flat_map(ResolvedKey::attributes)
    }

    /// Writes every key attribute into `item`, replacing same-named attributes.
    pub fn overlay(&self, item: &mut Item) {
        for attribute in self.attributes() {
            item.insert(
                attribute.name.clone(),
                serde_json::Value::String(attribute.value.clone()),
            );
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys() -> ResolvedKeys {
        ResolvedKeys::new(vec![
            ResolvedKey {
                index: IndexName::Primary,
                partition: KeyAttribute::new("PK", "user:1"),
                sort: Some(KeyAttribute::new("SK", "user:1")),
            },
            ResolvedKey {
                index: IndexName::named("GSI1"),
                partition: KeyAttribute::new("GSI1PK", "user-email:a@b.com"),
                sort: Some(KeyAttribute::new("GSI1SK", "user:1")),
            },
        ])
    }

    #[test]
    fn test_lookup_by_index() {
        let keys = keys();
        assert_eq!(keys.primary().unwrap().partition.value, "user:1");
        assert_eq!(
            keys.get(&IndexName::named("GSI1")).unwrap().partition.value,
            "user-email:a@b.com"
        );
        assert!(!keys.contains(&IndexName::named("GSI2")));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_overlay_replaces_attributes() {
        let mut item = Item::new();
        item.insert("PK".to_string(), json!("stale"));
        item.insert("email".to_string(), json!("a@b.com"));

        keys().overlay(&mut item);

        assert_eq!(item["PK"], json!("user:1"));
        assert_eq!(item["GSI1SK"], json!("user:1"));
        assert_eq!(item["email"], json!("a@b.com"));
        assert_eq!(item.len(), 5);
    }
}
