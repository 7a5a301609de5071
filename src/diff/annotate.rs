//! Change mappings, missing sets and popup labels.
//!
//! A [`ChangeMapping`] records what the target's new text replaced in the
//! source (or that it is entirely new). Regions of added words are labelled
//! from it; the missing set is purged of every old text that the mapping
//! already explains as replaced, so a word is never reported both as changed
//! and as deleted.

use std::collections::{HashMap, HashSet};

use serde::ser::{Serialize, Serializer};

use super::filter::WordFilter;
use super::normalize::Normalizer;
use crate::model::{Annotation, ChangePair, Classification, DocumentTokens, Region};

/// Marker used on the wire for text with no counterpart in the source.
pub const NEW_SENTINEL: &str = "NEW";

/// What a new text replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeValue {
    /// The old text it replaced
    Replaced(String),
    /// Nothing: the text did not exist in the source
    New,
}

impl ChangeValue {
    /// Interpret a raw mapping value, where [`NEW_SENTINEL`] means new.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == NEW_SENTINEL {
            ChangeValue::New
        } else {
            ChangeValue::Replaced(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ChangeValue::Replaced(old) => old,
            ChangeValue::New => NEW_SENTINEL,
        }
    }
}

/// One mapping entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    /// Display spelling of the new text
    pub new_text: String,
    pub value: ChangeValue,
}

/// Insertion-ordered map from normalized new text to what it replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeMapping {
    keys: Vec<String>,
    entries: HashMap<String, ChangeEntry>,
}

impl ChangeMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(new_text, old_text | "NEW")` pairs. The first pair for
    /// a normalized key wins.
    pub fn from_pairs<I, K, V>(pairs: I, normalizer: &Normalizer) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut mapping = Self::new();
        for (new_text, old) in pairs {
            let new_text = new_text.as_ref().trim();
            let key = normalizer.normalize_phrase(new_text);
            if key.is_empty() {
                continue;
            }
            mapping.insert(key, new_text.to_string(), ChangeValue::parse(old.as_ref()));
        }
        mapping
    }

    /// Insert unless the key is already present. Returns whether it was inserted.
    pub fn insert(&mut self, key: String, new_text: String, value: ChangeValue) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.keys.push(key.clone());
        self.entries.insert(key, ChangeEntry { new_text, value });
        true
    }

    /// Merge `other` into `self`; entries of `other` replace colliding ones.
    pub fn overlay(&mut self, other: &ChangeMapping) {
        for (key, entry) in other.iter() {
            if self.entries.contains_key(key) {
                self.entries.insert(key.to_string(), entry.clone());
            } else {
                self.insert(key.to_string(), entry.new_text.clone(), entry.value.clone());
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ChangeEntry> {
        self.entries.get(key)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChangeEntry)> {
        self.keys
            .iter()
            .filter_map(|k| self.entries.get(k).map(|e| (k.as_str(), e)))
    }

    /// Keep entries whose normalized key passes the filter.
    pub fn filter_keys(&mut self, filter: &WordFilter) {
        self.retain(|key, _| filter.accepts(key));
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &ChangeEntry) -> bool,
    {
        let entries = &mut self.entries;
        self.keys.retain(|k| {
            let kept = entries.get(k).map(|e| keep(k, e)).unwrap_or(false);
            if !kept {
                entries.remove(k);
            }
            kept
        });
    }

    /// Normalized old texts of every entry that is not new.
    pub fn replaced_texts(&self, normalizer: &Normalizer) -> HashSet<String> {
        self.entries
            .values()
            .filter_map(|e| match &e.value {
                ChangeValue::Replaced(old) => Some(normalizer.normalize_phrase(old)),
                ChangeValue::New => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Serialize for ChangeMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.iter()
                .map(|(_, entry)| (entry.new_text.as_str(), entry.value.as_str())),
        )
    }
}

/// Insertion-ordered set of texts, deduplicated on their normalized form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSet {
    items: Vec<(String, String)>,
    seen: HashSet<String>,
}

impl TextSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `display` under its normalized form. Returns whether it was new.
    pub fn insert(&mut self, display: &str, normalizer: &Normalizer) -> bool {
        let display = display.trim();
        let normalized = normalizer.normalize_phrase(display);
        if normalized.is_empty() || !self.seen.insert(normalized.clone()) {
            return false;
        }
        self.items.push((normalized, display.to_string()));
        true
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.seen.contains(normalized)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        let seen = &mut self.seen;
        self.items.retain(|(normalized, display)| {
            let kept = keep(normalized, display);
            if !kept {
                seen.remove(normalized);
            }
            kept
        });
    }

    /// Keep only texts that pass the filter.
    pub fn filter(&mut self, filter: &WordFilter) {
        self.retain(|_, display| filter.accepts(display));
    }

    /// Display spellings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(_, display)| display.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Serialize for TextSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

/// Remove from `missing` every text the mapping explains as replaced.
pub fn resolve_contradictions(missing: &mut TextSet, mapping: &ChangeMapping, normalizer: &Normalizer) {
    let replaced = mapping.replaced_texts(normalizer);
    if replaced.is_empty() {
        return;
    }
    missing.retain(|normalized, display| {
        let keep = !replaced.contains(normalized);
        if !keep {
            log::debug!("'{}' is explained by a change, dropped from missing", display);
        }
        keep
    });
}

/// Labels regions from a change mapping.
pub struct AnnotationResolver<'a> {
    mapping: &'a ChangeMapping,
}

impl<'a> AnnotationResolver<'a> {
    pub fn new(mapping: &'a ChangeMapping) -> Self {
        Self { mapping }
    }

    /// Attach the popup annotation (and change pair, if any) to `region`.
    ///
    /// Added and deleted regions look up the joined normalized phrase of
    /// their tokens first, then each contributor's lookup key; the first hit
    /// wins. On an added region the entry's value is what the text replaced;
    /// on a deleted region (the original's side) it is what replaced the text.
    pub fn resolve(&self, region: &mut Region, tokens: &DocumentTokens) {
        let ids = region.token_ids();
        let display = tokens.text_of(&ids);

        let annotation = match region.classification {
            Classification::Unchanged => None,
            Classification::Added => Some(match self.lookup(region, tokens) {
                Some(ChangeEntry {
                    new_text,
                    value: ChangeValue::Replaced(old),
                }) => {
                    region.change = Some(ChangePair {
                        old_text: old.clone(),
                        new_text: new_text.clone(),
                    });
                    Annotation {
                        title: "Changed".to_string(),
                        subject: format!("Was: {}", old),
                        content: format!("Changed: {} → {}", old, new_text),
                    }
                }
                Some(ChangeEntry {
                    new_text,
                    value: ChangeValue::New,
                }) => Annotation {
                    title: "New Addition".to_string(),
                    subject: "Not in original".to_string(),
                    content: format!("New: {}", new_text),
                },
                None => generic(Classification::Added, &display),
            }),
            Classification::Deleted => Some(match self.lookup(region, tokens) {
                Some(ChangeEntry {
                    new_text: own,
                    value: ChangeValue::Replaced(replacement),
                }) => {
                    region.change = Some(ChangePair {
                        old_text: own.clone(),
                        new_text: replacement.clone(),
                    });
                    Annotation {
                        title: "Changed".to_string(),
                        subject: format!("Now: {}", replacement),
                        content: format!("Changed: {} → {}", own, replacement),
                    }
                }
                Some(ChangeEntry {
                    new_text: own,
                    value: ChangeValue::New,
                }) => Annotation {
                    title: "Removed".to_string(),
                    subject: "Not in revision".to_string(),
                    content: format!("Removed: {}", own),
                },
                None => generic(Classification::Deleted, &display),
            }),
            class => Some(generic(class, &display)),
        };
        region.annotation = annotation;
    }

    fn lookup(&self, region: &Region, tokens: &DocumentTokens) -> Option<&'a ChangeEntry> {
        let phrase = region
            .contributors
            .iter()
            .filter_map(|c| tokens.get(c.token))
            .map(|t| t.normalized.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mapping = self.mapping;
        std::iter::once(phrase.as_str())
            .chain(region.contributors.iter().map(|c| c.lookup_key.as_str()))
            .find_map(|key| mapping.get(key))
    }
}

fn generic(class: Classification, display: &str) -> Annotation {
    Annotation {
        title: class.label().to_string(),
        subject: String::new(),
        content: format!("{}: {}", class.label(), display),
    }
}

/// Popup of the note listing deleted items, if there are any.
pub fn missing_annotation(missing: &TextSet) -> Option<Annotation> {
    if missing.is_empty() {
        return None;
    }
    let list = missing
        .iter()
        .map(|item| format!("• {}", item))
        .collect::<Vec<_>>()
        .join("\n");
    Some(Annotation {
        title: "Removed".to_string(),
        subject: format!("{} items deleted", missing.len()),
        content: format!("DELETED/REMOVED from original:\n\n{}", list),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, Candidate, DocId, PageWord, TokenId};
    use pretty_assertions::assert_eq;

    fn target() -> DocumentTokens {
        DocumentTokens::from_pages(
            DocId::B,
            vec![vec![
                PageWord::new(10.0, 10.0, 40.0, 20.0, "TES"),
                PageWord::new(42.0, 10.0, 70.0, 20.0, "200ml"),
                PageWord::new(10.0, 40.0, 40.0, 50.0, "Bio"),
            ]],
            &Normalizer::default(),
        )
    }

    fn region(class: Classification, ids: &[u32], tokens: &DocumentTokens) -> Region {
        let mut iter = ids.iter().map(|id| {
            let t = tokens.get(TokenId(*id)).unwrap();
            Candidate {
                token: t.id,
                bbox: t.bbox,
                classification: class,
                lookup_key: t.normalized.clone(),
            }
        });
        let mut region = Region::start(0, iter.next().unwrap());
        for c in iter {
            region.absorb(c);
        }
        region
    }

    #[test]
    fn test_changed_label() {
        let n = Normalizer::default();
        let mapping = ChangeMapping::from_pairs([("TES", "Brun")], &n);
        let tokens = target();
        let mut r = region(Classification::Added, &[0], &tokens);
        AnnotationResolver::new(&mapping).resolve(&mut r, &tokens);

        let a = r.annotation.unwrap();
        assert_eq!(a.title, "Changed");
        assert_eq!(a.subject, "Was: Brun");
        assert_eq!(a.content, "Changed: Brun → TES");
        assert_eq!(
            r.change,
            Some(ChangePair {
                old_text: "Brun".to_string(),
                new_text: "TES".to_string()
            })
        );
    }

    #[test]
    fn test_new_label_and_contributor_fallback() {
        let n = Normalizer::default();
        let mapping = ChangeMapping::from_pairs([("200ml", NEW_SENTINEL)], &n);
        let tokens = target();
        // Joined phrase "tes 200ml" misses; the second contributor's key hits.
        let mut r = region(Classification::Added, &[0, 1], &tokens);
        AnnotationResolver::new(&mapping).resolve(&mut r, &tokens);

        let a = r.annotation.unwrap();
        assert_eq!(a.title, "New Addition");
        assert_eq!(a.subject, "Not in original");
        assert_eq!(a.content, "New: 200ml");
        assert_eq!(r.change, None);
    }

    #[test]
    fn test_phrase_lookup_precedes_contributors() {
        let n = Normalizer::default();
        let mapping =
            ChangeMapping::from_pairs([("tes", "Old1"), ("TES 200ml", "Brun 100ml")], &n);
        let tokens = target();
        let mut r = region(Classification::Added, &[0, 1], &tokens);
        AnnotationResolver::new(&mapping).resolve(&mut r, &tokens);
        assert_eq!(r.annotation.unwrap().subject, "Was: Brun 100ml");
    }

    #[test]
    fn test_generic_labels() {
        let mapping = ChangeMapping::new();
        let tokens = target();
        let resolver = AnnotationResolver::new(&mapping);

        let mut added = region(Classification::Added, &[2], &tokens);
        resolver.resolve(&mut added, &tokens);
        assert_eq!(added.annotation.as_ref().unwrap().title, "Added");
        assert_eq!(added.annotation.unwrap().content, "Added: Bio");

        let mut moved = region(Classification::Moved, &[2], &tokens);
        resolver.resolve(&mut moved, &tokens);
        assert_eq!(moved.annotation.unwrap().title, "Moved");

        let mut deleted = region(Classification::Deleted, &[2], &tokens);
        resolver.resolve(&mut deleted, &tokens);
        assert_eq!(deleted.annotation.unwrap().title, "Deleted");
    }

    #[test]
    fn test_deleted_labels_on_original() {
        let n = Normalizer::default();
        // Keys are the original's words, values what replaced them.
        let mapping = ChangeMapping::from_pairs([("TES", "Brun"), ("Bio", NEW_SENTINEL)], &n);
        let tokens = target();
        let resolver = AnnotationResolver::new(&mapping);

        let mut replaced = region(Classification::Deleted, &[0], &tokens);
        resolver.resolve(&mut replaced, &tokens);
        let a = replaced.annotation.unwrap();
        assert_eq!(a.title, "Changed");
        assert_eq!(a.subject, "Now: Brun");
        assert_eq!(a.content, "Changed: TES → Brun");
        assert_eq!(
            replaced.change,
            Some(ChangePair {
                old_text: "TES".to_string(),
                new_text: "Brun".to_string()
            })
        );

        let mut removed = region(Classification::Deleted, &[2], &tokens);
        resolver.resolve(&mut removed, &tokens);
        let a = removed.annotation.unwrap();
        assert_eq!(a.title, "Removed");
        assert_eq!(a.content, "Removed: Bio");
        assert_eq!(removed.change, None);

        let mut plain = region(Classification::Deleted, &[1], &tokens);
        resolver.resolve(&mut plain, &tokens);
        assert_eq!(plain.annotation.unwrap().content, "Deleted: 200ml");
    }

    #[test]
    fn test_resolve_contradictions() {
        let n = Normalizer::default();
        let mapping = ChangeMapping::from_pairs(
            [("TES", "Brun"), ("Sucre", NEW_SENTINEL)],
            &n,
        );
        let mut missing = TextSet::new();
        missing.insert("BRUN", &n);
        missing.insert("Vanille", &n);
        missing.insert("NEW", &n);

        resolve_contradictions(&mut missing, &mapping, &n);
        assert_eq!(missing.iter().collect::<Vec<_>>(), vec!["Vanille", "NEW"]);
        assert!(!missing.contains("brun"));
    }

    #[test]
    fn test_mapping_first_insert_wins_and_overlay_overrides() {
        let n = Normalizer::default();
        let mut mapping = ChangeMapping::from_pairs([("TES", "Brun"), ("tes", "Noir")], &n);
        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping.get("tes").unwrap().value,
            ChangeValue::Replaced("Brun".to_string())
        );

        let external = ChangeMapping::from_pairs([("Tes", "Rouge"), ("Bio", "NEW")], &n);
        mapping.overlay(&external);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("tes").unwrap().value.as_str(), "Rouge");
        assert_eq!(mapping.get("bio").unwrap().value, ChangeValue::New);
    }

    #[test]
    fn test_mapping_filter_and_serialize() {
        let n = Normalizer::default();
        let mut mapping =
            ChangeMapping::from_pairs(
                [("de", "du"), ("TES", "Brun"), ("Bio", "NEW"), ("Lavande", "de")],
                &n,
            );
        mapping.filter_keys(&WordFilter::default());

        // Only keys are filtered; a stop-word value still labels its change.
        let json = serde_json::to_string(&mapping).unwrap();
        assert_eq!(json, r#"{"TES":"Brun","Bio":"NEW","Lavande":"de"}"#);
    }

    #[test]
    fn test_text_set_dedups_normalized() {
        let n = Normalizer::default();
        let mut set = TextSet::new();
        assert!(set.insert("Lot", &n));
        assert!(!set.insert(" LOT ", &n));
        assert!(!set.insert("   ", &n));
        assert_eq!(set.len(), 1);
        set.filter(&WordFilter::new(4, Vec::<String>::new()));
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_annotation() {
        let n = Normalizer::default();
        let mut set = TextSet::new();
        assert_eq!(missing_annotation(&set), None);
        set.insert("Vanille", &n);
        set.insert("Lot 12", &n);

        let a = missing_annotation(&set).unwrap();
        assert_eq!(a.subject, "2 items deleted");
        assert_eq!(
            a.content,
            "DELETED/REMOVED from original:\n\n• Vanille\n• Lot 12"
        );
    }

    #[test]
    fn test_region_bbox_spans_tokens() {
        let tokens = target();
        let r = region(Classification::Added, &[0, 1], &tokens);
        assert_eq!(r.bbox, BBox::new(10.0, 10.0, 70.0, 20.0));
    }
}
