//! Locating reported phrases on a document's words.

use std::collections::{HashMap, HashSet};

use super::filter::WordFilter;
use super::normalize::Normalizer;
use crate::model::{Candidate, Classification, DocumentTokens, Token};

/// Words of a phrase at most this long are never searched on their own.
const MIN_FALLBACK_WORD_CHARS: usize = 3;

/// Colour words are too common on labels to locate a phrase by.
const FALLBACK_SKIP_WORDS: &[&str] = &["blanc", "gris", "noir", "beige", "marron"];

/// Finds the words of a document that a phrase refers to.
///
/// Pages are searched in order. On each page the whole phrase is tried first,
/// as a run of consecutive words; only when the page has no such run are the
/// phrase's meaningful words matched one by one. A phrase stops producing
/// highlights once it reached the cap.
pub struct PhraseLocator<'a> {
    normalizer: &'a Normalizer,
    filter: &'a WordFilter,
    max_per_phrase: usize,
}

impl<'a> PhraseLocator<'a> {
    pub fn new(normalizer: &'a Normalizer, filter: &'a WordFilter, max_per_phrase: usize) -> Self {
        Self {
            normalizer,
            filter,
            max_per_phrase,
        }
    }

    /// Locate `phrases` on the given pages of `tokens`.
    ///
    /// Every located token becomes a candidate of `class` whose lookup key is
    /// the normalized phrase. A token is returned at most once.
    pub fn locate<I, S>(
        &self,
        phrases: I,
        class: Classification,
        tokens: &DocumentTokens,
        pages: &[u32],
    ) -> Vec<Candidate>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases: Vec<Vec<String>> = phrases
            .into_iter()
            .map(|p| {
                p.as_ref()
                    .split_whitespace()
                    .map(|w| self.normalizer.normalize(w))
                    .collect::<Vec<_>>()
            })
            .filter(|words| !words.is_empty())
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut taken = HashSet::new();
        let mut located = Vec::new();

        for &page in pages {
            let words = tokens.page(page);
            for phrase in &phrases {
                let key = phrase.join(" ");
                if counts.get(&key).copied().unwrap_or(0) >= self.max_per_phrase {
                    continue;
                }

                let runs = find_runs(words, phrase);
                if !runs.is_empty() {
                    for start in runs {
                        let count = counts.entry(key.clone()).or_insert(0);
                        if *count >= self.max_per_phrase {
                            break;
                        }
                        *count += 1;
                        for token in &words[start..start + phrase.len()] {
                            if taken.insert(token.id) {
                                located.push(candidate(token, class, &key));
                            }
                        }
                    }
                    continue;
                }

                'words: for word in phrase {
                    if word.chars().count() < MIN_FALLBACK_WORD_CHARS
                        || self.filter.is_stop_word(word)
                        || FALLBACK_SKIP_WORDS.contains(&word.to_lowercase().as_str())
                    {
                        continue;
                    }
                    let word_key = format!("{}_{}", key, word);
                    for token in words.iter().filter(|t| &t.normalized == word) {
                        if counts.get(&word_key).copied().unwrap_or(0) >= self.max_per_phrase {
                            break;
                        }
                        if taken.insert(token.id) {
                            located.push(candidate(token, class, &key));
                        }
                        *counts.entry(word_key.clone()).or_insert(0) += 1;
                        let count = counts.entry(key.clone()).or_insert(0);
                        *count += 1;
                        if *count >= self.max_per_phrase {
                            break 'words;
                        }
                    }
                }
            }
        }

        log::debug!("located {} {:?} words", located.len(), class);
        located
    }
}

fn candidate(token: &Token, class: Classification, key: &str) -> Candidate {
    Candidate {
        token: token.id,
        bbox: token.bbox,
        classification: class,
        lookup_key: key.to_string(),
    }
}

/// Start indices of non-overlapping runs of `words` equal to `phrase`.
fn find_runs(words: &[Token], phrase: &[String]) -> Vec<usize> {
    let mut runs = Vec::new();
    let n = phrase.len();
    let mut i = 0;
    while i + n <= words.len() {
        if words[i..i + n]
            .iter()
            .zip(phrase)
            .all(|(t, w)| &t.normalized == w)
        {
            runs.push(i);
            i += n;
        } else {
            i += 1;
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocId, PageWord, TokenId};
    use pretty_assertions::assert_eq;

    fn doc(pages: Vec<Vec<&str>>) -> DocumentTokens {
        let pages = pages
            .into_iter()
            .map(|words| {
                words
                    .into_iter()
                    .enumerate()
                    .map(|(i, w)| {
                        let x = i as f32 * 50.0;
                        PageWord::new(x, 10.0, x + 40.0, 20.0, w)
                    })
                    .collect()
            })
            .collect();
        DocumentTokens::from_pages(DocId::B, pages, &Normalizer::default())
    }

    fn ids(candidates: &[Candidate]) -> Vec<u32> {
        candidates.iter().map(|c| c.token.0).collect()
    }

    #[test]
    fn test_full_phrase_match() {
        let tokens = doc(vec![vec!["Miel", "de", "Fleurs", "Bio", "fleurs"]]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found = PhraseLocator::new(&n, &f, 3).locate(
            ["miel de fleurs"],
            Classification::Added,
            &tokens,
            &[0],
        );
        assert_eq!(ids(&found), vec![0, 1, 2]);
        assert!(found.iter().all(|c| c.lookup_key == "miel de fleurs"));
    }

    #[test]
    fn test_word_fallback_skips_generic_words() {
        let tokens = doc(vec![vec!["Pot", "Lavande", "de", "Provence"]]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found = PhraseLocator::new(&n, &f, 3).locate(
            ["Pot de Lavande"],
            Classification::Moved,
            &tokens,
            &[0],
        );
        // "pot" is a stop word and "de" is too short; only "lavande" is searched.
        assert_eq!(ids(&found), vec![1]);
        assert_eq!(found[0].classification, Classification::Moved);
        assert_eq!(found[0].lookup_key, "pot de lavande");
    }

    #[test]
    fn test_word_fallback_skips_colours() {
        let tokens = doc(vec![vec!["Joint", "Gris", "Silicone", "Blanc"]]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found = PhraseLocator::new(&n, &f, 3).locate(
            ["Silicone gris"],
            Classification::Added,
            &tokens,
            &[0],
        );
        assert_eq!(ids(&found), vec![2]);

        // A whole-phrase match still highlights the colour.
        let found =
            PhraseLocator::new(&n, &f, 3).locate(["gris"], Classification::Added, &tokens, &[0]);
        assert_eq!(ids(&found), vec![1]);
    }

    #[test]
    fn test_cap_across_pages() {
        let tokens = doc(vec![
            vec!["Lot", "Lot"],
            vec!["Lot"],
            vec!["Lot", "Lot"],
        ]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found =
            PhraseLocator::new(&n, &f, 3).locate(["LOT"], Classification::Added, &tokens, &[0, 1, 2]);
        assert_eq!(ids(&found), vec![0, 1, 2]);
        assert_eq!(tokens.get(TokenId(2)).unwrap().page, 1);
    }

    #[test]
    fn test_unselected_pages_are_skipped() {
        let tokens = doc(vec![vec!["Lot"], vec!["Lot"]]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found =
            PhraseLocator::new(&n, &f, 3).locate(["lot"], Classification::Added, &tokens, &[1]);
        assert_eq!(ids(&found), vec![1]);
    }

    #[test]
    fn test_blank_phrases_ignored() {
        let tokens = doc(vec![vec!["Lot"]]);
        let n = Normalizer::default();
        let f = WordFilter::default();
        let found =
            PhraseLocator::new(&n, &f, 3).locate(["", "  "], Classification::Added, &tokens, &[0]);
        assert!(found.is_empty());
    }
}
