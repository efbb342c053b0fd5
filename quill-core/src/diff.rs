//! Diff between a paragraph and its pending suggestion.
//!
//! The comparison is sentence-first: unchanged sentences pass through
//! whole, changed regions are refined to word granularity, and a mostly
//! rewritten text collapses to a single delete/insert pair. Concatenating
//! the equal and delete parts reproduces the original text; the equal and
//! insert parts reproduce the suggestion.

use std::collections::HashSet;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use similar::utils::diff_slices;
use similar::{Algorithm, ChangeTag};

/// How one span of the comparison should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffTag {
    Equal,
    Delete,
    Insert,
}

/// One span of the comparison, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPart {
    pub tag: DiffTag,
    pub text: String,
}

impl DiffPart {
    pub fn equal(text: impl Into<String>) -> Self {
        Self {
            tag: DiffTag::Equal,
            text: text.into(),
        }
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self {
            tag: DiffTag::Delete,
            text: text.into(),
        }
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self {
            tag: DiffTag::Insert,
            text: text.into(),
        }
    }
}

/// Compares paragraph text against its suggestion.
///
/// Within every changed region the deletions come before the insertions.
/// When more than 60% of the words changed, the result collapses to one
/// delete of the full original followed by one insert of the full
/// suggestion.
pub fn diff(original: &str, suggested: &str) -> Vec<DiffPart> {
    if original == suggested {
        if original.is_empty() {
            return Vec::new();
        }
        return vec![DiffPart::equal(original)];
    }
    if is_wholesale_rewrite(original, suggested) {
        let mut parts = Vec::new();
        if !original.is_empty() {
            parts.push(DiffPart::delete(original));
        }
        if !suggested.is_empty() {
            parts.push(DiffPart::insert(suggested));
        }
        return parts;
    }

    let old_sentences = split_sentences(original);
    let new_sentences = split_sentences(suggested);
    let runs = diff_slices(Algorithm::Myers, &old_sentences, &new_sentences);

    let mut parts = Vec::new();
    let mut index = 0;
    while index < runs.len() {
        let (tag, run) = runs[index];
        if tag == ChangeTag::Equal {
            parts.push(DiffPart::equal(run.concat()));
            index += 1;
            continue;
        }
        // Gather the whole changed region between two equal runs.
        let mut deleted = String::new();
        let mut inserted = String::new();
        while index < runs.len() && runs[index].0 != ChangeTag::Equal {
            let (tag, run) = runs[index];
            match tag {
                ChangeTag::Delete => deleted.push_str(&run.concat()),
                _ => inserted.push_str(&run.concat()),
            }
            index += 1;
        }
        if deleted.is_empty() {
            parts.push(DiffPart::insert(inserted));
        } else if inserted.is_empty() {
            parts.push(DiffPart::delete(deleted));
        } else {
            parts.extend(refine(&deleted, &inserted));
        }
    }
    normalize(parts)
}

// Strictly more than 60% of the words on both sides changed.
fn is_wholesale_rewrite(original: &str, suggested: &str) -> bool {
    let old_words: Vec<&str> = original.split_whitespace().collect();
    let new_words: Vec<&str> = suggested.split_whitespace().collect();
    let total = old_words.len() + new_words.len();
    if total == 0 {
        return false;
    }
    let changed: usize = diff_slices(Algorithm::Myers, &old_words, &new_words)
        .iter()
        .filter(|(tag, _)| *tag != ChangeTag::Equal)
        .map(|(_, run)| run.len())
        .sum();
    changed * 5 > total * 3
}

// Word-level pass over one changed region. Deletions in the region are
// flushed before insertions so a replacement always reads old-then-new.
fn refine(deleted: &str, inserted: &str) -> Vec<DiffPart> {
    let old_tokens = split_word_tokens(deleted);
    let new_tokens = split_word_tokens(inserted);
    let runs = diff_slices(Algorithm::Myers, &old_tokens, &new_tokens);

    let mut parts = Vec::new();
    let mut pending_delete = String::new();
    let mut pending_insert = String::new();
    for (tag, run) in runs {
        match tag {
            ChangeTag::Equal => {
                flush_pending(&mut parts, &mut pending_delete, &mut pending_insert);
                parts.push(DiffPart::equal(run.concat()));
            }
            ChangeTag::Delete => pending_delete.push_str(&run.concat()),
            ChangeTag::Insert => pending_insert.push_str(&run.concat()),
        }
    }
    flush_pending(&mut parts, &mut pending_delete, &mut pending_insert);
    parts
}

fn flush_pending(parts: &mut Vec<DiffPart>, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        parts.push(DiffPart::delete(std::mem::take(deleted)));
    }
    if !inserted.is_empty() {
        parts.push(DiffPart::insert(std::mem::take(inserted)));
    }
}

// Merge adjacent parts with the same tag and drop empty ones.
fn normalize(parts: Vec<DiffPart>) -> Vec<DiffPart> {
    let mut merged: Vec<DiffPart> = Vec::new();
    for part in parts {
        if part.text.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if last.tag == part.tag => last.text.push_str(&part.text),
            _ => merged.push(part),
        }
    }
    merged
}

lazy_static! {
    static ref ABBREVIATIONS: HashSet<&'static str> = [
        "Mr.", "Mrs.", "Ms.", "Dr.", "Prof.", "St.", "Mt.", "Jr.", "Sr.", "vs.", "etc.", "e.g.",
        "i.e.",
    ]
    .into_iter()
    .collect();
}

/// Splits text into sentences, keeping terminators and trailing
/// whitespace attached so the pieces concatenate back to the input.
///
/// A terminator run only closes a sentence when followed by whitespace
/// or the end of the text, so decimals and quoted exclamations inside a
/// sentence stay put. Common abbreviations and single-letter initials
/// never close one.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        let mut end = index + ch.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if matches!(next, '.' | '!' | '?') {
                chars.next();
                end = i + next.len_utf8();
            } else {
                break;
            }
        }
        if ends_with_abbreviation(&text[start..end]) {
            continue;
        }
        let mut boundary = end;
        while let Some(&(i, next)) = chars.peek() {
            if next.is_whitespace() {
                chars.next();
                boundary = i + next.len_utf8();
            } else {
                break;
            }
        }
        if boundary > end || boundary == text.len() {
            sentences.push(&text[start..boundary]);
            start = boundary;
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

fn ends_with_abbreviation(segment: &str) -> bool {
    let word = segment
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or(segment);
    if ABBREVIATIONS.contains(word) {
        return true;
    }
    // Single-letter initials, as in "J. K. Rowling".
    let mut chars = word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(first), Some('.'), None) if first.is_uppercase()
    )
}

#[derive(Clone, Copy, PartialEq)]
enum TokenKind {
    Word,
    Space,
    Mark,
}

fn token_kind(ch: char) -> TokenKind {
    if ch.is_alphanumeric() {
        TokenKind::Word
    } else if ch.is_whitespace() {
        TokenKind::Space
    } else {
        TokenKind::Mark
    }
}

// Runs of word characters, whitespace, and punctuation, each its own
// token, so "mat." diffs against "rug." as a word swap plus an equal dot.
fn split_word_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut current = None;
    for (index, ch) in text.char_indices() {
        let kind = token_kind(ch);
        if let Some(previous) = current {
            if previous != kind {
                tokens.push(&text[start..index]);
                start = index;
            }
        }
        current = Some(kind);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }
    tokens
}

// ============================================================================
// Tests
// ============================================================================
