//! Tagging-scheme decoding for CoNLL-style inputs.
//!
//! A tagging scheme encodes entity span boundaries as per-token tags
//! (`B-PER`, `I-PER`, `O`, ...). This module decodes a tag sequence into
//! token-index entity spans and converts those into **character**
//! offsets over the joined sentence.

use serde::{Deserialize, Serialize};

/// The supported span-boundary conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaggingScheme {
    #[value(name = "IOB2")]
    Iob2,
    #[value(name = "IOE2")]
    Ioe2,
    #[value(name = "IOBES")]
    Iobes,
    #[value(name = "BILOU")]
    Bilou,
}

/// An entity over token indices: tokens `[start, end)` carry `label`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEntity {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

/// Normalized boundary role of a single tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Begin,
    Inside,
    End,
    Single,
    Out,
}

/// Splits a raw tag into its prefix character and label
/// (`"B-PER"` -> `('B', "PER")`, `"O"` -> `('O', "")`).
fn split_tag(tag: &str) -> (char, &str) {
    match tag.split_once('-') {
        Some((prefix, label)) if prefix.len() == 1 => {
            (prefix.chars().next().unwrap_or('O'), label)
        }
        _ => (tag.chars().next().unwrap_or('O'), ""),
    }
}

impl TaggingScheme {
    /// Maps a tag prefix to its boundary role under this scheme, or
    /// `None` if the prefix is not part of the scheme.
    fn role(&self, prefix: char) -> Option<Role> {
        match (self, prefix) {
            (_, 'O') => Some(Role::Out),
            (TaggingScheme::Iob2, 'B') => Some(Role::Begin),
            (TaggingScheme::Iob2, 'I') => Some(Role::Inside),
            (TaggingScheme::Ioe2, 'I') => Some(Role::Inside),
            (TaggingScheme::Ioe2, 'E') => Some(Role::End),
            (TaggingScheme::Iobes, 'B') => Some(Role::Begin),
            (TaggingScheme::Iobes, 'I') => Some(Role::Inside),
            (TaggingScheme::Iobes, 'E') => Some(Role::End),
            (TaggingScheme::Iobes, 'S') => Some(Role::Single),
            (TaggingScheme::Bilou, 'B') => Some(Role::Begin),
            (TaggingScheme::Bilou, 'I') => Some(Role::Inside),
            (TaggingScheme::Bilou, 'L') => Some(Role::End),
            (TaggingScheme::Bilou, 'U') => Some(Role::Single),
            _ => None,
        }
    }

    /// Decodes a tag sequence into token-index entities.
    ///
    /// Decoding is lenient the way common sequence-evaluation tools are:
    /// an `I` without an opener starts a new entity, an entity left open
    /// at the end of the sentence is closed there, and a tag whose
    /// prefix does not belong to the scheme is treated as `O`.
    pub fn decode(&self, tags: &[&str]) -> Vec<TokenEntity> {
        let mut entities = Vec::new();
        // (start index, label) of the entity currently being built.
        let mut open: Option<(usize, String)> = None;

        let close = |open: &mut Option<(usize, String)>, end: usize,
                     entities: &mut Vec<TokenEntity>| {
            if let Some((start, label)) = open.take() {
                entities.push(TokenEntity { start, end, label });
            }
        };

        for (i, tag) in tags.iter().enumerate() {
            let (prefix, label) = split_tag(tag);
            let role = self.role(prefix).unwrap_or(Role::Out);

            match role {
                Role::Out => close(&mut open, i, &mut entities),
                Role::Begin => {
                    close(&mut open, i, &mut entities);
                    open = Some((i, label.to_string()));
                }
                Role::Single => {
                    close(&mut open, i, &mut entities);
                    entities.push(TokenEntity {
                        start: i,
                        end: i + 1,
                        label: label.to_string(),
                    });
                }
                Role::Inside => match &open {
                    Some((_, current)) if current == label => {}
                    _ => {
                        close(&mut open, i, &mut entities);
                        open = Some((i, label.to_string()));
                    }
                },
                Role::End => {
                    match &open {
                        Some((_, current)) if current == label => {}
                        _ => {
                            close(&mut open, i, &mut entities);
                            open = Some((i, label.to_string()));
                        }
                    }
                    close(&mut open, i + 1, &mut entities);
                }
            }
        }
        close(&mut open, tags.len(), &mut entities);
        entities
    }
}

/// Converts a token-index entity into character offsets over the
/// sentence formed by joining `tokens` with `delimiter`.
///
/// Offsets count Unicode scalar values, matching the downstream span
/// representation:
///
/// - `start = chars(join(tokens[..start])) + chars(delimiter)` when the
///   prefix is non-empty, else `0`
/// - `end = start + chars(join(tokens[start..end]))`
pub fn char_offsets(tokens: &[&str], delimiter: &str, entity: &TokenEntity) -> (usize, usize) {
    let chars = |s: &str| s.chars().count();
    let joined_len = |tokens: &[&str]| -> usize {
        if tokens.is_empty() {
            return 0;
        }
        tokens.iter().map(|t| chars(t)).sum::<usize>() + chars(delimiter) * (tokens.len() - 1)
    };

    let start = if entity.start == 0 {
        0
    } else {
        joined_len(&tokens[..entity.start]) + chars(delimiter)
    };
    let end = start + joined_len(&tokens[entity.start..entity.end]);
    (start, end)
}
