#![allow(dead_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use annatto::formats::scheme::TaggingScheme;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One sentence segment: a run of plain tokens or a labeled entity.
#[derive(Clone, Debug)]
pub enum Segment {
    Outside(Vec<String>),
    Entity { tokens: Vec<String>, label: String },
}

/// Tokens that survive whitespace joining and CoNLL's tab split, with
/// some multibyte characters mixed in.
pub fn arb_token() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9éüñ€]{1,6}"
}

pub fn arb_label() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "PER".to_string(),
        "LOC".to_string(),
        "ORG".to_string(),
        "MISC".to_string(),
    ])
}

pub fn arb_segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        prop::collection::vec(arb_token(), 1..4).prop_map(Segment::Outside),
        (prop::collection::vec(arb_token(), 1..4), arb_label())
            .prop_map(|(tokens, label)| Segment::Entity { tokens, label }),
    ]
}

pub fn arb_sentence() -> impl Strategy<Value = Vec<Segment>> {
    prop::collection::vec(arb_segment(), 1..6)
}

/// Encodes a sentence into `(tokens, tags)` under the given scheme.
pub fn encode(segments: &[Segment], scheme: TaggingScheme) -> (Vec<String>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut tags = Vec::new();
    for segment in segments {
        match segment {
            Segment::Outside(words) => {
                for word in words {
                    tokens.push(word.clone());
                    tags.push("O".to_string());
                }
            }
            Segment::Entity {
                tokens: words,
                label,
            } => {
                let last = words.len() - 1;
                for (i, word) in words.iter().enumerate() {
                    tokens.push(word.clone());
                    tags.push(entity_tag(scheme, i, last, label));
                }
            }
        }
    }
    (tokens, tags)
}

fn entity_tag(scheme: TaggingScheme, index: usize, last: usize, label: &str) -> String {
    let single = last == 0;
    let prefix = match scheme {
        TaggingScheme::Iob2 => {
            if index == 0 {
                "B"
            } else {
                "I"
            }
        }
        TaggingScheme::Ioe2 => {
            if index == last {
                "E"
            } else {
                "I"
            }
        }
        TaggingScheme::Iobes => {
            if single {
                "S"
            } else if index == 0 {
                "B"
            } else if index == last {
                "E"
            } else {
                "I"
            }
        }
        TaggingScheme::Bilou => {
            if single {
                "U"
            } else if index == 0 {
                "B"
            } else if index == last {
                "L"
            } else {
                "I"
            }
        }
    };
    format!("{}-{}", prefix, label)
}

/// The entity token runs of a sentence, in order.
pub fn expected_entities(segments: &[Segment]) -> Vec<(Vec<String>, String)> {
    segments
        .iter()
        .filter_map(|segment| match segment {
            Segment::Outside(_) => None,
            Segment::Entity { tokens, label } => Some((tokens.clone(), label.clone())),
        })
        .collect()
}
