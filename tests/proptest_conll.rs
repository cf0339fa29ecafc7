use proptest::prelude::*;

use annatto::formats::scheme::{char_offsets, TaggingScheme};

mod proptest_helpers;

use proptest_helpers::{arb_sentence, encode, expected_entities};

const SCHEMES: [TaggingScheme; 4] = [
    TaggingScheme::Iob2,
    TaggingScheme::Ioe2,
    TaggingScheme::Iobes,
    TaggingScheme::Bilou,
];

proptest! {
    #![proptest_config(proptest_helpers::proptest_config())]

    /// Slicing the joined sentence at each decoded entity's character
    /// offsets must reproduce exactly the entity's own tokens, joined
    /// with the same delimiter. Holds for every scheme and survives
    /// multibyte tokens because offsets count chars, not bytes.
    #[test]
    fn offsets_slice_back_to_entity_tokens(sentence in arb_sentence()) {
        for scheme in SCHEMES {
            let (tokens, tags) = encode(&sentence, scheme);
            let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
            let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();

            let entities = scheme.decode(&tag_refs);
            let expected = expected_entities(&sentence);
            prop_assert_eq!(entities.len(), expected.len(), "scheme {:?}", scheme);

            let text = tokens.join(" ");
            let chars: Vec<char> = text.chars().collect();
            for (entity, (entity_tokens, label)) in entities.iter().zip(&expected) {
                prop_assert_eq!(&entity.label, label);
                let (start, end) = char_offsets(&token_refs, " ", entity);
                let slice: String = chars[start..end].iter().collect();
                prop_assert_eq!(slice, entity_tokens.join(" "), "scheme {:?}", scheme);
            }
        }
    }

    /// Decoded entities never overlap and appear left to right.
    #[test]
    fn decoded_entities_are_ordered_and_disjoint(sentence in arb_sentence()) {
        for scheme in SCHEMES {
            let (_, tags) = encode(&sentence, scheme);
            let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
            let entities = scheme.decode(&tag_refs);
            for pair in entities.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start);
            }
            for entity in &entities {
                prop_assert!(entity.start < entity.end);
            }
        }
    }
}
