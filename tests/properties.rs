use goaster::tools::snake_case;
use goaster::{ObjKind, ObjKinds, Tag, Tags, TypKind, TypKinds};
use proptest::prelude::*;

fn tag_strategy() -> impl Strategy<Value = Tag> {
    (
        "[a-z][a-z0-9_]{0,7}",
        "[A-Za-z_][A-Za-z0-9_\\- ]{0,10}",
        proptest::collection::vec("[a-z]{1,8}", 0..3),
    )
        .prop_map(|(key, name, options)| Tag::new(key, name).with_options(options))
}

proptest! {
    #[test]
    fn rendered_tags_parse_back(tags in proptest::collection::vec(tag_strategy(), 0..5)) {
        let mut set = Tags::new();
        for tag in &tags {
            set.set(tag.clone()).unwrap();
        }
        let text = set.to_string();
        let parsed = Tags::parse(&text).unwrap();
        prop_assert_eq!(parsed, set, "text was {}", text);
    }

    #[test]
    fn set_keeps_one_tag_per_key(tags in proptest::collection::vec(tag_strategy(), 1..8)) {
        let mut set = Tags::new();
        for tag in &tags {
            set.set(tag.clone()).unwrap();
        }
        let mut keys = set.keys();
        let n = keys.len();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), n);
        let last = tags.last().unwrap();
        prop_assert_eq!(set.get(&last.key).unwrap(), last);
    }

    #[test]
    fn obj_masks_match_exactly_their_members(bits in 1u32..(1 << ObjKind::ALL.len()) - 1) {
        let members: Vec<ObjKind> = ObjKind::ALL
            .iter()
            .enumerate()
            .filter(|(i, _)| bits & (1 << i) != 0)
            .map(|(_, k)| *k)
            .collect();
        let mask = members.iter().fold(ObjKinds::NONE, |m, k| m | *k);
        for k in ObjKind::ALL {
            prop_assert_eq!(mask.matches(*k), members.contains(k), "kind {} mask {}", k, mask);
        }
        prop_assert_eq!(ObjKinds::parse_list(&mask.to_string()).unwrap(), mask);
    }

    #[test]
    fn typ_kind_is_in_its_own_mask(i in 0usize..12, j in 0usize..12) {
        let (a, b) = (TypKind::ALL[i], TypKind::ALL[j]);
        prop_assert!(a.is_in(a | b));
        prop_assert!(a.is_in(TypKinds::ANY));
        prop_assert_eq!(a.is_in(b), a == b);
    }

    #[test]
    fn snake_case_is_lowercase_and_stable(name in "[A-Z][A-Za-z0-9]{0,12}") {
        let once = snake_case(&name);
        prop_assert!(!once.chars().any(|c| c.is_uppercase()));
        prop_assert_eq!(snake_case(&once), once.clone());
        prop_assert_eq!(once.replace('_', ""), name.to_lowercase());
    }
}
