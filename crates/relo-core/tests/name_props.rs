use proptest::prelude::*;
use relo_core::{decapitalize, FqName, LineIndex};

proptest! {
    #[test]
    fn fq_name_display_roundtrips(segments in prop::collection::vec("[a-z][a-z0-9_]{0,6}", 1..5)) {
        prop_assume!(segments.iter().all(|s| relo_core::is_valid_identifier(s)));
        let name = FqName::new(segments.clone());
        let parsed: FqName = name.to_string().parse().unwrap();
        prop_assert_eq!(parsed.segments(), &segments[..]);
    }

    #[test]
    fn decapitalize_preserves_length(name in "[A-Za-z][A-Za-z0-9]{0,10}") {
        prop_assert_eq!(decapitalize(&name).len(), name.len());
    }

    #[test]
    fn line_col_never_exceeds_line_count(text in "[a-z\n]{0,40}", offset in 0usize..60) {
        let index = LineIndex::new(&text);
        let pos = index.line_col(offset);
        prop_assert!((pos.line as usize) < index.line_count());
    }
}
