use relo_move::{MoveSession, NonCodeKind, SearchOptions, UsageInfo};

use super::{load, source, text, to_package};

const FIXTURE: &str = r#"
//- /a/A.kt
package a

class A

/** See a.A for details, not a.AB. */
fun user() = "a.A"
"#;

#[test]
fn qualified_mentions_in_docs_follow_the_move() {
    let host = load(FIXTURE);
    let options = SearchOptions {
        search_in_comments: true,
        ..SearchOptions::default()
    };
    let source = source(&host, &["a.A"], options);
    let target = to_package(&host, "b", None);

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    let non_code: Vec<NonCodeKind> = outcome
        .usages
        .iter()
        .filter_map(|usage| match usage {
            UsageInfo::NonCode { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(non_code, vec![NonCodeKind::DocComment]);
    let after = text(&host, "a/A.kt");
    assert!(after.contains("/** See b.A for details, not a.AB. */"), "{after}");
    assert!(after.contains("fun user() = \"a.A\""), "{after}");
}

#[test]
fn string_literals_are_only_updated_on_request() {
    let host = load(FIXTURE);
    let options = SearchOptions {
        search_for_text: true,
        ..SearchOptions::default()
    };
    let source = source(&host, &["a.A"], options);
    let target = to_package(&host, "b", None);

    MoveSession::new(&host).run(&source, &target).unwrap();

    let after = text(&host, "a/A.kt");
    assert!(after.contains("See a.A for details"), "{after}");
    assert!(after.contains("fun user() = \"b.A\""), "{after}");
}
