use pretty_assertions::assert_eq;
use relo_move::{MoveSession, MoveTarget, SearchOptions, UsageInfo};

use super::{file, load, source, text, to_package};

const FUNCTION_FIXTURE: &str = r#"
//- /a/A.kt
package a

fun f() = 1

fun g() = f()
//- /c/C.kt
package c

import a.f

fun h() = f()
"#;

#[test]
fn moves_function_to_new_file_and_imports_it() {
    let host = load(FUNCTION_FIXTURE);
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", Some("Util.kt"));

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert_eq!(outcome.created_files, vec!["b/Util.kt".to_string()]);
    assert!(outcome.deleted_files.is_empty());
    assert_eq!(outcome.unresolved_usages, 0);
    assert_eq!(outcome.skipped_usages, 0);
    assert_eq!(outcome.usages.len(), 3);
    assert!(outcome
        .usages
        .iter()
        .all(|usage| matches!(usage, UsageInfo::External { .. })));
    assert_eq!(
        outcome.descriptor.declarations,
        vec!["a.f".parse().unwrap()]
    );

    assert_eq!(text(&host, "b/Util.kt"), "package b\n\nfun f() = 1\n");
    assert_eq!(
        text(&host, "a/A.kt"),
        "package a\n\nimport b.f\n\nfun g() = f()\n"
    );
    assert_eq!(
        text(&host, "c/C.kt"),
        "package c\n\nimport b.f\n\nfun h() = f()\n"
    );
}

#[test]
fn moving_the_last_declaration_deletes_the_file() {
    let host = load(
        r#"
//- /a/Only.kt
package a

class Only
//- /c/C.kt
package c

val x = a.Only()
"#,
    );
    let source = source(&host, &["a.Only"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert_eq!(outcome.created_files, vec!["b/Only.kt".to_string()]);
    assert_eq!(outcome.deleted_files, vec!["a/Only.kt".to_string()]);
    assert!(host.read().find_file("a/Only.kt").is_none());
    assert_eq!(text(&host, "b/Only.kt"), "package b\n\nclass Only\n");
    assert_eq!(
        text(&host, "c/C.kt"),
        "package c\n\nimport b.Only\n\nval x = Only()\n"
    );
}

#[test]
fn every_tracked_declaration_is_mapped() {
    let host = load(
        r#"
//- /a/A.kt
package a

class A {
    class Nested

    companion object {
        fun create() = A()
    }
}
//- /b/B.kt
package b

val made = a.A.create()
"#,
    );
    let source = source(&host, &["a.A"], SearchOptions::default());
    let target = to_package(&host, "c", None);
    let mut session = MoveSession::new(&host);

    let analysis = session.analyze(&source, &target).unwrap();
    assert_eq!(analysis.tracked.len(), 4);
    let old_names: Vec<String> = {
        let tree = host.read();
        analysis
            .tracked
            .iter()
            .map(|&decl| tree.fq_name(decl).to_string())
            .collect()
    };
    let outcome = session.run(&source, &target).unwrap();

    let tree = host.read();
    for (&old, old_name) in analysis.tracked.iter().zip(&old_names) {
        let new = outcome.map.get(old).expect("tracked declaration was moved");
        assert!(tree.is_decl_alive(new));
        assert!(!tree.is_decl_alive(old));
        assert_eq!(
            tree.fq_name(new).to_string(),
            format!("c{}", &old_name[1..])
        );
    }
    drop(tree);
    assert_eq!(outcome.unresolved_usages, 0);
    assert_eq!(
        text(&host, "b/B.kt"),
        "package b\n\nimport c.A\n\nval made = A.create()\n"
    );
}

#[test]
fn rejects_a_move_to_where_the_declarations_already_are() {
    let host = load(FUNCTION_FIXTURE);
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = MoveTarget::File(file(&host, "a/A.kt"));

    let err = MoveSession::new(&host).run(&source, &target).unwrap_err();
    assert_eq!(
        err.to_string(),
        "declarations are already located in `a/A.kt`"
    );
}
