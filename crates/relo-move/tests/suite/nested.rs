use pretty_assertions::assert_eq;
use relo_move::{
    ConflictHandler, ConflictPolicy, MoveError, MoveSession, MoveSettings, MoveTarget,
    OuterInstanceReference, SearchOptions, UsageInfo,
};

use super::{file, load, source, text, to_package};

const INNER_FIXTURE: &str = r#"
//- /a/A.kt
package a

class A {
    fun outerMethod() = 1

    inner class B {
        fun use() = outerMethod()
    }
}

fun make(outer: A) = outer.B()
"#;

#[test]
fn promoting_an_inner_class_passes_the_outer_instance() {
    let host = load(INNER_FIXTURE);
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = MoveTarget::File(file(&host, "a/A.kt"));

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.unresolved_usages, 0);
    assert_eq!(
        text(&host, "a/A.kt"),
        "package a\n\
         \n\
         class A {\n    \
             fun outerMethod() = 1\n\
         }\n\
         \n\
         fun make(outer: A) = B(outer)\n\
         \n\
         class B(private val a: A) {\n    \
             fun use() = a.outerMethod()\n\
         }\n"
    );
}

#[test]
fn analysis_classifies_outer_instance_usages() {
    let host = load(INNER_FIXTURE);
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = MoveTarget::File(file(&host, "a/A.kt"));

    let analysis = MoveSession::new(&host).analyze(&source, &target).unwrap();

    let kinds: Vec<&str> = analysis.usages.iter().map(UsageInfo::kind_name).collect();
    assert_eq!(kinds, vec!["outer-instance", "outer-instance-call"]);
    assert!(matches!(
        analysis.usages[0],
        UsageInfo::OuterInstance(OuterInstanceReference::ImplicitReceiver { .. })
    ));
    let plan = analysis
        .conflicts
        .outer_params
        .values()
        .next()
        .expect("an outer parameter is planned");
    assert_eq!(plan.name, "a");
}

#[test]
fn without_synthesis_outer_usages_are_conflicts() {
    let host = load(INNER_FIXTURE);
    let before = relo_test_utils::render_project(&host.read());
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = MoveTarget::File(file(&host, "a/A.kt"));
    let settings = MoveSettings {
        synthesize_outer_instance: false,
        ..MoveSettings::default()
    };

    let mut session = MoveSession::new(&host)
        .with_settings(settings)
        .with_conflict_handler(ConflictHandler::Batch(ConflictPolicy::Abort));
    let err = session.run(&source, &target).unwrap_err();

    let MoveError::ConflictsRejected { conflicts } = err else {
        panic!("expected rejected conflicts");
    };
    assert!(conflicts
        .messages()
        .any(|message| message.contains("uses the enclosing instance of `a.A`")));
    assert_eq!(relo_test_utils::render_project(&host.read()), before);
}

#[test]
fn nested_class_stays_nested_when_moved_into_a_sibling() {
    let host = load(
        r#"
//- /a/A.kt
package a

class A {
    class B

    class C
}

val b = A.B()
"#,
    );
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = MoveTarget::Container(relo_test_utils::decl(&host.read(), "a.A.C"));

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert_eq!(outcome.unresolved_usages, 0);
    assert_eq!(
        text(&host, "a/A.kt"),
        "package a\n\
         \n\
         class A {\n    \
             class C {\n        \
                 class B\n    \
             }\n\
         }\n\
         \n\
         val b = A.C.B()\n"
    );
}

#[test]
fn labeled_this_becomes_the_outer_parameter() {
    let host = load(
        r#"
//- /a/A.kt
package a

class A {
    val x = 1

    inner class B {
        fun use() = this@A.x
    }
}
"#,
    );
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = MoveTarget::File(file(&host, "a/A.kt"));

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(
        text(&host, "a/A.kt"),
        "package a\n\
         \n\
         class A {\n    \
             val x = 1\n\
         }\n\
         \n\
         class B(private val a: A) {\n    \
             fun use() = a.x\n\
         }\n"
    );
}

#[test]
fn promoted_protected_class_becomes_public() {
    let host = load(
        r#"
//- /a/A.kt
package a

class A {
    protected class B
}
"#,
    );
    let source = source(&host, &["a.A.B"], SearchOptions::default());
    let target = to_package(&host, "a", Some("B.kt"));

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.created_files, vec!["a/B.kt".to_string()]);
    assert_eq!(text(&host, "a/B.kt"), "package a\n\nclass B\n");
    assert_eq!(text(&host, "a/A.kt"), "package a\n\nclass A\n");
}

#[test]
fn emptied_companion_is_deleted_and_light_usages_stay_qualified() {
    let host = load(
        r#"
//- /a/A.kt
package a

class A {
    companion object {
        fun create() = 1
    }
}
//- /c/C.kt
package c

val x = a.A.create()
//- /d/D.java
package d

val y = a.A.create()
"#,
    );
    let source = source(&host, &["a.A.Companion.create"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.unresolved_usages, 0);
    let kinds: Vec<&str> = outcome.usages.iter().map(UsageInfo::kind_name).collect();
    assert_eq!(kinds, vec!["external", "light"]);
    assert_eq!(text(&host, "a/A.kt"), "package a\n\nclass A\n");
    assert_eq!(text(&host, "b/create.kt"), "package b\n\nfun create() = 1\n");
    assert_eq!(
        text(&host, "c/C.kt"),
        "package c\n\nimport b.create\n\nval x = create()\n"
    );
    assert_eq!(text(&host, "d/D.java"), "package d\n\nval y = b.create()\n");
}
