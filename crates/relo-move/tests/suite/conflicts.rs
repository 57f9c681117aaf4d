use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use relo_move::{
    ConflictHandler, ConflictLocation, InMemoryHost, MoveError, MoveSession, MoveSource,
    MoveTarget, SearchOptions,
};
use relo_test_utils::{decl, render_project};

use super::{load, source, text, to_package};

const CLASH_FIXTURE: &str = r#"
//- /a/A.kt
package a

fun f() = 1

fun g() = f()
//- /b/B.kt
package b

fun f() = 2
"#;

#[test]
fn name_clash_aborts_and_leaves_the_tree_untouched() {
    let host = load(CLASH_FIXTURE);
    let before = host.snapshot();
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", Some("B.kt"));

    let err = MoveSession::new(&host).run(&source, &target).unwrap_err();

    let MoveError::ConflictsRejected { conflicts } = err else {
        panic!("expected rejected conflicts");
    };
    let messages: Vec<&str> = conflicts.messages().collect();
    assert_eq!(messages, vec!["function `f` already exists in package `b`"]);
    assert!(matches!(
        conflicts.iter().next(),
        Some((ConflictLocation::Declaration(_), _))
    ));
    assert_eq!(host.snapshot(), before);
}

#[test]
fn conflict_detection_is_repeatable() {
    let host = load(CLASH_FIXTURE);
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", Some("B.kt"));
    let session = MoveSession::new(&host);

    let first = session.analyze(&source, &target).unwrap();
    let second = session.analyze(&source, &target).unwrap();

    assert!(!first.conflicts.conflicts.is_empty());
    assert_eq!(first.conflicts.conflicts, second.conflicts.conflicts);
    assert_eq!(first.usages, second.usages);
}

#[test]
fn interactive_handler_sees_conflicts_and_can_decline() {
    let host = load(CLASH_FIXTURE);
    let before = render_project(&host.read());
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", Some("B.kt"));
    let asked = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&asked);
    let handler = ConflictHandler::Interactive(Box::new(move |tree, conflicts| {
        counter.fetch_add(1, Ordering::SeqCst);
        let described = conflicts.describe(tree);
        assert_eq!(described[0].0, "a.f");
        false
    }));
    let err = MoveSession::new(&host)
        .with_conflict_handler(handler)
        .run(&source, &target)
        .unwrap_err();

    assert!(matches!(err, MoveError::ConflictsRejected { .. }));
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(render_project(&host.read()), before);
}

#[test]
fn private_dependencies_are_reported_at_their_usage() {
    let host = load(
        r#"
//- /a/A.kt
package a

private fun secret() = 1

fun f() = secret()
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let analysis = MoveSession::new(&host).analyze(&source, &target).unwrap();

    let described = analysis.conflicts.conflicts.describe(&host.read());
    assert_eq!(
        described,
        vec![(
            "a/A.kt:5:11".to_string(),
            vec!["private `a.secret` will not be accessible from `b/f.kt`".to_string()]
        )]
    );
}

#[test]
fn handler_is_not_consulted_without_conflicts() {
    let host = load(
        r#"
//- /a/A.kt
package a

fun f() = 1
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", None);
    let handler = ConflictHandler::Interactive(Box::new(|_, _| panic!("no conflicts to ask about")));

    let outcome = MoveSession::new(&host)
        .with_conflict_handler(handler)
        .run(&source, &target)
        .unwrap();
    assert_eq!(outcome.deleted_files, vec!["a/A.kt".to_string()]);
    assert_eq!(outcome.created_files, vec!["b/f.kt".to_string()]);
}

fn conflict_messages(host: &InMemoryHost, source: &MoveSource, target: &MoveTarget) -> Vec<String> {
    let analysis = MoveSession::new(host).analyze(source, target).unwrap();
    analysis
        .conflicts
        .conflicts
        .messages()
        .map(str::to_string)
        .collect()
}

fn to_module_package(host: &InMemoryHost, module: &str, package: &str) -> MoveTarget {
    MoveTarget::Package {
        module: host.read().find_module(module).expect("fixture module"),
        package: package.parse().expect("valid package"),
        file_name: None,
    }
}

#[test]
fn expect_declarations_cannot_change_module() {
    let host = load(
        r#"
//- /a/A.kt module=common platform=common
package a

expect fun f()
//- /m/M.kt module=app deps=common
package m

fun g() = 1
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_module_package(&host, "app", "b");

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec!["expect declaration `a.f` cannot be moved to module `app`"]
    );
}

#[test]
fn dependencies_must_be_visible_from_the_destination_module() {
    let host = load(
        r#"
//- /l/L.kt module=lib
package l

fun helper() = 1
//- /a/A.kt module=app deps=lib
package a

import l.helper

fun f() = helper()
//- /o/O.kt module=other
package o

fun unrelated() = 2
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_module_package(&host, "other", "b");

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec!["`l.helper` from module `lib` is not available in module `other`"]
    );
}

const SEALED_FIXTURE: &str = r#"
//- /a/Shape.kt
package a

sealed class Shape

class Circle : Shape()

class Square : Shape()
"#;

#[test]
fn subclasses_of_a_sealed_class_stay_in_its_package() {
    let host = load(SEALED_FIXTURE);
    let source = source(&host, &["a.Circle"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec!["`a.Circle` inherits from sealed `a.Shape` and must stay in package `a` of module `main`"]
    );
}

#[test]
fn sealed_class_cannot_leave_its_subclasses_behind() {
    let host = load(SEALED_FIXTURE);
    let source = source(&host, &["a.Shape"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec![
            "sealed `a.Shape` would be separated from its subclass `a.Circle`",
            "sealed `a.Shape` would be separated from its subclass `a.Square`",
        ]
    );

    let whole = super::source(&host, &["a.Shape", "a.Circle", "a.Square"], SearchOptions::default());
    assert!(conflict_messages(&host, &whole, &target).is_empty());
}

#[test]
fn type_parameters_of_the_old_container_are_reported() {
    let host = load(
        r#"
//- /a/Box.kt
package a

class Box<T> {
    class Item(val value: T)
}
"#,
    );
    let source = source(&host, &["a.Box.Item"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec!["type parameter `T` of `a.Box` is not available outside `a.Box`"]
    );
}

#[test]
fn overriding_members_cannot_leave_their_class() {
    let host = load(
        r#"
//- /a/A.kt
package a

open class Base {
    open fun greet() = 1
}

object Impl : Base() {
    override fun greet() = 2
}

object Elsewhere
"#,
    );
    let source = source(&host, &["a.Impl.greet"], SearchOptions::default());
    let target = MoveTarget::Container(decl(&host.read(), "a.Elsewhere"));

    assert_eq!(
        conflict_messages(&host, &source, &target),
        vec!["`a.Impl.greet` overrides a member of `a.Base` and cannot leave `a.Impl`"]
    );
}

#[test]
fn shadowed_package_name_is_harmless_when_the_reference_is_imported() {
    let host = load(
        r#"
//- /a/A.kt
package a

fun f() = 1
//- /c/C.kt
package c

import a.f

fun y(b: Int) = f()
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let outcome = MoveSession::new(&host).run(&source, &target).unwrap();

    assert!(outcome.conflicts.is_empty());
    assert_eq!(outcome.unresolved_usages, 0);
    assert_eq!(
        text(&host, "c/C.kt"),
        "package c\n\nimport b.f\n\nfun y(b: Int) = f()\n"
    );
}

#[test]
fn shadowed_package_name_conflicts_when_the_qualifier_must_stay() {
    let host = load(
        r#"
//- /a/A.kt
package a

fun f() = 1
//- /c/C.kt
package c

fun f() = 3

fun y(b: Int) = a.f()
"#,
    );
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let messages = conflict_messages(&host, &source, &target);
    assert_eq!(messages.len(), 1, "{messages:?}");
    assert!(
        messages[0].starts_with("`b` refers to `") && messages[0].ends_with("hiding package `b`"),
        "{messages:?}"
    );
}
