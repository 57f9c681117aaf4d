use pretty_assertions::assert_eq;
use relo_resolve::{bind_all, remove_redundant_imports, shorten_reference, ShortenOutcome};
use relo_test_utils::Project;

#[test]
fn drops_qualifier_when_name_is_already_visible() {
    let mut project = Project::parse(
        r#"
//- /a/A.kt
package a

fun target() = 1

fun caller() = a.target()
"#,
    );
    bind_all(&mut project.tree);
    let init = project.tree.decl(project.decl("a.caller")).initializer.unwrap();
    let outcome = shorten_reference(&mut project.tree, init);
    assert!(matches!(outcome, ShortenOutcome::DroppedQualifier { .. }));
    assert_eq!(
        project.text("a/A.kt"),
        "package a\n\nfun target() = 1\n\nfun caller() = target()\n"
    );
}

#[test]
fn imports_top_level_declaration_from_another_package() {
    let mut project = Project::parse(
        r#"
//- /a/A.kt
package a

fun caller() = b.c.target()
//- /b/c/T.kt
package b.c

fun target() = 1
"#,
    );
    bind_all(&mut project.tree);
    let init = project.tree.decl(project.decl("a.caller")).initializer.unwrap();
    let outcome = shorten_reference(&mut project.tree, init);
    assert_eq!(
        outcome,
        ShortenOutcome::Imported {
            head: init,
            fq: "b.c.target".parse().unwrap()
        }
    );
    assert_eq!(
        project.text("a/A.kt"),
        "package a\n\nimport b.c.target\n\nfun caller() = target()\n"
    );
}

#[test]
fn keeps_qualifier_when_import_would_clash() {
    let mut project = Project::parse(
        r#"
//- /a/A.kt
package a

fun target() = 0

fun caller() = b.target()
//- /b/T.kt
package b

fun target() = 1
"#,
    );
    bind_all(&mut project.tree);
    let init = project.tree.decl(project.decl("a.caller")).initializer.unwrap();
    assert_eq!(
        shorten_reference(&mut project.tree, init),
        ShortenOutcome::Unchanged
    );
}

#[test]
fn nested_class_chain_imports_outermost_class() {
    let mut project = Project::parse(
        r#"
//- /a/A.kt
package a

val n = b.Outer.Nested()
//- /b/O.kt
package b

class Outer {
    class Nested
}
"#,
    );
    bind_all(&mut project.tree);
    let init = project.tree.decl(project.decl("a.n")).initializer.unwrap();
    shorten_reference(&mut project.tree, init);
    assert_eq!(
        project.text("a/A.kt"),
        "package a\n\nimport b.Outer\n\nval n = Outer.Nested()\n"
    );
}

#[test]
fn foreign_files_are_never_shortened() {
    let mut project = Project::parse(
        r#"
//- /j/J.java
package j

val x = k.target()
//- /k/K.kt
package k

fun target() = 1
"#,
    );
    bind_all(&mut project.tree);
    let init = project.tree.decl(project.decl("j.x")).initializer.unwrap();
    assert_eq!(
        shorten_reference(&mut project.tree, init),
        ShortenOutcome::Unchanged
    );
}

#[test]
fn removes_duplicate_same_package_and_unused_imports() {
    let mut project = Project::parse(
        r#"
//- /a/A.kt
package a

import b.Used
import a.Local
import b.Unused
import b.Used
import z.Unknown

class Local

val u: Used = Used()
//- /b/B.kt
package b

class Used
class Unused
"#,
    );
    bind_all(&mut project.tree);
    let file = project.file("a/A.kt");
    assert_eq!(remove_redundant_imports(&mut project.tree, file), 3);
    assert_eq!(
        project.text("a/A.kt"),
        "package a\n\nimport b.Used\nimport z.Unknown\n\nclass Local\n\nval u: Used = Used()\n"
    );
}
