use pretty_assertions::assert_eq;
use relo_resolve::{bind_all, find_references, NameResolution, Resolver};
use relo_syntax::{Stmt, SourceTree};
use relo_test_utils::Project;

fn bound(fixture: &str) -> Project {
    let mut project = Project::parse(fixture);
    bind_all(&mut project.tree);
    project
}

fn body_exprs(tree: &SourceTree, fun: relo_syntax::DeclId) -> Vec<relo_syntax::ExprId> {
    tree.decl(fun)
        .body
        .iter()
        .flatten()
        .filter_map(|stmt| match stmt {
            Stmt::Expr(expr) => Some(*expr),
            Stmt::Local(_) => None,
        })
        .collect()
}

#[test]
fn resolves_through_imports_and_packages() {
    let project = bound(
        r#"
//- /a/A.kt
package a

import b.helper

fun caller() {
    helper()
    b.other()
    local()
}

fun local() = 1
//- /b/B.kt
package b

fun helper() = 1
fun other() = 2
"#,
    );
    let tree = &project.tree;
    let exprs = body_exprs(tree, project.decl("a.caller"));
    assert_eq!(tree.expr(exprs[0]).binding(), Some(project.decl("b.helper")));
    assert_eq!(tree.expr(exprs[1]).binding(), Some(project.decl("b.other")));
    assert_eq!(tree.expr(exprs[2]).binding(), Some(project.decl("a.local")));
}

#[test]
fn members_shadow_top_level_declarations() {
    let project = bound(
        r#"
//- /a/A.kt
package a

fun f() = 0

class A {
    fun f() = 1
    fun g() {
        f()
    }
}
"#,
    );
    let tree = &project.tree;
    let call = body_exprs(tree, project.decl("a.A.g"))[0];
    assert_eq!(tree.expr(call).binding(), Some(project.decl("a.A.f")));
}

#[test]
fn resolves_members_through_typed_receivers_and_labels() {
    let project = bound(
        r#"
//- /a/A.kt
package a

class A {
    fun outerMethod() = 1

    class B(private val a: A) {
        fun use() {
            a.outerMethod()
        }
    }

    inner class C {
        fun use() {
            this@A.outerMethod()
        }
    }
}
"#,
    );
    let tree = &project.tree;
    let outer = project.decl("a.A.outerMethod");
    let via_param = body_exprs(tree, project.decl("a.A.B.use"))[0];
    assert_eq!(tree.expr(via_param).binding(), Some(outer));

    let via_label = body_exprs(tree, project.decl("a.A.C.use"))[0];
    assert_eq!(tree.expr(via_label).binding(), Some(outer));
    let this_expr = tree.chain_segments(via_label)[0];
    assert_eq!(tree.expr(this_expr).binding(), Some(project.decl("a.A")));
}

#[test]
fn companion_members_are_reachable_through_the_class_name() {
    let project = bound(
        r#"
//- /a/A.kt
package a

class A {
    companion object {
        fun create() = A()
    }
}

fun make() = A.create()
"#,
    );
    let tree = &project.tree;
    let init = tree.decl(project.decl("a.make")).initializer.unwrap();
    assert_eq!(
        tree.expr(init).binding(),
        Some(project.decl("a.A.Companion.create"))
    );
}

#[test]
fn module_dependencies_limit_visibility() {
    let project = bound(
        r#"
//- /lib/L.kt module=lib
package shared

fun fromLib() = 1
//- /app/A.kt module=app deps=lib
package shared

fun useLib() = fromLib()
//- /other/O.kt module=other
package shared

fun useLibWithoutDep() = fromLib()
"#,
    );
    let tree = &project.tree;
    let ok = tree.decl(project.decl("shared.useLib")).initializer.unwrap();
    let missing = tree
        .decl(project.decl("shared.useLibWithoutDep"))
        .initializer
        .unwrap();
    assert_eq!(tree.expr(ok).binding(), Some(project.decl("shared.fromLib")));
    assert_eq!(tree.expr(missing).binding(), None);
}

#[test]
fn package_segments_resolve_to_packages() {
    let project = bound(
        r#"
//- /a/b/C.kt
package a.b

class C

val c = a.b.C()
"#,
    );
    let tree = &project.tree;
    let resolver = Resolver::new(tree);
    let init = tree.decl(project.decl("a.b.c")).initializer.unwrap();
    let segments = tree.chain_segments(init);
    assert_eq!(
        resolver.resolve(segments[0]),
        NameResolution::Package("a".parse().unwrap())
    );
    assert_eq!(
        resolver.resolve(segments[1]),
        NameResolution::Package("a.b".parse().unwrap())
    );
    assert_eq!(resolver.resolve(segments[2]), NameResolution::Decl(project.decl("a.b.C")));
}

#[test]
fn finds_references_by_binding() {
    let project = bound(
        r#"
//- /a/A.kt
package a

class Target

fun one(t: Target) = Target()
//- /b/B.kt
package b

import a.Target

val t: Target = a.Target()
"#,
    );
    let refs = find_references(&project.tree, project.decl("a.Target"));
    // Parameter type, constructor call, import, property type, qualified call.
    assert_eq!(refs.len(), 5);
}

#[test]
fn supertype_entries_resolve_and_expose_inherited_members() {
    let project = bound(
        r#"
//- /a/A.kt
package a

open class P {
    fun inherited() = 1
}

interface I

class C : P(), I {
    fun g() {
        inherited()
    }
}

sealed class S

class Sub : S()
"#,
    );
    let tree = &project.tree;
    let class = project.decl("a.C");
    let entries: Vec<_> = tree
        .decl(class)
        .supertypes
        .iter()
        .map(|entry| tree.expr(entry.ty).binding())
        .collect();
    assert_eq!(entries, vec![Some(project.decl("a.P")), Some(project.decl("a.I"))]);

    let call = body_exprs(tree, project.decl("a.C.g"))[0];
    assert_eq!(tree.expr(call).binding(), Some(project.decl("a.P.inherited")));

    let resolver = Resolver::new(tree);
    assert_eq!(
        resolver.all_supertypes(class),
        vec![project.decl("a.P"), project.decl("a.I")]
    );
    assert_eq!(
        resolver.direct_subtypes(project.decl("a.S")),
        vec![project.decl("a.Sub")]
    );
}

#[test]
fn cyclic_supertypes_terminate() {
    let project = bound(
        r#"
//- /a/A.kt
package a

open class X : Y()

open class Y : X()
"#,
    );
    let tree = &project.tree;
    let resolver = Resolver::new(tree);
    assert_eq!(resolver.all_supertypes(project.decl("a.X")), vec![project.decl("a.Y")]);
}
