use relo_syntax::{DeclId, SourceTree};

use crate::descriptor::is_relocatable;

/// Every declaration whose references must be tracked when `roots` move: the roots and the
/// nested declarations reachable by name from outside, in depth-first source order.
///
/// Instance members, parameters, type parameters and locals are skipped; references to them
/// go through a receiver or a lexical scope that moves along with them.
pub fn collect_declarations_to_track(tree: &SourceTree, roots: &[DeclId]) -> Vec<DeclId> {
    let mut out = Vec::new();
    for &root in roots {
        for decl in tree.subtree_decls(root) {
            if needs_reference_tracking(tree, decl) && !out.contains(&decl) {
                out.push(decl);
            }
        }
    }
    tracing::trace!(target = "relo.move", tracked = out.len(), "collected declarations");
    out
}

/// References to a declaration need tracking exactly when it could be moved on its own.
pub fn needs_reference_tracking(tree: &SourceTree, decl: DeclId) -> bool {
    is_relocatable(tree, decl)
}

#[cfg(test)]
mod tests {
    use relo_core::FqName;
    use relo_syntax::{parse_file, FileKind};

    use super::*;

    fn tree_of(text: &str) -> SourceTree {
        let mut tree = SourceTree::new();
        let module = tree.add_module("main", "", "jvm");
        parse_file(&mut tree, module, "a/A.kt", FileKind::Primary, text).unwrap();
        tree
    }

    fn names(tree: &SourceTree, decls: &[DeclId]) -> Vec<String> {
        decls.iter().map(|&d| tree.fq_name(d).to_string()).collect()
    }

    #[test]
    fn tracks_class_likes_and_object_members() {
        let tree = tree_of(
            "package a\n\nclass A(val p: Int) {\n    fun member() {}\n    class Nested\n    companion object {\n        fun create() {}\n    }\n}\n",
        );
        let root = tree.find_decls(&"a.A".parse::<FqName>().unwrap())[0];
        let tracked = collect_declarations_to_track(&tree, &[root]);
        assert_eq!(
            names(&tree, &tracked),
            vec!["a.A", "a.A.Nested", "a.A.Companion", "a.A.Companion.create"]
        );
    }

    #[test]
    fn top_level_callables_are_tracked_without_their_locals() {
        let tree = tree_of("package a\n\nfun f(x: Int) {\n    val y = x\n}\n");
        let root = tree.find_decls(&"a.f".parse::<FqName>().unwrap())[0];
        assert_eq!(names(&tree, &collect_declarations_to_track(&tree, &[root])), vec!["a.f"]);
    }

    #[test]
    fn tracking_follows_relocatability() {
        let tree = tree_of(
            "package a\n\nobject O {\n    val v = 1\n}\n\nclass C {\n    fun m(p: Int) = p\n}\n",
        );
        let tracked: Vec<String> = tree
            .decls()
            .filter(|&(id, _)| needs_reference_tracking(&tree, id))
            .map(|(id, _)| tree.fq_name(id).to_string())
            .collect();
        assert_eq!(tracked, vec!["a.O", "a.O.v", "a.C"]);
        assert!(tree
            .decls()
            .all(|(id, _)| needs_reference_tracking(&tree, id) == is_relocatable(&tree, id)));
    }
}
