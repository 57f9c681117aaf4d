//! Edits to the moved declarations themselves: promotion out of a class, companion and
//! container-specific modifiers, and the explicit outer-instance parameter.

use relo_syntax::{
    Container, Decl, DeclId, DeclKind, ExprId, ExprKind, Modifier, NameRef, RefRole, SourceTree,
    Visibility,
};

use crate::conflicts::OuterParamPlan;
use crate::descriptor::ResolvedTarget;
use crate::services::ReferenceShortener;
use crate::usages::OuterInstanceReference;

/// Qualifier chain for a fully qualified reference to `decl`: package segments (unbound)
/// followed by the enclosing declarations (bound).
pub fn qualifier_for(tree: &mut SourceTree, decl: DeclId, role: RefRole) -> Option<ExprId> {
    let mut segments: Vec<(String, Option<DeclId>)> = tree
        .package_of_decl(decl)
        .segments()
        .iter()
        .map(|segment| (segment.clone(), None))
        .collect();
    let mut containers: Vec<DeclId> = tree.ancestors(decl).collect();
    containers.reverse();
    segments.extend(
        containers
            .into_iter()
            .map(|container| (tree.decl(container).name.clone(), Some(container))),
    );
    tree.qualifier_chain(&segments, role)
}

/// A new, fully qualified reference to `decl`.
pub fn qualified_reference(tree: &mut SourceTree, decl: DeclId, role: RefRole) -> ExprId {
    let qualifier = qualifier_for(tree, decl, role);
    let name = tree.decl(decl).name.clone();
    tree.alloc_expr(ExprKind::Name(NameRef {
        name,
        qualifier,
        args: None,
        type_args: Vec::new(),
        role,
        binding: Some(decl),
    }))
}

/// Prepare `root` for its destination while it still sits in its original place.
///
/// Returns the synthesized outer-instance parameter when `plan` asks for one.
pub fn preprocess_declaration(
    tree: &mut SourceTree,
    root: DeclId,
    target: &ResolvedTarget,
    plan: Option<&OuterParamPlan>,
) -> Option<DeclId> {
    if let Some(container) = tree.container_decl(root) {
        let stays_nested = target.is_inside(tree, container);
        if !stays_nested && tree.remove_modifier(root, Modifier::Inner) {
            tracing::trace!(target = "relo.move", name = %tree.decl(root).name, "dropped `inner`");
        }
        if target.container_decl().is_none() && tree.decl(root).visibility == Visibility::Protected {
            tree.set_visibility(root, Visibility::Public);
        }
    }
    if tree.remove_modifier(root, Modifier::Companion) {
        tree.decl_mut(root).implicit_name = false;
    }

    let plan = plan?;
    let ty = qualified_reference(tree, plan.outer, RefRole::Type);
    let mut param = Decl::new(
        plan.name.clone(),
        DeclKind::Parameter {
            property: Some(false),
        },
        Container::Decl(root),
    );
    param.visibility = Visibility::Private;
    param.explicit_visibility = true;
    param.ty = Some(ty);
    let param = tree.alloc_decl(param);
    tree.decl_mut(root)
        .params
        .get_or_insert_with(Vec::new)
        .insert(0, param);
    tracing::debug!(
        target = "relo.move",
        class = %tree.decl(root).name,
        param = %plan.name,
        "synthesized outer instance parameter"
    );
    Some(param)
}

/// Rewrite the outer-instance references of one moved root, before it is copied.
///
/// `this@Outer` becomes the synthesized parameter and implicit receivers get it as an explicit
/// qualifier; `this` of an enclosing object becomes a reference to the object. Returns the
/// expressions that were turned into qualified references and should be shortened later.
pub fn preprocess_usages(
    tree: &mut SourceTree,
    references: &[OuterInstanceReference],
    param: Option<DeclId>,
) -> Vec<ExprId> {
    let mut to_shorten = Vec::new();
    for reference in references {
        let expr = reference.expr();
        if !tree.is_expr_alive(expr) {
            continue;
        }
        let outer = reference.outer();
        if tree.decl(outer).is_object() {
            if let OuterInstanceReference::ExplicitThis { .. } = reference {
                let qualifier = qualifier_for(tree, outer, RefRole::Value);
                let name = tree.decl(outer).name.clone();
                tree.replace_expr(
                    expr,
                    ExprKind::Name(NameRef {
                        name,
                        qualifier,
                        args: None,
                        type_args: Vec::new(),
                        role: RefRole::Value,
                        binding: Some(outer),
                    }),
                );
                to_shorten.push(expr);
            }
            continue;
        }
        let Some(param) = param else {
            continue;
        };
        let name = tree.decl(param).name.clone();
        let param_ref = ExprKind::Name(NameRef {
            name,
            qualifier: None,
            args: None,
            type_args: Vec::new(),
            role: RefRole::Value,
            binding: Some(param),
        });
        match reference {
            OuterInstanceReference::ExplicitThis { .. } => tree.replace_expr(expr, param_ref),
            OuterInstanceReference::ImplicitReceiver { .. } => {
                let receiver = tree.alloc_expr(param_ref);
                tree.set_qualifier(expr, Some(receiver));
            }
        }
    }
    to_shorten
}

/// Final touches once `root` (already the copy) sits at its destination.
pub fn postprocess_declaration(
    tree: &mut SourceTree,
    root: DeclId,
    target: &ResolvedTarget,
    param: Option<DeclId>,
    shortener: &dyn ReferenceShortener,
) {
    if let Some(ty) = param.and_then(|param| tree.decl(param).ty) {
        shortener.shorten(tree, ty);
    }
    if target.is_object_container(tree) {
        for modifier in [Modifier::Open, Modifier::Final, Modifier::Abstract, Modifier::Inner] {
            tree.remove_modifier(root, modifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use relo_core::FqName;
    use relo_syntax::{parse_file, render_expr, FileKind};

    use super::*;

    #[test]
    fn qualified_references_bind_containers() {
        let mut tree = SourceTree::new();
        let module = tree.add_module("main", "", "jvm");
        parse_file(
            &mut tree,
            module,
            "p/A.kt",
            FileKind::Primary,
            "package p.q\n\nclass A {\n    class B\n}\n",
        )
        .unwrap();
        let nested = tree.find_decls(&"p.q.A.B".parse::<FqName>().unwrap())[0];
        let outer = tree.find_decls(&"p.q.A".parse::<FqName>().unwrap())[0];

        let expr = qualified_reference(&mut tree, nested, RefRole::Type);
        assert_eq!(render_expr(&tree, expr), "p.q.A.B");
        let segments = tree.chain_segments(expr);
        let bindings: Vec<_> = segments
            .iter()
            .map(|&segment| tree.name_ref(segment).unwrap().binding)
            .collect();
        assert_eq!(bindings, vec![None, None, Some(outer), Some(nested)]);
    }
}
