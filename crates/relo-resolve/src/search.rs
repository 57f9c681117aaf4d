use std::collections::HashMap;

use relo_core::TextRange;
use relo_syntax::{DeclId, ExprId, ExprKind, FileId, SourceTree};

/// Reverse index from declarations to the live references bound to them.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    refs: HashMap<DeclId, Vec<ExprId>>,
}

impl ReferenceIndex {
    pub fn build(tree: &SourceTree) -> Self {
        let mut refs: HashMap<DeclId, Vec<ExprId>> = HashMap::new();
        for (id, expr) in tree.exprs() {
            if let ExprKind::Name(name) = &expr.kind {
                if let Some(binding) = name.binding {
                    refs.entry(binding).or_default().push(id);
                }
            }
        }
        Self { refs }
    }

    pub fn references_to(&self, decl: DeclId) -> &[ExprId] {
        self.refs.get(&decl).map_or(&[], Vec::as_slice)
    }
}

/// Every live name reference bound to `decl`, in allocation order.
pub fn find_references(tree: &SourceTree, decl: DeclId) -> Vec<ExprId> {
    tree.exprs()
        .filter(|(_, expr)| matches!(&expr.kind, ExprKind::Name(name) if name.binding == Some(decl)))
        .map(|(id, _)| id)
        .collect()
}

/// Where a textual occurrence lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOwner {
    /// The doc comment of a declaration.
    Doc(DeclId),
    /// A string literal expression.
    Str(ExprId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextOccurrence {
    pub file: FileId,
    pub owner: TextOwner,
    /// Range inside the owner's stored text.
    pub range: TextRange,
}

/// Find whole-name occurrences of `needle` in doc comments and/or string literals.
pub fn find_text_occurrences(
    tree: &SourceTree,
    needle: &str,
    in_docs: bool,
    in_strings: bool,
) -> Vec<TextOccurrence> {
    let mut out = Vec::new();
    if needle.is_empty() {
        return out;
    }
    if in_docs {
        for (id, decl) in tree.decls() {
            if let Some(doc) = &decl.doc {
                let file = tree.file_of_decl(id);
                out.extend(match_ranges(doc, needle).map(|range| TextOccurrence {
                    file,
                    owner: TextOwner::Doc(id),
                    range,
                }));
            }
        }
    }
    if in_strings {
        let file_of_expr = expr_files(tree);
        for (id, expr) in tree.exprs() {
            let ExprKind::Str(text) = &expr.kind else {
                continue;
            };
            let Some(&file) = file_of_expr.get(&id) else {
                continue;
            };
            out.extend(match_ranges(text, needle).map(|range| TextOccurrence {
                file,
                owner: TextOwner::Str(id),
                range,
            }));
        }
    }
    out
}

fn expr_files(tree: &SourceTree) -> HashMap<ExprId, FileId> {
    let mut out = HashMap::new();
    for (file, data) in tree.files() {
        for &item in &data.items {
            for expr in tree.decl_subtree_exprs(item) {
                out.insert(expr, file);
            }
        }
    }
    out
}

/// Occurrences of `needle` not glued to a longer name on either side.
pub fn match_ranges<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = TextRange> + 'a {
    haystack
        .match_indices(needle)
        .map(|(start, _)| TextRange::at(start, needle.len()))
        .filter(move |range| {
            let before = haystack[..range.start].chars().next_back();
            let after = haystack[range.end..].chars().next();
            let glued_before = before.is_some_and(|c| is_name_char(c) || c == '.');
            let glued_after = after.is_some_and(is_name_char);
            !glued_before && !glued_after
        })
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_whole_names_only() {
        let text = "see a.b.Foo, a.b.FooBar and x.a.b.Foo or a.b.Foo.bar";
        let ranges: Vec<_> = match_ranges(text, "a.b.Foo").collect();
        assert_eq!(ranges.len(), 2);
        assert_eq!(&text[ranges[0].start..ranges[0].end], "a.b.Foo");
        assert_eq!(ranges[1].start, text.rfind("a.b.Foo").unwrap());
    }
}
