use std::collections::{BTreeMap, BTreeSet};

use relo_syntax::{render_file, SourceTree};
use serde::Serialize;
use similar::TextDiff;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Created,
    Deleted,
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilePreview {
    pub path: String,
    pub change: FileChangeKind,
    pub original: String,
    pub modified: String,
    pub unified_diff: String,
    /// Number of changed regions.
    pub edit_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RefactoringPreview {
    pub total_files: usize,
    pub total_edits: usize,
    pub files: Vec<FilePreview>,
}

/// Canonical text of every live file, keyed by path.
pub fn render_all(tree: &SourceTree) -> BTreeMap<String, String> {
    tree.files()
        .map(|(id, file)| (file.path.clone(), render_file(tree, id).text))
        .collect()
}

/// Per-file diffs between two states of the same project.
pub fn generate_preview(before: &SourceTree, after: &SourceTree) -> RefactoringPreview {
    let original_files = render_all(before);
    let modified_files = render_all(after);

    let mut all_files: BTreeSet<&String> = BTreeSet::new();
    all_files.extend(original_files.keys());
    all_files.extend(modified_files.keys());

    let mut files = Vec::new();
    for path in all_files {
        let original = original_files.get(path).map_or("", String::as_str);
        let modified = modified_files.get(path).map_or("", String::as_str);
        if original == modified {
            continue;
        }
        let change = match (
            original_files.contains_key(path),
            modified_files.contains_key(path),
        ) {
            (false, true) => FileChangeKind::Created,
            (true, false) => FileChangeKind::Deleted,
            _ => FileChangeKind::Modified,
        };

        let diff = TextDiff::from_lines(original, modified);
        let unified_diff = diff
            .unified_diff()
            .context_radius(3)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string();
        let edit_count = diff.grouped_ops(0).len();

        files.push(FilePreview {
            path: path.clone(),
            change,
            original: original.to_string(),
            modified: modified.to_string(),
            unified_diff,
            edit_count,
        });
    }

    RefactoringPreview {
        total_files: files.len(),
        total_edits: files.iter().map(|file| file.edit_count).sum(),
        files,
    }
}

#[cfg(test)]
mod tests {
    use relo_core::FqName;
    use relo_syntax::{parse_file, FileKind};

    use super::*;

    #[test]
    fn reports_created_deleted_and_modified_files() {
        let mut before = SourceTree::new();
        let module = before.add_module("main", "", "jvm");
        let kept = parse_file(&mut before, module, "a/A.kt", FileKind::Primary, "package a\n\nclass A\n").unwrap();
        let gone = parse_file(&mut before, module, "a/B.kt", FileKind::Primary, "package a\n\nclass B\n").unwrap();

        let mut after = before.clone();
        after.delete_file(gone);
        after.file_mut(kept).package = "b".parse::<FqName>().unwrap();
        after.add_file(module, "c/C.kt", FileKind::Primary, "c".parse().unwrap());

        let preview = generate_preview(&before, &after);
        let changes: Vec<_> = preview
            .files
            .iter()
            .map(|file| (file.path.as_str(), file.change))
            .collect();
        assert_eq!(
            changes,
            vec![
                ("a/A.kt", FileChangeKind::Modified),
                ("a/B.kt", FileChangeKind::Deleted),
                ("c/C.kt", FileChangeKind::Created),
            ]
        );
        assert!(preview.files[0].unified_diff.contains("-package a\n+package b\n"));
        assert_eq!(preview.total_files, 3);
    }
}
