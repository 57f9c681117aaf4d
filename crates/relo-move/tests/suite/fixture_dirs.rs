use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use relo_move::{MoveSession, SearchOptions};
use relo_test_utils::{assert_fixture_transformed, render_project};

use super::{load, source, to_package};

fn fixture_root(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Join on-disk files back into the multi-file fixture format.
fn as_fixture(files: &BTreeMap<PathBuf, String>) -> String {
    let mut fixture = String::new();
    for (path, text) in files {
        let path = path
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        fixture.push_str(&format!("//- /{path}\n{text}"));
    }
    fixture
}

#[test]
fn move_function_fixture() {
    let root = fixture_root("move_function");
    assert_fixture_transformed(&root.join("before"), &root.join("after"), |files| {
        let host = load(&as_fixture(files));
        let source = source(&host, &["a.f"], SearchOptions::default());
        let target = to_package(&host, "b", Some("Util.kt"));
        MoveSession::new(&host).run(&source, &target).unwrap();

        *files = render_project(&host.read())
            .into_iter()
            .map(|(path, text)| (PathBuf::from(path), text))
            .collect();
    });
}
