use relo_move::{InMemoryHost, MoveSource, MoveTarget, SearchOptions};
use relo_resolve::bind_all;
use relo_syntax::FileId;
use relo_test_utils::{decl, Project};

mod conflicts;
mod fixture_dirs;
mod nested;
mod non_code;
mod session;
mod top_level;

pub(crate) fn load(fixture: &str) -> InMemoryHost {
    let mut project = Project::parse(fixture);
    bind_all(&mut project.tree);
    InMemoryHost::new(project.tree)
}

pub(crate) fn source(host: &InMemoryHost, names: &[&str], options: SearchOptions) -> MoveSource {
    let tree = host.read();
    let decls: Vec<_> = names.iter().map(|name| decl(&tree, name)).collect();
    MoveSource::declarations(&tree, decls, options).expect("valid move source")
}

pub(crate) fn file(host: &InMemoryHost, path: &str) -> FileId {
    host.read()
        .find_file(path)
        .unwrap_or_else(|| panic!("no file {path}"))
}

pub(crate) fn to_package(host: &InMemoryHost, package: &str, file_name: Option<&str>) -> MoveTarget {
    MoveTarget::Package {
        module: host.read().find_module("main").expect("main module"),
        package: package.parse().expect("valid package"),
        file_name: file_name.map(str::to_string),
    }
}

pub(crate) fn text(host: &InMemoryHost, path: &str) -> String {
    relo_test_utils::render_project(&host.read())
        .remove(path)
        .unwrap_or_else(|| panic!("no live file {path}"))
}
