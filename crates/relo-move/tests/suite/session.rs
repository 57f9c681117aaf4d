use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relo_core::FqName;
use relo_move::{
    FileChangeKind, MoveDescriptor, MoveError, MoveListener, MoveOutcome, MoveSession,
    MoveSource, MoveTarget, SearchOptions, TargetError,
};
use relo_syntax::DeclId;
use relo_test_utils::{decl, render_project};

use super::{file, load, source, to_package};

const FIXTURE: &str = r#"
//- /a/A.kt
package a

class A {
    class Nested

    fun member() = 1
}

fun f() = 1

fun g() = f()
//- /c/C.kt
package c

fun h() = a.f()
//- /x/X.kt
package y

val marker = 0
"#;

#[test]
fn preview_reports_diffs_without_touching_the_host() {
    let host = load(FIXTURE);
    let before = render_project(&host.read());
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", Some("Util.kt"));

    let preview = MoveSession::new(&host).preview(&source, &target).unwrap();

    assert_eq!(render_project(&host.read()), before);
    let changes: Vec<(&str, FileChangeKind)> = preview
        .files
        .iter()
        .map(|file| (file.path.as_str(), file.change))
        .collect();
    assert_eq!(
        changes,
        vec![
            ("a/A.kt", FileChangeKind::Modified),
            ("b/Util.kt", FileChangeKind::Created),
            ("c/C.kt", FileChangeKind::Modified),
        ]
    );
    let created = &preview.files[1];
    assert_eq!(created.modified, "package b\n\nfun f() = 1\n");
    assert!(preview.files[2].unified_diff.contains("+import b.f"));
    assert_eq!(preview.total_files, 3);
}

#[test]
fn cancelled_session_does_nothing() {
    let host = load(FIXTURE);
    let before = host.snapshot();
    let source = source(&host, &["a.f"], SearchOptions::default());
    let target = to_package(&host, "b", None);

    let mut session = MoveSession::new(&host);
    session.cancellation_token().cancel();
    let err = session.run(&source, &target).unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(host.snapshot(), before);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl MoveListener for Recorder {
    fn before_move(&self, descriptor: &MoveDescriptor) {
        self.events
            .lock()
            .push(format!("before {}", descriptor.destination));
    }

    fn after_move(&self, descriptor: &MoveDescriptor, outcome: &MoveOutcome) {
        self.events.lock().push(format!(
            "after {} ({} moved)",
            descriptor.destination,
            outcome.moved.len()
        ));
    }
}

#[test]
fn listeners_observe_runs_but_not_previews() {
    let host = load(FIXTURE);
    let recorder = Arc::new(Recorder::default());
    let source = source(&host, &["a.f", "a.g"], SearchOptions::default());
    let target = to_package(&host, "b", Some("Util.kt"));

    let mut session = MoveSession::new(&host).with_listener(recorder.clone());
    session.preview(&source, &target).unwrap();
    assert!(recorder.events.lock().is_empty());

    let outcome = session.run(&source, &target).unwrap();
    assert_eq!(outcome.moved.len(), 2);
    assert_eq!(
        *recorder.events.lock(),
        vec![
            "before b/Util.kt".to_string(),
            "after b/Util.kt (2 moved)".to_string()
        ]
    );
}

#[test]
fn invalid_sources_are_rejected() {
    let host = load(FIXTURE);
    let tree = host.read();
    let options = SearchOptions::default();

    assert_eq!(
        MoveSource::declarations(&tree, Vec::<DeclId>::new(), options).unwrap_err(),
        TargetError::EmptySource
    );
    assert_eq!(
        MoveSource::declarations(&tree, [decl(&tree, "a.A.member")], options).unwrap_err(),
        TargetError::NotRelocatable {
            name: "member".to_string(),
            kind: "function",
        }
    );
    assert_eq!(
        MoveSource::declarations(&tree, [decl(&tree, "a.f"), decl(&tree, "a.A.Nested")], options)
            .unwrap_err(),
        TargetError::MixedContainers
    );
}

#[test]
fn invalid_targets_are_rejected() {
    let host = load(FIXTURE);
    let class_source = source(&host, &["a.A"], SearchOptions::default());
    let session = MoveSession::new(&host);
    let module = host.read().find_module("main").unwrap();

    let into_itself = MoveTarget::Container(decl(&host.read(), "a.A.Nested"));
    assert!(matches!(
        session.analyze(&class_source, &into_itself).unwrap_err(),
        MoveError::Target(TargetError::TargetInsideSource { .. })
    ));

    let bad_package = MoveTarget::Package {
        module,
        package: FqName::new(["b", "1x"]),
        file_name: None,
    };
    assert!(matches!(
        session.analyze(&class_source, &bad_package).unwrap_err(),
        MoveError::Target(TargetError::InvalidPackage { .. })
    ));

    let bad_file = MoveTarget::Package {
        module,
        package: FqName::new(["b"]),
        file_name: Some("A.java".to_string()),
    };
    assert_eq!(
        session.analyze(&class_source, &bad_file).unwrap_err().to_string(),
        "invalid file name `A.java`"
    );

    let existing = MoveTarget::Package {
        module,
        package: FqName::new(["c"]),
        file_name: Some("C.kt".to_string()),
    };
    assert!(matches!(
        existing.resolve(&host.read(), &class_source),
        Ok(relo_move::ResolvedTarget::ExistingFile(_))
    ));

    let taken = MoveTarget::Package {
        module,
        package: FqName::new(["x"]),
        file_name: Some("X.kt".to_string()),
    };
    assert_eq!(
        session.analyze(&class_source, &taken).unwrap_err().to_string(),
        "file `x/X.kt` already exists with package `y`"
    );

    let function = decl(&host.read(), "a.f");
    let not_a_container = MoveTarget::Container(function);
    assert!(matches!(
        session.analyze(&class_source, &not_a_container).unwrap_err(),
        MoveError::Target(TargetError::NotAContainer { .. })
    ));

    let same_file = MoveTarget::File(file(&host, "a/A.kt"));
    assert!(matches!(
        session.analyze(&class_source, &same_file).unwrap_err(),
        MoveError::Target(TargetError::SameLocation { .. })
    ));
}
