//! Utilities shared by relo tests.
//!
//! Fixtures use a multi-file text format: every file starts with a header line
//!
//! ```text
//! //- /a/A.kt module=app platform=jvm deps=lib
//! ```
//!
//! where everything after the path is optional. Modules default to `main` on `jvm`.

mod fixtures;

pub use fixtures::{
    assert_fixture_transformed, decl, load_fixture_dir, render_project, FixtureFile, Project,
};
