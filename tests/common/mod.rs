#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use annatto::ids::UserId;
use annatto::model::{Project, ProjectKind};
use annatto::store::{MemoryStore, ProjectStore};

/// Writes `contents` to `name` inside `dir` and returns the path.
pub fn write_upload(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).expect("create upload file");
    file.write_all(contents.as_bytes()).expect("write upload file");
    path
}

/// A memory store seeded with one project of the given kind.
pub fn store_with_project(project: Project) -> (MemoryStore, annatto::ids::ProjectId) {
    let store = MemoryStore::new();
    let id = store.create_project(&project).expect("create project");
    (store, id)
}

pub fn category_project() -> Project {
    Project::new(0, "reviews", ProjectKind::CategoryClassification)
}

pub fn span_project() -> Project {
    Project::new(0, "entities", ProjectKind::SpanLabeling)
}

pub fn importer() -> UserId {
    UserId::new(1)
}
