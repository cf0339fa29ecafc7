use annatto::formats::FormatKind;
use annatto::ingest::{ingest, IngestOptions};
use annatto::model::{ExampleData, LabelKind, Project, ProjectKind};
use annatto::store::{ProjectStore, Scope, SqliteStore};

mod common;

use common::{category_project, importer, span_project, store_with_project, write_upload};

#[test]
fn csv_with_one_malformed_row_imports_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_upload(
        &dir,
        "reviews.csv",
        "text,label\n\
         great film,positive\n\
         \"broken,row,with,extras\",positive,extra\n\
         terrible film,negative\n\
         fine I guess,neutral\n",
    );
    let (store, project) = store_with_project(category_project());

    // Batch size 2 forces a flush boundary in the middle of the file.
    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::Csv,
        &[csv],
        &IngestOptions::default(),
        2,
    )
    .unwrap();

    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].line, 3);
    assert_eq!(report.examples, 3);
    assert_eq!(report.annotations, 3);
    assert_eq!(store.examples(project).len(), 3);
    assert_eq!(store.all_categories().len(), 3);
    assert_eq!(store.label_type_count(project, LabelKind::Category), 3);
}

#[test]
fn jsonl_reports_each_malformed_line() {
    let dir = tempfile::tempdir().unwrap();
    let jsonl = write_upload(
        &dir,
        "data.jsonl",
        "{\"text\": \"one\", \"label\": [\"a\"]}\n\
         not json at all\n\
         {\"text\": \"two\"}\n\
         {\"text\": \"\"}\n",
    );
    let (store, project) = store_with_project(category_project());

    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::Jsonl,
        &[jsonl],
        &IngestOptions::default(),
        10,
    )
    .unwrap();

    // Line 2 is invalid JSON, line 4 has empty text.
    assert_eq!(report.errors.len(), 2);
    assert_eq!(report.examples, 2);
    assert_eq!(store.all_categories().len(), 1);
}

#[test]
fn repeated_ingestion_reuses_label_types() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_upload(&dir, "a.csv", "text,label\nhello,pos\nworld,pos\n");
    let (store, project) = store_with_project(category_project());
    let options = IngestOptions::default();

    for _ in 0..3 {
        ingest(
            &store,
            project,
            importer(),
            FormatKind::Csv,
            &[csv.clone()],
            &options,
            10,
        )
        .unwrap();
    }

    assert_eq!(store.examples(project).len(), 6);
    assert_eq!(store.label_type_count(project, LabelKind::Category), 1);
}

#[test]
fn conll_import_produces_spans_with_char_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let conll = write_upload(
        &dir,
        "ner.conll",
        "SOCCER\tO\n\
         JAPAN\tB-LOC\n\
         GET\tO\n\
         LUCKY\tO\n\
         WIN\tO\n\
         \n\
         Nadim\tB-PER\n\
         Ladki\tI-PER\n",
    );
    let (store, project) = store_with_project(span_project());

    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::Conll,
        &[conll],
        &IngestOptions::default(),
        10,
    )
    .unwrap();
    assert!(report.is_clean());

    let examples = store.examples(project);
    assert_eq!(examples.len(), 2);
    assert_eq!(
        examples[0].data,
        ExampleData::Text("SOCCER JAPAN GET LUCKY WIN".to_string())
    );

    let spans = store.all_spans();
    assert_eq!(spans.len(), 2);
    // "JAPAN" sits at chars 7..12 of the first sentence.
    assert_eq!((spans[0].start_offset, spans[0].end_offset), (7, 12));
    // "Nadim Ladki" spans the whole second sentence.
    assert_eq!((spans[1].start_offset, spans[1].end_offset), (0, 11));
}

#[test]
fn fasttext_labels_become_categories() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_upload(
        &dir,
        "train.txt",
        "__label__pos __label__long great and long\n\
         __label__neg terrible\n",
    );
    let (store, project) = store_with_project(category_project());

    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::FastText,
        &[file],
        &IngestOptions::default(),
        10,
    )
    .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.examples, 2);
    assert_eq!(store.all_categories().len(), 3);
    assert_eq!(store.label_type_count(project, LabelKind::Category), 3);
}

#[test]
fn multiple_files_share_one_batch_stream() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_upload(&dir, "a.txt", "first\nsecond\n");
    let b = write_upload(&dir, "b.txt", "third\n");
    let (store, project) = store_with_project(category_project());

    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::TextLine,
        &[a, b],
        &IngestOptions::default(),
        2,
    )
    .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.examples, 3);
}

#[test]
fn sqlite_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let csv = write_upload(
        &dir,
        "reviews.csv",
        "text,label\ngood,pos\nbad,neg\ngood again,pos\n",
    );
    let db = dir.path().join("annatto.db");

    let store = SqliteStore::open(&db).unwrap();
    let project = store
        .create_project(&Project::new(0, "reviews", ProjectKind::CategoryClassification))
        .unwrap();

    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::Csv,
        &[csv],
        &IngestOptions::default(),
        2,
    )
    .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.examples, 3);

    // A fresh handle on the same file sees the committed data.
    let reopened = SqliteStore::open(&db).unwrap();
    assert_eq!(
        reopened
            .label_types(project, LabelKind::Category)
            .unwrap()
            .len(),
        2
    );
    let examples = store.label_types(project, LabelKind::Category).unwrap();
    assert!(examples.iter().any(|l| l.text == "pos"));
}

#[test]
fn concurrent_jobs_share_one_sqlite_store() {
    use annatto::jobs::{JobRequest, JobRunner, JobStatus};
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let mut rows_a = String::from("text,label\n");
    let mut rows_b = String::from("text,label\n");
    for i in 0..40 {
        rows_a.push_str(&format!("first upload row {},shared\n", i));
        rows_b.push_str(&format!("second upload row {},shared\n", i));
    }
    let a = write_upload(&dir, "a.csv", &rows_a);
    let b = write_upload(&dir, "b.csv", &rows_b);
    let db = dir.path().join("annatto.db");

    let store = Arc::new(SqliteStore::open(&db).unwrap());
    let project = store
        .create_project(&Project::new(0, "reviews", ProjectKind::CategoryClassification))
        .unwrap();

    // Batch size 1 maximizes flush interleaving between the two workers.
    let runner = JobRunner::new(store.clone());
    let mut request_a = JobRequest::new(project, importer(), FormatKind::Csv, vec![a]);
    request_a.batch_size = 1;
    let mut request_b = JobRequest::new(project, annatto::ids::UserId::new(2), FormatKind::Csv, vec![b]);
    request_b.batch_size = 1;
    let ja = runner.submit(request_a);
    let jb = runner.submit(request_b);

    for id in [ja, jb] {
        match runner.wait(id) {
            Some(JobStatus::Done(report)) => {
                assert!(report.is_clean());
                assert_eq!(report.examples, 40);
            }
            other => panic!("unexpected status {:?}", other),
        }
    }
    assert_eq!(
        store
            .label_types(project, LabelKind::Category)
            .unwrap()
            .len(),
        1
    );
}

#[test]
fn latin1_file_is_sniffed_and_transcoded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.csv");
    // "text,label\ncafé au lait,français\n" in ISO-8859-1.
    let bytes = b"text,label\ncaf\xe9 au lait,fran\xe7ais\n";
    std::fs::write(&path, bytes).unwrap();

    let (store, project) = store_with_project(category_project());
    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::Csv,
        &[path],
        &IngestOptions::default(),
        10,
    )
    .unwrap();
    assert!(report.is_clean());
    assert_eq!(
        store.examples(project)[0].data,
        ExampleData::Text("café au lait".to_string())
    );
}

#[test]
fn filemanifest_directory_import() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
    std::fs::write(dir.path().join("b.png"), [0x89u8, b'P', b'N', b'G']).unwrap();

    let (store, project) = store_with_project(Project::new(
        0,
        "photos",
        ProjectKind::ImageClassification,
    ));
    let report = ingest(
        &store,
        project,
        importer(),
        FormatKind::FileManifest,
        &[dir.path().to_path_buf()],
        &IngestOptions::default(),
        10,
    )
    .unwrap();
    assert!(report.is_clean());
    assert_eq!(report.examples, 2);
    for example in store.examples(project) {
        assert!(matches!(example.data, ExampleData::File(_)));
    }
}

#[test]
fn collaborative_flag_travels_through_store() {
    let (store, project) = store_with_project(category_project().collaborative(true));
    let loaded = store.project(project).unwrap();
    assert!(loaded.collaborative_annotation);

    // Scope queries on an empty example behave for both scopes.
    let example = store
        .insert_examples(
            project,
            &[annatto::model::NewExample {
                data: ExampleData::Text("x".into()),
                meta: Default::default(),
            }],
        )
        .unwrap()[0];
    assert!(store
        .categories_in_scope(example, Scope::Project)
        .unwrap()
        .is_empty());
}
