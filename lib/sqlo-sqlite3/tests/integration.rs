///
/// # Integration Tests for sqlo-sqlite3
///
/// End-to-end tests against the bundled engine covering the statement
/// lifecycle, parameter binding, buffer bookkeeping, connection teardown,
/// on-disk and read-only databases, and the compile option surface.
///

use std::fs;

use serde_json::json;
use tempfile::TempDir;

use sqlo_sqlite3::{
    compile_option_used, compile_options, ColumnType, Database, Error, OpenConfig, Resource,
    Value,
};

const SQLITE_INTERRUPT: i32 = 9;
const SQLITE_READONLY: i32 = 8;
const SQLITE_MISUSE: i32 = 21;

fn memory_db() -> Database {
    Database::open_in_memory().expect("Failed to open in-memory database")
}

#[test]
fn test_select_expression_workflow() {
    let db = memory_db();
    let stmt = db.prepare("SELECT 1+1").unwrap();
    assert_eq!(stmt.column_count(), 1);
    assert_eq!(stmt.parameter_count(), 0);

    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Integer(2));
    assert!(!stmt.step().unwrap());

    stmt.finalize();
    assert!(stmt.is_finalized());
    db.close().unwrap();
}

#[test]
fn test_bind_then_reset_with_clear() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?").unwrap();

    stmt.bind("hello").unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Text("hello".to_string()));

    stmt.reset(true).unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 0);
    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Null);
}

#[test]
fn test_reset_keeps_bindings() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?").unwrap();
    stmt.bind(&42).unwrap();
    assert!(stmt.step().unwrap());
    stmt.reset(false).unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Integer(42));
}

#[test]
fn test_text_round_trip() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?").unwrap();
    for text in ["plain ascii", "héllo wörld", "日本語テキスト", "emoji 🦀", ""] {
        stmt.reset(true).unwrap();
        stmt.bind(text).unwrap();
        assert!(stmt.step().unwrap());
        assert_eq!(stmt.get(0).unwrap(), Value::Text(text.to_string()), "{text:?}");
        assert_eq!(stmt.column_type(0).unwrap(), ColumnType::Text);
    }
}

#[test]
fn test_number_routing() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?, ?, ?, ?").unwrap();
    stmt.bind_values(&[&7, &(1i64 << 40), &2.0f64, &3.5f64, &true])
        .unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(
        stmt.row().unwrap(),
        vec![
            Value::Integer(7),
            Value::Integer(1 << 40),
            Value::Integer(2),
            Value::Real(3.5),
            Value::Integer(1),
        ]
    );
}

#[test]
fn test_blob_and_null_binding() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?, ?").unwrap();
    let empty: &[u8] = &[];
    stmt.bind_values(&[&vec![0u8, 1, 2, 255], &Option::<i32>::None, &empty])
        .unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 2);
    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Blob(vec![0, 1, 2, 255]));
    assert_eq!(stmt.get(1).unwrap(), Value::Null);
    assert_eq!(stmt.column_type(2).unwrap(), ColumnType::Blob);
}

#[test]
fn test_named_parameters() {
    let db = memory_db();
    let stmt = db.prepare("SELECT :a, @b, $c").unwrap();
    stmt.bind_named(&[(":a", &1), ("@b", &"two"), ("$c", &3.25)])
        .unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(
        stmt.row().unwrap(),
        vec![
            Value::Integer(1),
            Value::Text("two".to_string()),
            Value::Real(3.25)
        ]
    );

    let err = stmt.bind_at("a", &1).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { .. }));
}

#[test]
fn test_json_binding() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?").unwrap();
    stmt.bind_json(&json!(["x", null])).unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(
        stmt.row().unwrap(),
        vec![Value::Text("x".to_string()), Value::Null]
    );

    let named = db.prepare("SELECT :first, :second").unwrap();
    named
        .bind_json(&json!({ ":second": 2, ":first": false }))
        .unwrap();
    assert!(named.step().unwrap());
    assert_eq!(named.row().unwrap(), vec![Value::Integer(0), Value::Integer(2)]);

    let err = stmt.bind_json_at(1, &json!([1, 2])).unwrap_err();
    assert!(matches!(err, Error::InvalidArguments(_)));
    let err = stmt.bind_json_at(1, &json!({ ":a": 1 })).unwrap_err();
    assert!(matches!(err, Error::InvalidArguments(_)));
}

#[test]
fn test_bind_as_blob() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, typeof(?)").unwrap();
    stmt.bind_as_blob("abc").unwrap();
    stmt.bind_as_blob_at(2, "abc").unwrap();
    assert!(stmt.step().unwrap());
    assert_eq!(stmt.get(0).unwrap(), Value::Blob(b"abc".to_vec()));
    assert_eq!(stmt.get(1).unwrap(), Value::Text("blob".to_string()));

    stmt.reset(true).unwrap();
    let err = stmt.bind_as_blob(&5).unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedValueType {
            context: "bind_as_blob()",
            ..
        }
    ));
}

#[test]
fn test_no_bindable_parameters() {
    let db = memory_db();
    let stmt = db.prepare("SELECT 1").unwrap();
    assert!(matches!(
        stmt.bind(&1).unwrap_err(),
        Error::NoBindableParameters
    ));
    assert!(matches!(
        stmt.bind_as_blob("a").unwrap_err(),
        Error::NoBindableParameters
    ));
}

#[test]
fn test_unsupported_values() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?").unwrap();
    assert!(matches!(
        stmt.bind(&1i128).unwrap_err(),
        Error::UnsupportedValueType { .. }
    ));
    assert!(matches!(
        stmt.bind_at(1, &json!({ "a": 1 })).unwrap_err(),
        Error::UnsupportedValueType { .. }
    ));
    assert!(matches!(
        stmt.bind(&u64::MAX).unwrap_err(),
        Error::UnsupportedValueType { .. }
    ));
    assert_eq!(stmt.pending_allocations().unwrap(), 0);
}

#[test]
fn test_invalid_positions() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?").unwrap();
    for index in [0i64, -1, 3] {
        let err = stmt.bind_at(index, &1).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }), "{index}");
    }
    stmt.bind_at(2, &1).unwrap();
}

#[test]
fn test_empty_sql() {
    let db = memory_db();
    for sql in ["", "   ", "\n\t", "-- just a comment"] {
        assert!(
            matches!(db.prepare(sql).unwrap_err(), Error::EmptyStatement),
            "{sql:?}"
        );
    }
    assert_eq!(db.open_statement_count(), 0);
}

#[test]
fn test_syntax_error_carries_engine_message() {
    let db = memory_db();
    let err = db.prepare("SELEC 1").unwrap_err();
    match err {
        Error::NativeFailure { message, .. } => assert!(message.contains("syntax error")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_rebinding_keeps_one_allocation() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?").unwrap();
    stmt.bind_at(1, "first").unwrap();
    stmt.bind_at(1, "second").unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 1);

    stmt.bind_at(2, b"bytes".as_slice()).unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 2);

    // A non-buffer value releases the buffer previously at that position.
    stmt.bind_at(1, &10).unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 1);

    assert!(stmt.step().unwrap());
    assert_eq!(
        stmt.row().unwrap(),
        vec![Value::Integer(10), Value::Blob(b"bytes".to_vec())]
    );
}

#[test]
fn test_failed_bind_leaves_tracker_unchanged() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?").unwrap();
    stmt.bind("kept").unwrap();
    assert!(stmt.step().unwrap());

    // Binding while the statement is mid-step is rejected by the engine.
    let err = stmt.bind("rejected").unwrap_err();
    assert_eq!(err.native_code(), Some(SQLITE_MISUSE));
    assert_eq!(stmt.pending_allocations().unwrap(), 1);
    assert_eq!(stmt.get(0).unwrap(), Value::Text("kept".to_string()));
}

#[test]
fn test_clear_bindings_and_finalize_release_buffers() {
    let db = memory_db();
    let stmt = db.prepare("SELECT ?, ?").unwrap();
    stmt.bind_values(&[&"a", &"b"]).unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 2);
    stmt.clear_bindings().unwrap();
    assert_eq!(stmt.pending_allocations().unwrap(), 0);

    stmt.bind_values(&[&"c", &"d"]).unwrap();
    stmt.finalize();
    assert!(stmt.pending_allocations().unwrap_err().is_closed());
}

#[test]
fn test_finalize_is_idempotent() {
    let db = memory_db();
    let stmt = db.prepare("SELECT 1").unwrap();
    stmt.finalize();
    stmt.finalize();
    assert!(stmt.is_finalized());
    assert_eq!(db.open_statement_count(), 0);

    let err = stmt.step().unwrap_err();
    assert!(matches!(
        err,
        Error::ResourceClosed {
            resource: Resource::Statement
        }
    ));
    assert_eq!(err.to_string(), "Statement has been closed");
}

#[test]
fn test_close_finalizes_open_statements() {
    let db = memory_db();
    let a = db.prepare("SELECT ?").unwrap();
    let b = db.prepare("SELECT 2").unwrap();
    a.bind("buffered").unwrap();
    assert_eq!(db.open_statement_count(), 2);

    db.close().unwrap();
    assert!(!db.is_open());
    assert!(a.is_finalized());
    assert!(b.is_finalized());
    assert!(a.step().unwrap_err().is_closed());
    assert!(b.bind(&1).unwrap_err().is_closed());
    a.finalize();

    let err = db.prepare("SELECT 1").unwrap_err();
    assert_eq!(err.to_string(), "Database has been closed");
}

#[test]
fn test_statement_outliving_database() {
    let stmt = {
        let db = memory_db();
        db.prepare("SELECT 1").unwrap()
    };
    assert!(stmt.is_finalized());
    assert!(stmt.step().unwrap_err().is_closed());
}

#[test]
fn test_dropping_statement_finalizes_it() {
    let db = memory_db();
    {
        let stmt = db.prepare("SELECT ?").unwrap();
        stmt.bind("dropped").unwrap();
        assert_eq!(db.open_statement_count(), 1);
    }
    assert_eq!(db.open_statement_count(), 0);
}

#[test]
fn test_exec_and_changes() {
    let db = memory_db();
    db.exec("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t (name) VALUES ('a'), ('b');")
        .unwrap();
    assert_eq!(db.changes().unwrap(), 2);

    let insert = db.prepare("INSERT INTO t (name) VALUES (?)").unwrap();
    insert.bind("c").unwrap();
    assert!(!insert.step().unwrap());
    assert_eq!(db.changes().unwrap(), 1);

    let select = db.prepare("SELECT id, name FROM t ORDER BY id").unwrap();
    assert_eq!(select.column_names().unwrap(), vec!["id", "name"]);
    let mut names = Vec::new();
    while select.step().unwrap() {
        assert_eq!(select.data_count().unwrap(), 2);
        names.push(select.get(1).unwrap());
    }
    assert_eq!(select.data_count().unwrap(), 0);
    assert_eq!(names.len(), 3);
}

#[test]
fn test_column_index_out_of_range() {
    let db = memory_db();
    let stmt = db.prepare("SELECT 1").unwrap();
    assert!(stmt.step().unwrap());
    assert!(matches!(stmt.get(1).unwrap_err(), Error::InvalidArguments(_)));
}

#[test]
fn test_interrupt_surfaces_as_native_failure() {
    let db = memory_db();
    let stmt = db
        .prepare("WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT x FROM c")
        .unwrap();
    assert!(stmt.step().unwrap());
    db.interrupt().unwrap();
    let err = stmt.step().unwrap_err();
    assert_eq!(err.native_code(), Some(SQLITE_INTERRUPT));
}

#[test]
fn test_file_name() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("app.db");

    let db = Database::open(&path).unwrap();
    let name = db.file_name(None).unwrap().expect("file database has a path");
    assert!(name.ends_with("app.db"), "{name}");
    assert_eq!(db.file_name(Some("main")).unwrap(), Some(name));
    assert_eq!(db.file_name(Some("nope")).unwrap(), None);
    db.close().unwrap();
    assert!(path.exists());

    let memory = memory_db();
    assert_eq!(memory.file_name(None).unwrap(), None);
    assert_eq!(memory.name(), ":memory:");

    let unnamed = Database::open("").unwrap();
    assert_eq!(unnamed.name(), ":memory:");
}

#[test]
fn test_read_only_config_rejects_writes() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("ro.db");
    {
        let db = Database::open(&path).unwrap();
        db.exec("CREATE TABLE t (x INTEGER)").unwrap();
    }

    let config_path = temp_dir.path().join("sqlo.toml");
    fs::write(
        &config_path,
        format!("name = {:?}\nread_only = true\n", path.display().to_string()),
    )
    .unwrap();
    let config = OpenConfig::from_path(&config_path).unwrap();
    let db = Database::from_config(&config).unwrap();

    let select = db.prepare("SELECT count(*) FROM t").unwrap();
    assert!(select.step().unwrap());
    assert_eq!(select.get(0).unwrap(), Value::Integer(0));

    let err = db.exec("INSERT INTO t VALUES (1)").unwrap_err();
    assert_eq!(err.native_code(), Some(SQLITE_READONLY));
}

#[test]
fn test_open_missing_without_create() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("missing.db");
    let err = Database::open_with(&path, &OpenConfig::default().create(false)).unwrap_err();
    assert!(err.native_code().is_some());
    assert!(!path.exists());
}

#[test]
fn test_compile_options_consistent() {
    let options = compile_options();
    assert!(!options.is_empty());
    for name in options.keys() {
        assert!(compile_option_used(name), "{name}");
    }
}
