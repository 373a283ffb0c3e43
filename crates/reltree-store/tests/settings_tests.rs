#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::Write;

use reltree_core::{Config, DataProvider, Model, RtErrorKind};
use reltree_store::{IdGenerator, Settings, SqliteProvider};

#[test]
fn test_load_from_file_and_open_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("admin.db");
    let settings_path = dir.path().join("reltree.toml");

    let mut file = std::fs::File::create(&settings_path).unwrap();
    writeln!(
        file,
        "[database]\npath = {:?}\n\n[sorting]\ngap = 1024\n\n\
         [entities.menus]\nid_generator = \"uuid\"\n",
        db_path.to_string_lossy()
    )
    .unwrap();

    let settings = Settings::load(&settings_path).unwrap();
    assert_eq!(settings.resolver().gap(), 1024);
    assert_eq!(settings.entity("menus").id_generator, IdGenerator::Uuid);

    let conn = settings.open_database().unwrap();
    conn.execute_batch("CREATE TABLE menus (id TEXT PRIMARY KEY, label TEXT)")
        .unwrap();
    let mut provider = SqliteProvider::with_settings(&conn, settings.clone());
    let mut menu = Model::new("menus").with("label", "Main");
    provider.save(&mut menu).unwrap();
    assert_eq!(provider.count("menus", &Config::new()).unwrap(), 1);
    assert!(db_path.exists());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load(dir.path().join("absent.toml")).unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::Io);
}

#[test]
fn test_malformed_toml_is_invalid_argument() {
    let err = Settings::from_toml_str("[sorting\ngap = 1").unwrap_err();
    assert_eq!(err.kind(), RtErrorKind::InvalidArgument);
}
