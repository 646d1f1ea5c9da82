use gridcore::io::config_io::{self, ConfigIoError};
use gridcore::pipeline::paging::PagingState;
use gridcore::state::columns::{ColumnDef, ConfigError, DataType, GridConfig};

fn fixture_path(name: &str) -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn test_load_config_fixture() {
    let config = config_io::load_config(&fixture_path("grid_config.json")).unwrap();
    assert_eq!(config.id, "employees");
    assert_eq!(config.primary_key.as_deref(), Some("id"));
    assert!(config.row_editable);
    assert!(config.groups_expanded);
    assert_eq!(config.paging, Some(PagingState::new(0, 2)));
    assert_eq!(
        config.fields(),
        vec!["id", "name", "dept", "salary", "active", "hired"]
    );

    let id = config.column("id").unwrap();
    assert_eq!(id.data_type, DataType::Number);
    assert!(!id.editable);

    let name = config.column("name").unwrap();
    assert_eq!(name.data_type, DataType::String);
    assert!(name.editable && name.sortable && name.filterable && name.groupable);
    assert!(!name.has_editor_template);

    assert!(!config.column("hired").unwrap().sortable);
    assert_eq!(config.column_index("salary"), Some(3));
    assert_eq!(config.column_at(4).map(|c| c.field.as_str()), Some("active"));
}

#[test]
fn test_load_config_rejects_unknown_primary_key() {
    let err = config_io::load_config(&fixture_path("invalid_config.json")).unwrap_err();
    match err {
        ConfigIoError::Invalid(ConfigError::UnknownPrimaryKey(key)) => assert_eq!(key, "missing"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_config_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = config_io::load_config(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ConfigIoError::Io(_)));
}

#[test]
fn test_load_config_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "id": "x", "columns": 5 }"#).unwrap();
    let err = config_io::load_config(&path).unwrap_err();
    assert!(matches!(err, ConfigIoError::Parse(_)));
}

#[test]
fn test_minimal_config_defaults() {
    let config: GridConfig = serde_json::from_str(r#"{ "id": "grid1" }"#).unwrap();
    assert!(config.columns.is_empty());
    assert_eq!(config.primary_key, None);
    assert!(!config.row_editable);
    assert_eq!(config.paging, None);
    assert!(config.groups_expanded);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_empty_id() {
    let config = GridConfig::new("  ", vec![]);
    assert!(matches!(config.validate(), Err(ConfigError::EmptyId)));
}

#[test]
fn test_validate_rejects_duplicate_columns() {
    let config = GridConfig::new(
        "grid1",
        vec![
            ColumnDef::new("name", DataType::String),
            ColumnDef::new("name", DataType::Number),
        ],
    );
    match config.validate() {
        Err(ConfigError::DuplicateColumn(field)) => assert_eq!(field, "name"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_validate_rejects_zero_page_size() {
    let config = GridConfig::new("grid1", vec![]).with_paging(0);
    assert!(matches!(config.validate(), Err(ConfigError::ZeroPageSize)));
}

#[test]
fn test_config_error_messages() {
    assert_eq!(
        ConfigError::UnknownPrimaryKey("sku".to_string()).to_string(),
        "primary key 'sku' is not a declared column"
    );
    let err: ConfigIoError = ConfigError::ZeroPageSize.into();
    assert_eq!(err.to_string(), "invalid config: records per page must be greater than zero");
}

#[test]
fn test_column_builders() {
    let column = ColumnDef::new("price", DataType::Number)
        .with_editor_template()
        .read_only();
    assert!(column.has_editor_template);
    assert!(!column.editable);
    assert!(column.sortable);
}
