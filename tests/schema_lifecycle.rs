#[cfg(test)]
mod tests {
    use gridcache::db::cache::Cache;
    use gridcache::libs::config::Config;
    use gridcache::libs::fields::RemoteField;
    use serde_json::json;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    struct CacheTestContext {
        _guard: parking_lot::MutexGuard<'static, ()>,
        _temp_dir: TempDir,
    }

    impl TestContext for CacheTestContext {
        fn setup() -> Self {
            let guard = ENV_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            CacheTestContext {
                _guard: guard,
                _temp_dir: temp_dir,
            }
        }
    }

    fn catalog() -> Vec<RemoteField> {
        vec![
            RemoteField::new("title", "Title", "textfield"),
            RemoteField::new("status", "Status", "statusfield"),
        ]
    }

    fn column_names(cache: &Cache, table: &str) -> Vec<String> {
        let mut stmt = cache.conn().prepare(&format!("PRAGMA table_info(\"{}\")", table)).unwrap();
        let names = stmt.query_map([], |row| row.get::<_, String>(1)).unwrap();
        names.collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn indexed_columns(cache: &Cache, table: &str) -> Vec<String> {
        let mut stmt = cache
            .conn()
            .prepare("SELECT sql FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND sql IS NOT NULL")
            .unwrap();
        let sqls: Vec<String> = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        sqls
    }

    #[test_context(CacheTestContext)]
    #[test]
    fn test_dynamic_table_creation(_ctx: &mut CacheTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let records = vec![json!({"id": "r1", "title": "First", "status": {"value": "open"}})];
        let count = cache.bulk_replace("tbl1", &catalog(), &records, None).unwrap();
        assert_eq!(count, 1);

        let columns = column_names(&cache, "cache_records_tbl1_tbl1");
        assert_eq!(columns, vec!["id", "title", "status", "status_updated_on", "cached_at", "expires_at"]);

        // Index policy: expires_at always, statusfield always, title slug always
        let index_sqls = indexed_columns(&cache, "cache_records_tbl1_tbl1").join("\n");
        assert!(index_sqls.contains("(\"expires_at\")"));
        assert!(index_sqls.contains("(\"status\")"));
        assert!(index_sqls.contains("(\"title\")"));

        cache.close().unwrap();
    }

    #[test_context(CacheTestContext)]
    #[test]
    fn test_schema_evolution_adds_columns(_ctx: &mut CacheTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let records = vec![
            json!({"id": "r1", "title": "First", "status": {"value": "open"}}),
            json!({"id": "r2", "title": "Second", "status": {"value": "done"}}),
        ];
        cache.bulk_replace("tbl1", &catalog(), &records, None).unwrap();

        // The remote table grew a numeric field
        let mut extended = catalog();
        extended.push(RemoteField::new("priority", "Priority", "numberfield"));
        let records = vec![
            json!({"id": "r1", "title": "First", "status": {"value": "open"}, "priority": 2.0}),
            json!({"id": "r2", "title": "Second", "status": {"value": "done"}, "priority": 1.0}),
        ];
        let count = cache.bulk_replace("tbl1", &extended, &records, None).unwrap();
        assert_eq!(count, 2);

        let columns = column_names(&cache, "cache_records_tbl1_tbl1");
        assert!(columns.contains(&"priority".to_string()));

        // Old field values survive the evolution
        let rows = cache.query("tbl1").unwrap().order("id", "asc").execute().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], json!("First"));
        assert_eq!(rows[0]["priority"], json!(2.0));

        cache.close().unwrap();
    }

    #[test_context(CacheTestContext)]
    #[test]
    fn test_removed_fields_keep_their_columns(_ctx: &mut CacheTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        cache
            .bulk_replace("tbl1", &catalog(), &[json!({"id": "r1", "title": "First"})], None)
            .unwrap();

        // A shrunken catalog must not drop the status columns
        let shrunk = vec![RemoteField::new("title", "Title", "textfield")];
        cache.bulk_replace("tbl1", &shrunk, &[json!({"id": "r1", "title": "First"})], None).unwrap();

        let columns = column_names(&cache, "cache_records_tbl1_tbl1");
        assert!(columns.contains(&"status".to_string()));
        assert!(columns.contains(&"status_updated_on".to_string()));

        cache.close().unwrap();
    }

    #[test_context(CacheTestContext)]
    #[test]
    fn test_bulk_replace_sets_uniform_expiry(_ctx: &mut CacheTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let records: Vec<_> = (0..20).map(|i| json!({"id": format!("r{}", i), "title": format!("Record {}", i)})).collect();
        cache.bulk_replace("tbl1", &catalog(), &records, None).unwrap();

        let distinct: i64 = cache
            .conn()
            .query_row("SELECT COUNT(DISTINCT expires_at) FROM cache_records_tbl1_tbl1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(distinct, 1);

        cache.close().unwrap();
    }
}
