#[cfg(test)]
mod tests {
    use gridcache::db::cache::Cache;
    use gridcache::db::db::Db;
    use gridcache::libs::config::Config;
    use rusqlite::params;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    struct MigrationTestContext {
        _guard: parking_lot::MutexGuard<'static, ()>,
        _temp_dir: TempDir,
    }

    impl TestContext for MigrationTestContext {
        fn setup() -> Self {
            let guard = ENV_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            MigrationTestContext {
                _guard: guard,
                _temp_dir: temp_dir,
            }
        }
    }

    /// Stages a store the way an old release would have left it.
    fn stage_legacy_store() {
        let conn = Db::new_without_migrations().unwrap();

        // Registry under its old name, with integer timestamps
        conn.execute(
            "CREATE TABLE cached_table_schemas (
                table_id TEXT PRIMARY KEY,
                local_table_name TEXT NOT NULL,
                fields TEXT NOT NULL,
                field_mapping TEXT NOT NULL,
                created_at INTEGER,
                updated_at INTEGER
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cached_table_schemas VALUES ('t1', 'cache_records_tasks_t1', '[]', '{\"entries\":[]}', ?1, ?1)",
            params![1_700_000_000_i64],
        )
        .unwrap();

        // TTL config with an integer timestamp
        conn.execute(
            "CREATE TABLE cache_ttl_config (
                table_id TEXT PRIMARY KEY,
                ttl_seconds INTEGER NOT NULL,
                mutation_level TEXT,
                notes TEXT,
                updated_at INTEGER
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cache_ttl_config VALUES ('t1', 3600, 'high_mutation', NULL, ?1)",
            params![1_700_000_000_i64],
        )
        .unwrap();

        // cached_tables with the obsolete column set
        conn.execute(
            "CREATE TABLE cached_tables (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                solution_id TEXT,
                description TEXT,
                updated TEXT,
                updated_by TEXT,
                deleted_date TEXT,
                deleted_by TEXT,
                record_count INTEGER,
                cached_at TEXT,
                expires_at TEXT
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cached_tables (id, name, solution_id, description, cached_at, expires_at)
             VALUES ('t1', 'Tasks', 'sol_x', 'obsolete', '2024-01-01T00:00:00Z', '2024-01-01T12:00:00Z')",
            [],
        )
        .unwrap();

        // cached_members before deleted_date existed
        conn.execute(
            "CREATE TABLE cached_members (
                id TEXT PRIMARY KEY,
                email TEXT,
                full_name TEXT,
                role TEXT,
                cached_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )",
            [],
        )
        .unwrap();
    }

    fn table_columns(conn: &rusqlite::Connection, table: &str) -> Vec<(String, String)> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table)).unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
            .unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    fn schema_dump(conn: &rusqlite::Connection) -> Vec<(String, Option<String>)> {
        let mut stmt = conn
            .prepare("SELECT name, sql FROM sqlite_master WHERE name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?))).unwrap();
        rows.collect::<Result<Vec<_>, _>>().unwrap()
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_legacy_store_is_rewritten_on_open(_ctx: &mut MigrationTestContext) {
        stage_legacy_store();

        let cache = Cache::open(Config::default()).unwrap();
        let conn = cache.conn();

        // Registry renamed, data intact
        let legacy: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'cached_table_schemas'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(legacy, 0);
        let name: String = conn
            .query_row("SELECT local_table_name FROM cache_table_registry WHERE table_id = 't1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "cache_records_tasks_t1");

        // Integer timestamps became TEXT, values converted
        let columns = table_columns(conn, "cache_table_registry");
        let created_at = columns.iter().find(|(n, _)| n == "created_at").unwrap();
        assert_eq!(created_at.1.to_ascii_uppercase(), "TEXT");
        let created: String = conn
            .query_row("SELECT created_at FROM cache_table_registry WHERE table_id = 't1'", [], |row| row.get(0))
            .unwrap();
        assert!(created.starts_with("2023-11-14"));

        let updated: String = conn
            .query_row("SELECT updated_at FROM cache_ttl_config WHERE table_id = 't1'", [], |row| row.get(0))
            .unwrap();
        assert!(updated.starts_with("2023-11-14"));
        let ttl: i64 = conn
            .query_row("SELECT ttl_seconds FROM cache_ttl_config WHERE table_id = 't1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(ttl, 3600);

        // cached_tables rebuilt: obsolete columns gone, new ones present,
        // surviving data preserved
        let columns: Vec<String> = table_columns(conn, "cached_tables").into_iter().map(|(n, _)| n).collect();
        assert!(!columns.contains(&"description".to_string()));
        assert!(!columns.contains(&"record_count".to_string()));
        assert!(columns.contains(&"status".to_string()));
        assert!(columns.contains(&"fields_count_linkedrecordfield".to_string()));
        let name: String = conn
            .query_row("SELECT name FROM cached_tables WHERE id = 't1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(name, "Tasks");

        // cached_members gained deleted_date
        let columns: Vec<String> = table_columns(conn, "cached_members").into_iter().map(|(n, _)| n).collect();
        assert!(columns.contains(&"deleted_date".to_string()));

        cache.close().unwrap();
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_open_twice_is_a_no_op(_ctx: &mut MigrationTestContext) {
        stage_legacy_store();

        let cache = Cache::open(Config::default()).unwrap();
        let first = schema_dump(cache.conn());
        cache.close().unwrap();

        let cache = Cache::open(Config::default()).unwrap();
        let second = schema_dump(cache.conn());
        cache.close().unwrap();

        assert_eq!(first, second);
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_fresh_store_needs_no_migration(_ctx: &mut MigrationTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let first = schema_dump(cache.conn());
        cache.close().unwrap();

        let cache = Cache::open(Config::default()).unwrap();
        assert_eq!(first, schema_dump(cache.conn()));
        cache.close().unwrap();
    }

    #[test_context(MigrationTestContext)]
    #[test]
    fn test_interrupted_rename_drops_the_leftover(_ctx: &mut MigrationTestContext) {
        let conn = Db::new_without_migrations().unwrap();
        conn.execute("CREATE TABLE cached_table_schemas (table_id TEXT PRIMARY KEY)", []).unwrap();
        conn.execute(
            "CREATE TABLE cache_table_registry (
                table_id TEXT PRIMARY KEY,
                local_table_name TEXT NOT NULL,
                fields TEXT NOT NULL,
                field_mapping TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .unwrap();
        drop(conn);

        let cache = Cache::open(Config::default()).unwrap();
        let leftover: i64 = cache
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'cached_table_schemas'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(leftover, 0);
        cache.close().unwrap();
    }
}
