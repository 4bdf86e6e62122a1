#[cfg(test)]
mod tests {
    use gridcache::db::cache::Cache;
    use gridcache::libs::config::Config;
    use gridcache::libs::fields::RemoteField;
    use serde_json::json;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    struct QueryTestContext {
        _guard: parking_lot::MutexGuard<'static, ()>,
        _temp_dir: TempDir,
    }

    impl TestContext for QueryTestContext {
        fn setup() -> Self {
            let guard = ENV_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            QueryTestContext {
                _guard: guard,
                _temp_dir: temp_dir,
            }
        }
    }

    fn catalog() -> Vec<RemoteField> {
        vec![
            RemoteField::new("title", "Title", "textfield"),
            RemoteField::new("status", "Status", "singleselectfield"),
            RemoteField::new("amount", "Amount", "numberfield"),
            RemoteField::new("tags", "Tags", "multipleselectfield"),
            RemoteField::new("due_date", "Due Date", "duedatefield"),
        ]
    }

    fn seeded_cache() -> Cache {
        let cache = Cache::open(Config::default()).unwrap();
        let records = vec![
            json!({
                "id": "r1", "title": "Invoice march", "status": "active", "amount": 100.0,
                "tags": [],
                "due_date": {"from_date": {"date": "2025-01-01"}, "to_date": {"date": "2025-01-31"}},
            }),
            json!({
                "id": "r2", "title": "Quarterly report", "status": "active", "amount": 250.0,
                "tags": null,
                "due_date": {"from_date": {"date": "2025-03-01"}, "to_date": {"date": "2025-03-20"}},
            }),
            json!({
                "id": "r3", "title": "Renewal", "status": "closed", "amount": 0.0,
                "tags": ["x"],
                "due_date": null,
            }),
        ];
        cache.bulk_replace("tbl1", &catalog(), &records, None).unwrap();
        cache
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_range_fields_default_to_range_end(_ctx: &mut QueryTestContext) {
        let cache = seeded_cache();

        // Unqualified filters compare against the _to column
        let rows = cache.query("tbl1").unwrap().where_(&json!({"due_date": {"gte": "2025-03-15"}})).execute().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("r2"));

        // No record's range ends after the 25th
        let rows = cache.query("tbl1").unwrap().where_(&json!({"due_date": {"gte": "2025-03-25"}})).execute().unwrap();
        assert_eq!(rows.len(), 0);

        // The sub-field syntax picks the _from column explicitly
        let rows = cache
            .query("tbl1")
            .unwrap()
            .where_(&json!({"due_date.from_date": {"gte": "2025-01-01"}}))
            .execute()
            .unwrap();
        assert_eq!(rows.len(), 2);

        cache.close().unwrap();
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_empty_array_semantics(_ctx: &mut QueryTestContext) {
        let cache = seeded_cache();

        // [] and null both count as empty
        let rows = cache.query("tbl1").unwrap().where_(&json!({"tags": {"is_empty": true}})).execute().unwrap();
        assert_eq!(rows.len(), 2);

        let rows = cache.query("tbl1").unwrap().where_(&json!({"tags": {"is_not_empty": true}})).execute().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("r3"));

        cache.close().unwrap();
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_multi_select_set_operators(_ctx: &mut QueryTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let records = vec![
            json!({"id": "r1", "title": "a", "tags": ["red", "blue"]}),
            json!({"id": "r2", "title": "b", "tags": ["blue"]}),
            json!({"id": "r3", "title": "c", "tags": []}),
        ];
        cache.bulk_replace("tbl1", &catalog(), &records, None).unwrap();

        let query = |spec: serde_json::Value| {
            cache
                .query("tbl1")
                .unwrap()
                .where_(&json!({ "tags": spec }))
                .execute()
                .unwrap()
                .iter()
                .map(|r| r["id"].as_str().unwrap().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(query(json!({"has_any_of": ["red", "green"]})), vec!["r1"]);
        assert_eq!(query(json!({"has_all_of": ["red", "blue"]})), vec!["r1"]);
        assert_eq!(query(json!({"is_exactly": ["blue"]})), vec!["r2"]);
        assert_eq!(query(json!({"has_none_of": ["red"]})), vec!["r2", "r3"]);
        assert_eq!(query(json!({"is_exactly": []})), vec!["r3"]);

        cache.close().unwrap();
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_values_bind_as_parameters(_ctx: &mut QueryTestContext) {
        let cache = seeded_cache();

        // A hostile value must be data, never SQL
        let hostile = "\"; DROP TABLE cache_records_tbl1_tbl1; --";
        let rows = cache
            .query("tbl1")
            .unwrap()
            .where_(&json!({"title": {"contains": hostile}}))
            .execute()
            .unwrap();
        assert_eq!(rows.len(), 0);

        let rows = cache.query("tbl1").unwrap().where_(&json!({ "title": hostile })).execute().unwrap();
        assert_eq!(rows.len(), 0);

        // The table survived
        assert_eq!(cache.query("tbl1").unwrap().count().unwrap(), 3);

        cache.close().unwrap();
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_unknown_fields_are_skipped(_ctx: &mut QueryTestContext) {
        let cache = seeded_cache();

        // A stale saved filter referencing a dropped field degrades to a no-op
        let rows = cache
            .query("tbl1")
            .unwrap()
            .where_(&json!({"long_gone": {"eq": 1}, "status": "active"}))
            .execute()
            .unwrap();
        assert_eq!(rows.len(), 2);

        cache.close().unwrap();
    }

    #[test_context(QueryTestContext)]
    #[test]
    fn test_order_limit_offset_and_count(_ctx: &mut QueryTestContext) {
        let cache = seeded_cache();

        let rows = cache.query("tbl1").unwrap().order("amount", "desc").limit(2).execute().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("r2"));

        let rows = cache.query("tbl1").unwrap().order("amount", "desc").limit(2).offset(2).execute().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!("r3"));

        let count = cache.query("tbl1").unwrap().where_(&json!({"status": "active"})).count().unwrap();
        assert_eq!(count, 2);

        // id is addressable like any field
        let rows = cache.query("tbl1").unwrap().where_(&json!({"id": {"in": ["r1", "r3"]}})).execute().unwrap();
        assert_eq!(rows.len(), 2);

        cache.close().unwrap();
    }
}
