#[cfg(test)]
mod tests {
    use gridcache::api::{Solution, TableInfo};
    use gridcache::db::cache::{Cache, RefreshResource};
    use gridcache::db::ttl::Ttls;
    use gridcache::libs::config::Config;
    use gridcache::libs::fields::RemoteField;
    use serde_json::json;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    struct LifecycleTestContext {
        _guard: parking_lot::MutexGuard<'static, ()>,
        _temp_dir: TempDir,
    }

    impl TestContext for LifecycleTestContext {
        fn setup() -> Self {
            let guard = ENV_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            LifecycleTestContext {
                _guard: guard,
                _temp_dir: temp_dir,
            }
        }
    }

    fn catalog() -> Vec<RemoteField> {
        vec![RemoteField::new("title", "Title", "textfield")]
    }

    fn solution(id: &str, name: &str) -> Solution {
        Solution {
            id: id.to_string(),
            name: name.to_string(),
            logo_icon: None,
            logo_color: None,
            hidden: false,
            records_count: None,
        }
    }

    fn table(id: &str, name: &str, solution_id: &str) -> TableInfo {
        TableInfo {
            id: id.to_string(),
            name: name.to_string(),
            solution_id: solution_id.to_string(),
            status: None,
            hidden: false,
            icon: None,
            primary_field: None,
            table_order: None,
            permissions: None,
            field_permissions: None,
            record_term: None,
            structure: catalog(),
        }
    }

    /// Seeds solutions, tables for sol_x, and records for two tables.
    fn seeded_cache() -> Cache {
        let cache = Cache::open(Config::default()).unwrap();
        cache.cache_solutions(&[solution("sol_x", "Projects")], None).unwrap();
        cache
            .cache_tables(Some("sol_x"), &[table("t1", "Tasks", "sol_x"), table("t2", "Notes", "sol_x")], None)
            .unwrap();
        cache.bulk_replace("t1", &catalog(), &[json!({"id": "r1", "title": "One"})], None).unwrap();
        cache.bulk_replace("t2", &catalog(), &[json!({"id": "r2", "title": "Two"})], None).unwrap();
        cache
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_solutions_refresh_cascades_everywhere(_ctx: &mut LifecycleTestContext) {
        let cache = seeded_cache();
        assert!(cache.is_valid("t1").unwrap());
        assert!(cache.is_valid("t2").unwrap());

        cache.refresh(&RefreshResource::Solutions).unwrap();

        assert!(!cache.is_valid("t1").unwrap());
        assert!(!cache.is_valid("t2").unwrap());
        assert!(cache.solutions().unwrap().is_empty());
        assert!(cache.tables(None).unwrap().is_empty());

        // Status reflects the cascade for every scope
        for status in cache.status(None).unwrap() {
            assert!(!status.is_valid, "scope {} should be invalid", status.scope);
        }

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_tables_refresh_scoped_to_solution(_ctx: &mut LifecycleTestContext) {
        let cache = seeded_cache();

        // A second solution with its own table stays untouched
        cache.cache_tables(Some("sol_y"), &[table("t3", "Ledger", "sol_y")], None).unwrap();
        cache.bulk_replace("t3", &catalog(), &[json!({"id": "r3", "title": "Three"})], None).unwrap();

        cache
            .refresh(&RefreshResource::Tables {
                solution_id: Some("sol_x".to_string()),
            })
            .unwrap();

        assert!(!cache.is_valid("t1").unwrap());
        assert!(!cache.is_valid("t2").unwrap());
        assert!(cache.is_valid("t3").unwrap());
        assert_eq!(cache.tables(Some("sol_y")).unwrap().len(), 1);
        assert!(cache.tables(Some("sol_x")).unwrap().is_empty());

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_records_refresh_touches_one_table(_ctx: &mut LifecycleTestContext) {
        let cache = seeded_cache();

        cache
            .refresh(&RefreshResource::Records { table_id: "t1".to_string() })
            .unwrap();

        assert!(!cache.is_valid("t1").unwrap());
        assert!(cache.is_valid("t2").unwrap());
        assert_eq!(cache.solutions().unwrap().len(), 1);

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_unknown_refresh_resource_is_rejected(_ctx: &mut LifecycleTestContext) {
        let err = RefreshResource::parse("everything", None).unwrap_err();
        assert!(err.to_string().contains("everything"));

        let err = RefreshResource::parse("records", None).unwrap_err();
        assert!(err.to_string().contains("table id"));
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_ttl_precedence(_ctx: &mut LifecycleTestContext) {
        let cache = Cache::open(Config::default()).unwrap();

        // Explicit argument wins
        cache.bulk_replace("t1", &catalog(), &[json!({"id": "r1", "title": "One"})], Some(3600)).unwrap();
        let status = cache.status(Some("t1")).unwrap().remove(0);
        assert!(status.time_remaining_seconds <= 3600 && status.time_remaining_seconds > 3500);

        // Then the per-table row
        Ttls::new(cache.conn()).unwrap().set("t1", 7200, Some("medium"), None).unwrap();
        cache.bulk_replace("t1", &catalog(), &[json!({"id": "r1", "title": "One"})], None).unwrap();
        let status = cache.status(Some("t1")).unwrap().remove(0);
        assert!(status.time_remaining_seconds <= 7200 && status.time_remaining_seconds > 7100);

        // Invalid values are rejected outright
        assert!(cache.bulk_replace("t1", &catalog(), &[], Some(0)).is_err());
        assert!(Ttls::new(cache.conn()).unwrap().set("t1", -5, None, None).is_err());

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_single_record_operations(_ctx: &mut LifecycleTestContext) {
        let cache = Cache::open(Config::default()).unwrap();

        // Upsert requires the table to be cached first
        assert!(cache.upsert_one("t1", &json!({"id": "r9", "title": "Nine"})).is_err());

        cache.bulk_replace("t1", &catalog(), &[json!({"id": "r1", "title": "One"})], None).unwrap();
        cache.upsert_one("t1", &json!({"id": "r2", "title": "Two"})).unwrap();
        cache.upsert_one("t1", &json!({"id": "r1", "title": "One updated"})).unwrap();

        assert_eq!(cache.query("t1").unwrap().count().unwrap(), 2);
        let record = cache.get_record("t1", "r1").unwrap().unwrap();
        assert_eq!(record["title"], json!("One updated"));
        assert!(cache.get_record("t1", "missing").unwrap().is_none());

        // Deletes are idempotent
        cache.delete_one("t1", "r2").unwrap();
        cache.delete_one("t1", "r2").unwrap();
        cache.delete_one("never_cached", "r2").unwrap();
        assert_eq!(cache.query("t1").unwrap().count().unwrap(), 1);

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_invalidate_with_structure_change(_ctx: &mut LifecycleTestContext) {
        let cache = seeded_cache();

        cache.invalidate("t1", true).unwrap();

        assert!(!cache.is_valid("t1").unwrap());
        // The metadata row expired too, so the catalog gets refetched
        let remaining: Vec<String> = cache.tables(Some("sol_x")).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(remaining, vec!["t2"]);

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_name_lookup_is_accent_insensitive(_ctx: &mut LifecycleTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        cache
            .cache_solutions(
                &[solution("sol_a", "Gestión de Proyectos"), solution("sol_b", "Facturación")],
                None,
            )
            .unwrap();
        cache
            .cache_tables(Some("sol_a"), &[table("t1", "Tareas Pendientes", "sol_a")], None)
            .unwrap();

        let hit = cache.find_solution("gestion").unwrap().unwrap();
        assert_eq!(hit.id, "sol_a");
        let hit = cache.find_solution("facturacion").unwrap().unwrap();
        assert_eq!(hit.id, "sol_b");
        assert!(cache.find_solution("nomina").unwrap().is_none());

        let hit = cache.find_table("tareas", Some("sol_a")).unwrap().unwrap();
        assert_eq!(hit.id, "t1");

        cache.close().unwrap();
    }

    #[test_context(LifecycleTestContext)]
    #[test]
    fn test_performance_counters(_ctx: &mut LifecycleTestContext) {
        let cache = Cache::open(Config::default()).unwrap();

        cache.track_hit("t1");
        cache.track_hit("t1");
        cache.track_hit("t1");
        cache.track_miss("t1");
        cache.track_miss("t2");

        // performance() forces the flush
        let report = cache.performance(Some("t1")).unwrap();
        assert_eq!(report.hits, 3);
        assert_eq!(report.misses, 1);
        assert_eq!(report.total, 4);
        assert!((report.hit_rate_percent - 75.0).abs() < f64::EPSILON);
        assert!(report.last_access.is_some());

        let overall = cache.performance(None).unwrap();
        assert_eq!(overall.total, 5);

        // Persisted counters only grow
        cache.track_hit("t1");
        let report = cache.performance(Some("t1")).unwrap();
        assert_eq!(report.hits, 4);

        cache.close().unwrap();
    }
}
