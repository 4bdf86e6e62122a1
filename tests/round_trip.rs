#[cfg(test)]
mod tests {
    use gridcache::db::cache::Cache;
    use gridcache::libs::config::Config;
    use gridcache::libs::fields::RemoteField;
    use serde_json::json;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    struct RoundTripTestContext {
        _guard: parking_lot::MutexGuard<'static, ()>,
        _temp_dir: TempDir,
    }

    impl TestContext for RoundTripTestContext {
        fn setup() -> Self {
            let guard = ENV_LOCK.lock();
            let temp_dir = tempfile::tempdir().unwrap();
            std::env::set_var("HOME", temp_dir.path());
            std::env::set_var("LOCALAPPDATA", temp_dir.path());
            RoundTripTestContext {
                _guard: guard,
                _temp_dir: temp_dir,
            }
        }
    }

    fn catalog() -> Vec<RemoteField> {
        vec![
            RemoteField::new("name", "Name", "textfield"),
            RemoteField::new("amount", "Amount", "currencyfield"),
            RemoteField::new("done", "Done", "yesnofield"),
            RemoteField::new("when", "When", "datefield"),
            RemoteField::new("tags", "Tags", "multipleselectfield"),
            RemoteField::new("assignees", "Assignees", "assignedtofield"),
            RemoteField::new("state", "State", "statusfield"),
            RemoteField::new("due", "Due", "duedatefield"),
            RemoteField::new("address", "Address", "addressfield"),
            RemoteField::new("checks", "Checklist", "checklistfield"),
            RemoteField::new("created", "Created", "firstcreatedfield"),
            RemoteField::new("mystery", "Mystery", "somevendorfield"),
        ]
    }

    #[test_context(RoundTripTestContext)]
    #[test]
    fn test_every_field_round_trips(_ctx: &mut RoundTripTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let record = json!({
            "id": "r1",
            "name": "Quarterly review",
            "amount": 1250.5,
            "done": false,
            "when": "2025-04-01T09:30:00Z",
            "tags": ["finance", "q2"],
            "assignees": ["member_1"],
            "state": {"value": "in_progress", "updated_on": "2025-03-01T08:00:00Z"},
            "due": {
                "from_date": {"date": "2025-04-01T00:00:00Z", "include_time": false},
                "to_date": {"date": "2025-04-30T17:00:00Z", "include_time": true},
                "is_overdue": false,
                "status_is_completed": false,
            },
            "address": {"sys_root": "Calle Mayor 1, Madrid", "city": "Madrid"},
            "checks": {"items": [{"label": "draft", "done": true}], "total_items": 2, "completed_items": 1},
            "created": {"on": "2025-01-15T10:00:00Z", "by": "member_1"},
            "mystery": {"vendor": "blob"},
        });
        cache.bulk_replace("t1", &catalog(), &[record], None).unwrap();

        let rebuilt = cache.get_record("t1", "r1").unwrap().unwrap();

        // Every catalog field reappears, whatever its shape
        for field in catalog() {
            assert!(rebuilt.get(&field.slug).is_some(), "missing key {}", field.slug);
        }

        assert_eq!(rebuilt["name"], json!("Quarterly review"));
        assert_eq!(rebuilt["amount"], json!(1250.5));
        assert_eq!(rebuilt["done"], json!(false));
        assert_eq!(rebuilt["when"], json!("2025-04-01T09:30:00Z"));
        assert_eq!(rebuilt["tags"], json!(["finance", "q2"]));
        assert_eq!(rebuilt["assignees"], json!(["member_1"]));
        assert_eq!(rebuilt["state"], json!({"value": "in_progress", "updated_on": "2025-03-01T08:00:00Z"}));
        assert_eq!(rebuilt["due"]["from_date"], json!({"date": "2025-04-01T00:00:00Z", "include_time": false}));
        assert_eq!(rebuilt["due"]["to_date"], json!({"date": "2025-04-30T17:00:00Z", "include_time": true}));
        assert_eq!(rebuilt["due"]["is_overdue"], json!(false));
        assert_eq!(rebuilt["address"], json!({"sys_root": "Calle Mayor 1, Madrid", "city": "Madrid"}));
        assert_eq!(rebuilt["checks"]["total_items"], json!(2));
        assert_eq!(rebuilt["created"], json!({"on": "2025-01-15T10:00:00Z", "by": "member_1"}));
        assert_eq!(rebuilt["mystery"], json!({"vendor": "blob"}));

        cache.close().unwrap();
    }

    #[test_context(RoundTripTestContext)]
    #[test]
    fn test_null_empty_and_zero_stay_distinct(_ctx: &mut RoundTripTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let record = json!({
            "id": "r1",
            "name": "",
            "amount": 0.0,
            "done": null,
            "tags": [],
        });
        cache.bulk_replace("t1", &catalog(), &[record], None).unwrap();

        let rebuilt = cache.get_record("t1", "r1").unwrap().unwrap();
        assert_eq!(rebuilt["name"], json!(""));
        assert_eq!(rebuilt["amount"], json!(0.0));
        assert_eq!(rebuilt["done"], json!(null));
        assert_eq!(rebuilt["tags"], json!([]));
        // Fields absent from the source record come back as null keys
        assert_eq!(rebuilt["state"], json!(null));
        assert_eq!(rebuilt["due"], json!(null));

        cache.close().unwrap();
    }

    #[test_context(RoundTripTestContext)]
    #[test]
    fn test_degraded_values_do_not_fail_the_record(_ctx: &mut RoundTripTestContext) {
        let cache = Cache::open(Config::default()).unwrap();
        let record = json!({
            "id": "r1",
            "name": "Broken dates",
            "when": "not-a-date",
            "created": {"on": "also not a date", "by": "member_1"},
        });
        cache.bulk_replace("t1", &catalog(), &[record], None).unwrap();

        let rebuilt = cache.get_record("t1", "r1").unwrap().unwrap();
        // Unparseable timestamps degrade to null, the rest survives
        assert_eq!(rebuilt["when"], json!(null));
        assert_eq!(rebuilt["created"]["on"], json!(null));
        assert_eq!(rebuilt["created"]["by"], json!("member_1"));
        assert_eq!(rebuilt["name"], json!("Broken dates"));

        cache.close().unwrap();
    }
}
