//! Engine operations against a recording in-memory driver.
//!
//! The driver records every statement and serves canned rows, honoring
//! `LIMIT`/`OFFSET` and answering `SELECT COUNT` with the row count.

#![cfg(feature = "derive")]

use async_trait::async_trait;
use gplus::{
    Driver, Engine, EngineConfig, FromRow, Function, Model, OrmError, OrmResult, Page,
    Placeholder, QueryCond, Row, Value, options,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, FromRow, Model)]
#[orm(table = "users")]
struct User {
    #[orm(id)]
    id: i64,
    username: String,
    #[orm(column = "user_age")]
    age: i32,
}

#[derive(Debug, FromRow)]
struct AgeStat {
    age: i32,
    total: i64,
}

#[derive(Clone, Default)]
struct MockDb {
    calls: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    rows: Arc<Vec<Row>>,
    affected: u64,
}

impl MockDb {
    fn with_users(n: i64) -> Self {
        let rows = (1..=n)
            .map(|i| {
                Row::from_pairs([
                    ("id", Value::Int(i)),
                    ("username", Value::from(format!("user{i}"))),
                    ("user_age", Value::Int(20 + i)),
                ])
            })
            .collect();
        Self {
            rows: Arc::new(rows),
            affected: 1,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn last_sql(&self) -> String {
        self.calls().last().map(|(sql, _)| sql.clone()).unwrap_or_default()
    }

    fn record(&self, sql: &str, args: &[Value]) {
        self.calls.lock().unwrap().push((sql.to_string(), args.to_vec()));
    }
}

fn clause(sql: &str, keyword: &str) -> Option<usize> {
    let rest = &sql[sql.find(keyword)? + keyword.len()..];
    rest.split_whitespace().next()?.parse().ok()
}

#[async_trait]
impl Driver for MockDb {
    async fn query(&self, sql: &str, args: &[Value]) -> OrmResult<Vec<Row>> {
        self.record(sql, args);
        if sql.starts_with("SELECT COUNT") {
            let count = self.rows.len() as i64;
            return Ok(vec![Row::from_pairs([("count", count)])]);
        }
        let offset = clause(sql, " OFFSET ").unwrap_or(0);
        let limit = clause(sql, " LIMIT ").unwrap_or(usize::MAX);
        Ok(self.rows.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> OrmResult<u64> {
        self.record(sql, args);
        Ok(self.affected)
    }
}

fn engine(db: &MockDb) -> Engine {
    Engine::new(db.clone())
}

fn user(id: i64, username: &str, age: i32) -> User {
    User {
        id,
        username: username.to_string(),
        age,
    }
}

#[tokio::test]
async fn select_list_renders_dollar_placeholders() {
    let db = MockDb::with_users(3);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.eq(u.username, "alice").or().ge(u.age, 18);
    let users = engine.select_list(&q, []).await.unwrap();

    assert_eq!(users.len(), 3);
    assert_eq!(users[0], user(1, "user1", 21));
    let (sql, args) = &db.calls()[0];
    assert_eq!(sql, "SELECT * FROM users WHERE username = $1 OR user_age >= $2");
    assert_eq!(args, &vec![Value::from("alice"), Value::Int(18)]);
}

#[tokio::test]
async fn question_placeholder_is_kept_when_configured() {
    let db = MockDb::with_users(1);
    let config = EngineConfig::default().placeholder(Placeholder::Question);
    let engine = Engine::with_config(db.clone(), config);

    let (mut q, u) = engine.query::<User>();
    q.in_list(u.id, [1, 2, 3]);
    engine.select_list(&q, []).await.unwrap();

    assert_eq!(db.last_sql(), "SELECT * FROM users WHERE id IN (?, ?, ?)");
}

#[tokio::test]
async fn select_page_counts_then_fetches_window() {
    let db = MockDb::with_users(25);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.order_by_asc([u.id]);
    let page = engine.select_page(Page::new(2, 10), &q, []).await.unwrap();

    assert_eq!(page.total, 25);
    assert_eq!(page.records.len(), 10);
    assert_eq!(page.records[0].id, 11);
    assert_eq!(page.pages(), 3);
    assert!(page.cur_time > 0);

    let calls = db.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "SELECT COUNT(*) FROM users");
    assert_eq!(calls[1].0, "SELECT * FROM users ORDER BY id ASC LIMIT 10 OFFSET 10");
}

#[tokio::test]
async fn select_page_ignore_total_skips_count() {
    let db = MockDb::with_users(5);
    let engine = engine(&db);

    let q = QueryCond::<User>::new();
    let page = engine
        .select_page(Page::new(1, 2), &q, [options::ignore_total()])
        .await
        .unwrap();

    assert_eq!(page.total, 0);
    assert_eq!(page.records.len(), 2);
    assert_eq!(db.calls().len(), 1);
}

#[tokio::test]
async fn select_page_normalizes_request_page() {
    let db = MockDb::with_users(25);
    let engine = engine(&db);

    // as deserialized from a request body, bypassing Page::new
    let request = Page {
        current: 0,
        size: 0,
        total: 0,
        records: Vec::new(),
        cur_time: 0,
    };
    let q = QueryCond::<User>::new();
    let page = engine.select_page(request, &q, []).await.unwrap();

    assert_eq!((page.current, page.size), (1, 10));
    assert_eq!(page.records.len(), 10);
    assert_eq!(db.last_sql(), "SELECT * FROM users LIMIT 10 OFFSET 0");
}

#[tokio::test]
async fn distinct_page_counts_distinct_rows() {
    let db = MockDb::with_users(3);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.distinct([u.age]);
    engine.select_page(Page::new(1, 10), &q, []).await.unwrap();

    let calls = db.calls();
    assert_eq!(calls[0].0, "SELECT COUNT(DISTINCT user_age) FROM users");
    assert_eq!(calls[1].0, "SELECT DISTINCT user_age FROM users LIMIT 10 OFFSET 0");
}

#[tokio::test]
async fn page_of_maps() {
    let db = MockDb::with_users(2);
    let engine = engine(&db);

    let q = QueryCond::<User>::new();
    let page = engine
        .select_page_generic::<User, serde_json::Map<String, serde_json::Value>>(
            Page::new(1, 10),
            &q,
            [],
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.records[1]["username"], "user2");
    assert_eq!(page.records[1]["user_age"], 22);
}

#[tokio::test]
async fn idx_lookups_filter_on_idx_column() {
    let db = MockDb::with_users(1);
    let engine = engine(&db);

    let found: User = engine.select_by_idx("ab12", []).await.unwrap();
    assert_eq!(found.id, 1);
    assert_eq!(db.last_sql(), "SELECT * FROM users WHERE idx = $1 LIMIT 1");

    engine.delete_by_idx::<User>("ab12", []).await.unwrap();
    let (sql, args) = db.calls().pop().unwrap();
    assert_eq!(sql, "DELETE FROM users WHERE idx = $1");
    assert_eq!(args, vec![Value::from("ab12")]);
}

#[tokio::test]
async fn select_one_uses_limit_and_reports_not_found() {
    let db = MockDb::with_users(2);
    let engine = engine(&db);

    // the mock ignores WHERE and serves its first row
    let found: User = engine.select_by_id(2, []).await.unwrap();
    assert_eq!(found.username, "user1");
    assert_eq!(db.last_sql(), "SELECT * FROM users WHERE id = $1 LIMIT 1");

    let empty = MockDb::default();
    let err = engine
        .select_by_id::<User>(9, [options::db(&empty)])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(db.calls().len(), 1);
    assert_eq!(empty.calls().len(), 1);
}

#[tokio::test]
async fn select_by_ids_with_no_ids_skips_the_database() {
    let db = MockDb::with_users(2);
    let engine = engine(&db);

    let users = engine.select_by_ids::<User, _, i64>([], []).await.unwrap();
    assert!(users.is_empty());
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn exists_and_count() {
    let db = MockDb::with_users(4);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.gt(u.age, 30).select([u.username]);

    assert_eq!(engine.select_count(&q, []).await.unwrap(), 4);
    assert_eq!(db.last_sql(), "SELECT COUNT(*) FROM users WHERE user_age > $1");
    assert!(engine.exists(&q, []).await.unwrap());

    let empty = MockDb::default();
    assert!(!engine.exists(&q, [options::db(&empty)]).await.unwrap());
}

#[tokio::test]
async fn grouped_count_wraps_subquery() {
    let db = MockDb::with_users(1);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.group([u.age]).having(Function::count(u.id).gt(1));
    engine.select_count(&q, []).await.unwrap();

    assert_eq!(
        db.last_sql(),
        "SELECT COUNT(*) FROM (SELECT 1 FROM users GROUP BY user_age HAVING COUNT(id) > $1) AS t"
    );
}

#[tokio::test]
async fn insert_drops_zero_primary_key() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    let affected = engine.insert(&user(0, "alice", 30), []).await.unwrap();
    assert_eq!(affected, 1);

    let (sql, args) = &db.calls()[0];
    assert_eq!(sql, "INSERT INTO users (username, user_age) VALUES ($1, $2)");
    assert_eq!(args, &vec![Value::from("alice"), Value::Int(30)]);
}

#[tokio::test]
async fn insert_batch_splits_into_chunks() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    let users: Vec<User> = (1..=5).map(|i| user(i, "u", 20)).collect();
    let affected = engine.insert_batch_size(&users, 2, []).await.unwrap();

    let calls = db.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(affected, 3);
    assert_eq!(
        calls[0].0,
        "INSERT INTO users (id, username, user_age) VALUES ($1, $2, $3), ($4, $5, $6)"
    );
    assert_eq!(calls[2].1.len(), 3);

    assert_eq!(engine.insert_batch::<User>(&[], []).await.unwrap(), 0);
    assert_eq!(db.calls().len(), 3);
}

#[tokio::test]
async fn insert_respects_table_and_omit_options() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    engine
        .insert(
            &user(7, "bob", 40),
            [options::table("users_archive"), options::omit(["user_age"])],
        )
        .await
        .unwrap();

    assert_eq!(
        db.last_sql(),
        "INSERT INTO users_archive (id, username) VALUES ($1, $2)"
    );
}

#[tokio::test]
async fn update_by_id_skips_zero_fields() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    engine.update_by_id(&user(3, "carol", 0), []).await.unwrap();
    let (sql, args) = &db.calls()[0];
    assert_eq!(sql, "UPDATE users SET username = $1 WHERE id = $2");
    assert_eq!(args, &vec![Value::from("carol"), Value::Int(3)]);

    engine.update_zero_by_id(&user(3, "carol", 0), []).await.unwrap();
    assert_eq!(
        db.last_sql(),
        "UPDATE users SET username = $1, user_age = $2 WHERE id = $3"
    );

    let (_, u) = engine.query::<User>();
    engine
        .update_by_id(&user(3, "", 0), [options::select([u.age])])
        .await
        .unwrap();
    assert_eq!(db.last_sql(), "UPDATE users SET user_age = $1 WHERE id = $2");
}

#[tokio::test]
async fn update_by_id_requires_primary_key() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    let err = engine.update_by_id(&user(0, "x", 1), []).await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
    assert!(db.calls().is_empty());
}

#[tokio::test]
async fn update_with_condition_sets() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.set(u.age, 50).set(u.username, "z").eq(u.id, 1);
    engine.update(&q, []).await.unwrap();

    let (sql, args) = &db.calls()[0];
    assert_eq!(sql, "UPDATE users SET user_age = $1, username = $2 WHERE id = $3");
    assert_eq!(args, &vec![Value::Int(50), Value::from("z"), Value::Int(1)]);
}

#[tokio::test]
async fn delete_requires_condition() {
    let db = MockDb::with_users(0);
    let engine = engine(&db);

    let q = QueryCond::<User>::new();
    let err = engine.delete(&q, []).await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    engine.delete_by_id::<User>(4, []).await.unwrap();
    assert_eq!(db.last_sql(), "DELETE FROM users WHERE id = $1");

    engine.delete_by_ids::<User, _, _>([1, 2], []).await.unwrap();
    assert_eq!(db.last_sql(), "DELETE FROM users WHERE id IN ($1, $2)");

    assert_eq!(engine.delete_by_ids::<User, _, i64>([], []).await.unwrap(), 0);
    assert_eq!(db.calls().len(), 2);
}

#[tokio::test]
async fn pluck_reads_first_column() {
    let db = MockDb::with_users(3);
    let engine = engine(&db);

    let (q, u) = engine.query::<User>();
    let ids: Vec<i64> = engine.pluck(u.id, &q, []).await.unwrap();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(db.last_sql(), "SELECT id FROM users");

    let _: Vec<i64> = engine.pluck_distinct(u.id, &q, []).await.unwrap();
    assert_eq!(db.last_sql(), "SELECT DISTINCT id FROM users");
}

#[tokio::test]
async fn generic_select_scans_into_other_type() {
    let rows = vec![Row::from_pairs([
        ("age", Value::Int(30)),
        ("total", Value::Int(2)),
    ])];
    let db = MockDb {
        rows: Arc::new(rows),
        ..MockDb::default()
    };
    let engine = engine(&db);

    let (mut q, u) = engine.query::<User>();
    q.select([Function::count(u.id).as_("total")])
        .select([u.age])
        .group([u.age]);
    let stats: Vec<AgeStat> = engine.select_list_generic::<User, AgeStat>(&q, []).await.unwrap();

    assert_eq!(stats[0].age, 30);
    assert_eq!(stats[0].total, 2);
    assert_eq!(
        db.last_sql(),
        "SELECT COUNT(id) AS total, user_age FROM users GROUP BY user_age"
    );
}

#[tokio::test]
async fn raw_sql_passes_through() {
    let db = MockDb::with_users(2);
    let engine = engine(&db);

    let users: Vec<User> = engine
        .select_list_by_sql("SELECT * FROM users WHERE id > $1", &[Value::Int(0)], [])
        .await
        .unwrap();
    assert_eq!(users.len(), 2);

    let one: User = engine
        .select_one_by_sql("SELECT * FROM users", &[], [])
        .await
        .unwrap();
    assert_eq!(one.username, "user1");

    let n = engine
        .exc_sql("UPDATE users SET user_age = 1 WHERE 1 = ?", &[Value::Int(1)], [])
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(db.last_sql(), "UPDATE users SET user_age = 1 WHERE 1 = ?");
}

#[test]
fn derived_model_describes_columns() {
    let meta = User::describe();
    assert_eq!(meta.name, "User");
    assert_eq!(meta.table, Some("users"));
    assert_eq!(meta.fields.len(), 3);
    assert!(meta.fields[0].primary_key);
    assert_eq!(meta.fields[2].column, Some("user_age"));

    let values = user(1, "a", 2).values();
    assert_eq!(values, vec![Value::Int(1), Value::from("a"), Value::Int(2)]);
}

#[allow(dead_code)]
async fn transaction_macro_compiles(engine: &Engine, client: &mut tokio_postgres::Client) -> OrmResult<()> {
    gplus::transaction!(client, tx, {
        engine.insert(&user(0, "t", 1), [options::db(&tx)]).await?;
        engine.delete_by_id::<User>(1, [options::db(&tx)]).await?;
        Ok::<(), OrmError>(())
    })
}
