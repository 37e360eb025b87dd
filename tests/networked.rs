//! Migration scenarios against a live PostgreSQL server.
//!
//! Skipped unless `LARDER_TEST_DATABASE_URL` points at a database the test
//! may create schemas in. Each test works inside its own schema.

use larder::services::migrations::{
    MIGRATIONS_TABLE, Migration, MigrationBody, Statement, TableVersionStore,
};
use larder::{BackendKind, Catalog, DatabaseConfig, DatabaseError, Value, open_and_migrate};

const TEST_URL_ENV: &str = "LARDER_TEST_DATABASE_URL";

/// A fresh schema plus a connection string scoped to it.
struct Scratch {
    admin: larder::Database,
    schema: String,
    url: String,
}

impl Scratch {
    async fn create() -> Option<Self> {
        let Ok(base) = std::env::var(TEST_URL_ENV) else {
            eprintln!("{TEST_URL_ENV} not set; skipping");
            return None;
        };

        let admin = larder::services::bootstrap::open(&DatabaseConfig::networked(base.clone()))
            .await
            .unwrap();
        let schema = format!("larder_test_{}", uuid::Uuid::new_v4().simple());
        admin
            .execute(&format!("CREATE SCHEMA {schema}"), &[])
            .await
            .unwrap();

        let mut url = url::Url::parse(&base).unwrap();
        url.query_pairs_mut()
            .append_pair("options", &format!("-c search_path={schema}"));

        Some(Self {
            admin,
            schema,
            url: url.to_string(),
        })
    }

    fn config(&self) -> DatabaseConfig {
        DatabaseConfig::networked(self.url.clone())
    }

    async fn remove(self) {
        self.admin
            .execute(&format!("DROP SCHEMA {} CASCADE", self.schema), &[])
            .await
            .unwrap();
        self.admin.close().await;
    }
}

#[test]
fn fresh_schema_migrates_once() {
    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let catalog = Catalog::application().unwrap();

        let (db, first) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();
        assert_eq!(first.backend, BackendKind::Networked);
        assert_eq!(first.from_version, 0);
        assert_eq!(first.to_version, catalog.latest_version());
        db.close().await;

        let (db, second) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();
        assert!(second.is_noop());

        let applied = TableVersionStore.applied(db.connection()).await.unwrap();
        let versions: Vec<i64> = applied.iter().map(|a| a.version).collect();
        assert_eq!(versions, (1..=catalog.latest_version()).collect::<Vec<_>>());
        assert!(applied.iter().all(|a| a.applied_at.is_some()));

        let log = db
            .query_rows(&format!("SELECT COUNT(*) AS n FROM {MIGRATIONS_TABLE}"), &[])
            .await
            .unwrap();
        assert_eq!(log[0].get_i64("n"), Some(catalog.len() as i64));
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn version_reads_zero_before_first_migration() {
    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };

        let db = larder::services::bootstrap::open(&scratch.config())
            .await
            .unwrap();
        assert_eq!(db.version().await.unwrap(), 0);
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn placeholders_are_rewritten_for_postgres() {
    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let catalog = Catalog::application().unwrap();
        let (db, _) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();

        db.execute(
            "INSERT INTO recipes (title, servings) VALUES (?, ?)",
            &[Value::from("Pancakes"), Value::from(2i32)],
        )
        .await
        .unwrap();
        let rows = db
            .query_rows(
                "SELECT title, servings FROM recipes WHERE title = ? AND servings = ?",
                &[Value::from("Pancakes"), Value::from(2i32)],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("servings"), Some(2));

        let err = db
            .execute(
                "INSERT INTO meal_plan_entries (planned_for, meal_slot) VALUES (CURRENT_DATE, ?)",
                &[Value::from("brunch")],
            )
            .await
            .unwrap_err();
        match err {
            DatabaseError::Query { backend, sql, .. } => {
                assert_eq!(backend, BackendKind::Networked);
                assert!(sql.contains("$1"));
            }
            other => panic!("expected query error, got {other:?}"),
        }
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn resumes_from_existing_migrations_log() {
    const ONE: &[Statement] = &[Statement::Sql("CREATE TABLE step_one (id SERIAL PRIMARY KEY)")];
    const TWO: &[Statement] = &[Statement::Sql("CREATE TABLE step_two (id SERIAL PRIMARY KEY)")];
    let step = |id, body| Migration {
        id,
        name: "scenario",
        body: MigrationBody {
            embedded: body,
            networked: body,
        },
    };

    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let db = larder::services::bootstrap::open(&scratch.config())
            .await
            .unwrap();
        db.execute(
            "CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
            &[],
        )
        .await
        .unwrap();
        db.execute("INSERT INTO schema_migrations (version) VALUES (1)", &[])
            .await
            .unwrap();
        db.close().await;

        let catalog = Catalog::new([step(2, TWO), step(1, ONE)]).unwrap();
        let (db, report) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();
        assert_eq!(report.from_version, 1);
        assert_eq!(report.applied, vec![2]);
        assert_eq!(db.version().await.unwrap(), 2);

        // Step 1's body never ran here.
        let one = db
            .query_rows(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = ?",
                &[Value::from("step_one")],
            )
            .await
            .unwrap();
        assert!(one.is_empty());
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn null_argument_binds_to_integer_column() {
    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let catalog = Catalog::application().unwrap();
        let (db, _) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();

        let inserted = db
            .execute(
                "INSERT INTO recipes (title, prep_minutes) VALUES (?, ?)",
                &[Value::from("Toast"), Value::from(Option::<i64>::None)],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let rows = db
            .query_rows(
                "SELECT prep_minutes FROM recipes WHERE title = ?",
                &[Value::from("Toast")],
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("prep_minutes"), Some(&Value::Null));
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn every_body_replays_before_first_record() {
    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let catalog = Catalog::application().unwrap();

        // Every body ran but no version was ever recorded.
        let db = larder::services::bootstrap::open(&scratch.config())
            .await
            .unwrap();
        for step in catalog.iter() {
            step.apply_body(db.connection()).await.unwrap();
        }
        assert_eq!(db.version().await.unwrap(), 0);
        db.close().await;

        let (db, report) = open_and_migrate(&scratch.config(), &catalog).await.unwrap();
        let all: Vec<i64> = catalog.iter().map(|step| step.id).collect();
        assert_eq!(report.applied, all);
        assert_eq!(db.version().await.unwrap(), catalog.latest_version());

        let tags = db.query_rows("SELECT name FROM tags", &[]).await.unwrap();
        assert_eq!(tags.len(), 5);
        db.close().await;

        scratch.remove().await;
    });
}

#[test]
fn failing_step_keeps_previous_version() {
    const ONE: &[Statement] = &[Statement::Sql("CREATE TABLE a (id SERIAL PRIMARY KEY)")];
    const TWO: &[Statement] = &[Statement::Sql(
        "CREATE TABLE b (id SERIAL PRIMARY KEY, n INTEGER CHECK (n > 0));
         INSERT INTO b (n) VALUES (0);",
    )];
    const THREE: &[Statement] = &[Statement::Sql("CREATE TABLE c (id SERIAL PRIMARY KEY)")];
    let step = |id, body| Migration {
        id,
        name: "scenario",
        body: MigrationBody {
            embedded: body,
            networked: body,
        },
    };

    smol::block_on(async {
        let Some(scratch) = Scratch::create().await else {
            return;
        };
        let catalog = Catalog::new([step(1, ONE), step(2, TWO), step(3, THREE)]).unwrap();

        let err = open_and_migrate(&scratch.config(), &catalog)
            .await
            .map(|(_, report)| report)
            .unwrap_err();
        assert!(matches!(err, DatabaseError::MigrationStep { id: 2, .. }));

        let db = larder::services::bootstrap::open(&scratch.config())
            .await
            .unwrap();
        assert_eq!(db.version().await.unwrap(), 1);
        let applied = TableVersionStore.applied(db.connection()).await.unwrap();
        let versions: Vec<i64> = applied.iter().map(|a| a.version).collect();
        assert_eq!(versions, vec![1]);

        // The failed script ran as one implicit transaction, so its
        // CREATE TABLE was rolled back with the INSERT.
        for table in ["b", "c"] {
            let found = db
                .query_rows(
                    "SELECT table_name FROM information_schema.tables \
                     WHERE table_schema = current_schema() AND table_name = ?",
                    &[Value::from(table)],
                )
                .await
                .unwrap();
            assert!(found.is_empty(), "table {table} should not exist");
        }
        db.close().await;

        scratch.remove().await;
    });
}
