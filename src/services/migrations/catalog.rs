//! The ordered, immutable list of schema migration steps.
//!
//! Every step carries one body per backend because DDL syntax and defaults
//! diverge between SQLite and PostgreSQL. Steps are append-only: once a step
//! has shipped its body never changes, and schema evolution happens by
//! adding a step with a higher id.
//!
//! Bodies must be safe to run twice. The runner only knows a step is applied
//! once its version has been recorded, so a crash between the body and the
//! record replays the whole body on the next boot. Use `IF NOT EXISTS`
//! forms, `ON CONFLICT DO NOTHING` for seed rows, and `Statement::AddColumn`
//! for new columns.

use std::collections::HashSet;

use crate::services::database::error::{DatabaseError, DatabaseResult};
use crate::services::database::traits::{BackendKind, DatabaseConnection};

/// One unit of a migration body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    /// Raw SQL in the backend's own dialect. May hold several `;`-separated statements.
    Sql(&'static str),
    /// Add a column unless it already exists.
    ///
    /// SQLite has no `ADD COLUMN IF NOT EXISTS`, so the guard is resolved by
    /// the driver.
    AddColumn {
        table: &'static str,
        column: &'static str,
        definition: &'static str,
    },
}

/// Per-backend bodies of a migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationBody {
    pub embedded: &'static [Statement],
    pub networked: &'static [Statement],
}

/// A single numbered migration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Strictly positive, unique within a catalog
    pub id: i64,
    /// Short description for logs
    pub name: &'static str,
    pub body: MigrationBody,
}

impl Migration {
    /// The statements to run against a given backend
    pub fn statements(&self, kind: BackendKind) -> &'static [Statement] {
        match kind {
            BackendKind::Embedded => self.body.embedded,
            BackendKind::Networked => self.body.networked,
        }
    }

    /// Run this step's body for the connection's backend.
    ///
    /// Does not touch the version store.
    pub async fn apply_body(&self, conn: &dyn DatabaseConnection) -> sqlx::Result<()> {
        for statement in self.statements(conn.backend_kind()) {
            match *statement {
                Statement::Sql(sql) => conn.execute_script(sql).await?,
                Statement::AddColumn {
                    table,
                    column,
                    definition,
                } => {
                    if !conn.add_column_if_absent(table, column, definition).await? {
                        tracing::debug!(step = self.id, table, column, "Column already present");
                    }
                }
            }
        }
        Ok(())
    }
}

/// An ordered catalog of migration steps.
///
/// Declaration order is not trusted: steps are kept sorted by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    steps: Vec<Migration>,
}

impl Catalog {
    /// Build a catalog, validating ids and sorting by ascending id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidCatalog` if an id is not in
    /// `1..=i32::MAX` (the embedded version counter is 32-bit), an id
    /// appears twice, or an `AddColumn` names something other than a plain
    /// identifier.
    pub fn new(steps: impl IntoIterator<Item = Migration>) -> DatabaseResult<Self> {
        let mut steps: Vec<Migration> = steps.into_iter().collect();
        let mut seen = HashSet::with_capacity(steps.len());

        for step in &steps {
            if step.id < 1 || step.id > i64::from(i32::MAX) {
                return Err(DatabaseError::InvalidCatalog(format!(
                    "migration id {} is out of range (1..={})",
                    step.id,
                    i32::MAX
                )));
            }
            if !seen.insert(step.id) {
                return Err(DatabaseError::InvalidCatalog(format!(
                    "migration id {} is declared more than once",
                    step.id
                )));
            }
            for statement in step.body.embedded.iter().chain(step.body.networked) {
                if let Statement::AddColumn { table, column, .. } = statement {
                    for ident in [table, column] {
                        if !is_plain_identifier(ident) {
                            return Err(DatabaseError::InvalidCatalog(format!(
                                "migration {} adds a column with invalid identifier {:?}",
                                step.id, ident
                            )));
                        }
                    }
                }
            }
        }

        steps.sort_by_key(|step| step.id);
        Ok(Self { steps })
    }

    /// The application's schema history.
    pub fn application() -> DatabaseResult<Self> {
        Self::new(APPLICATION_MIGRATIONS.iter().copied())
    }

    /// Steps whose id exceeds `current_version`, in ascending id order.
    pub fn pending(&self, current_version: i64) -> impl Iterator<Item = &Migration> {
        self.steps
            .iter()
            .filter(move |step| step.id > current_version)
    }

    /// Highest id in the catalog, or 0 when empty
    pub fn latest_version(&self) -> i64 {
        self.steps.last().map(|step| step.id).unwrap_or(0)
    }

    /// Look up a step by id
    pub fn get(&self, id: i64) -> Option<&Migration> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Iterate over all steps in id order
    pub fn iter(&self) -> impl Iterator<Item = &Migration> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ============================================================================
// Application schema
// ============================================================================

const APPLICATION_MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        name: "create recipes and ingredients",
        body: MigrationBody {
            embedded: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    instructions TEXT NOT NULL DEFAULT '',
                    servings INTEGER NOT NULL DEFAULT 1 CHECK (servings > 0),
                    prep_minutes INTEGER CHECK (prep_minutes IS NULL OR prep_minutes >= 0),
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    quantity REAL,
                    unit TEXT,
                    position INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients(recipe_id, position);
                "#,
            )],
            networked: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS recipes (
                    id SERIAL PRIMARY KEY,
                    title TEXT NOT NULL,
                    description TEXT,
                    instructions TEXT NOT NULL DEFAULT '',
                    servings INTEGER NOT NULL DEFAULT 1 CHECK (servings > 0),
                    prep_minutes INTEGER CHECK (prep_minutes IS NULL OR prep_minutes >= 0),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE TABLE IF NOT EXISTS ingredients (
                    id SERIAL PRIMARY KEY,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    quantity DOUBLE PRECISION,
                    unit TEXT,
                    position INTEGER NOT NULL DEFAULT 0
                );
                CREATE INDEX IF NOT EXISTS idx_ingredients_recipe ON ingredients(recipe_id, position);
                "#,
            )],
        },
    },
    Migration {
        id: 2,
        name: "create meal plan and shopping list",
        body: MigrationBody {
            embedded: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS meal_plan_entries (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    planned_for TEXT NOT NULL,
                    meal_slot TEXT NOT NULL CHECK (meal_slot IN ('breakfast', 'lunch', 'dinner', 'snack')),
                    servings INTEGER NOT NULL DEFAULT 1 CHECK (servings > 0),
                    note TEXT,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX IF NOT EXISTS idx_meal_plan_date ON meal_plan_entries(planned_for);
                CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    quantity REAL,
                    unit TEXT,
                    checked INTEGER NOT NULL DEFAULT 0 CHECK (checked IN (0, 1)),
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                "#,
            )],
            networked: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS meal_plan_entries (
                    id SERIAL PRIMARY KEY,
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    planned_for DATE NOT NULL,
                    meal_slot TEXT NOT NULL CHECK (meal_slot IN ('breakfast', 'lunch', 'dinner', 'snack')),
                    servings INTEGER NOT NULL DEFAULT 1 CHECK (servings > 0),
                    note TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS idx_meal_plan_date ON meal_plan_entries(planned_for);
                CREATE TABLE IF NOT EXISTS shopping_list_items (
                    id SERIAL PRIMARY KEY,
                    name TEXT NOT NULL,
                    quantity DOUBLE PRECISION,
                    unit TEXT,
                    checked BOOLEAN NOT NULL DEFAULT FALSE,
                    recipe_id INTEGER REFERENCES recipes(id) ON DELETE SET NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                "#,
            )],
        },
    },
    Migration {
        id: 3,
        name: "create tags with seed rows",
        body: MigrationBody {
            embedded: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS recipe_tags (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (recipe_id, tag_id)
                );
                INSERT INTO tags (name) VALUES
                    ('breakfast'), ('dessert'), ('quick'), ('vegan'), ('vegetarian')
                ON CONFLICT (name) DO NOTHING;
                "#,
            )],
            networked: &[Statement::Sql(
                r#"
                CREATE TABLE IF NOT EXISTS tags (
                    id SERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE
                );
                CREATE TABLE IF NOT EXISTS recipe_tags (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    PRIMARY KEY (recipe_id, tag_id)
                );
                INSERT INTO tags (name) VALUES
                    ('breakfast'), ('dessert'), ('quick'), ('vegan'), ('vegetarian')
                ON CONFLICT (name) DO NOTHING;
                "#,
            )],
        },
    },
    Migration {
        id: 4,
        name: "track external recipe sources",
        body: MigrationBody {
            embedded: &[
                Statement::AddColumn {
                    table: "recipes",
                    column: "source_url",
                    definition: "TEXT",
                },
                Statement::AddColumn {
                    table: "recipes",
                    column: "image_url",
                    definition: "TEXT",
                },
                Statement::AddColumn {
                    table: "recipes",
                    column: "external_id",
                    definition: "TEXT",
                },
                Statement::Sql(
                    "CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_external_id \
                     ON recipes(external_id) WHERE external_id IS NOT NULL;",
                ),
            ],
            networked: &[Statement::Sql(
                r#"
                ALTER TABLE recipes ADD COLUMN IF NOT EXISTS source_url TEXT;
                ALTER TABLE recipes ADD COLUMN IF NOT EXISTS image_url TEXT;
                ALTER TABLE recipes ADD COLUMN IF NOT EXISTS external_id TEXT;
                CREATE UNIQUE INDEX IF NOT EXISTS idx_recipes_external_id
                    ON recipes(external_id) WHERE external_id IS NOT NULL;
                "#,
            )],
        },
    },
];
