#[cfg(test)]
pub mod test_utils {
    use std::collections::HashMap;
    use std::sync::Once;

    use rocket::local::asynchronous::Client;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use tempfile::TempDir;
    use tracing::log::LevelFilter;

    use crate::config::AppConfig;
    use crate::database::schema::CURRENT_SCHEMA;
    use crate::db::{create_category, create_process, create_user};
    use crate::error::AppError;
    use crate::models::Role;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        categories: Vec<String>,
        processes: Vec<TestProcess>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestProcess {
        pub category_name: String,
        pub title: String,
        pub content: Option<String>,
        pub author_username: Option<String>,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Admin,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn technician(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Technician,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn category(mut self, name: &str) -> Self {
            self.categories.push(name.to_string());
            self
        }

        pub fn process(
            mut self,
            category_name: &str,
            title: &str,
            content: Option<&str>,
            author_username: Option<&str>,
        ) -> Self {
            self.processes.push(TestProcess {
                category_name: category_name.to_string(),
                title: title.to_string(),
                content: content.map(String::from),
                author_username: author_username.map(String::from),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder()
                    .filter_level(LevelFilter::Debug)
                    .is_test(true)
                    .try_init();
            });

            // A single connection keeps every query on the same in-memory
            // database; a second pooled connection would see an empty one.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            sqlx::raw_sql(CURRENT_SCHEMA).execute(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut category_id_map: HashMap<String, i64> = HashMap::new();
            let mut process_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id =
                    create_user(&pool, &user.username, &user.password, user.role.as_str()).await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            for name in &self.categories {
                let category_id = create_category(&pool, name).await?;
                category_id_map.insert(name.clone(), category_id);
            }

            for process in &self.processes {
                let category_id = category_id_map
                    .get(&process.category_name)
                    .copied()
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "Test category '{}' was never declared",
                            process.category_name
                        ))
                    })?;

                let author_id = process
                    .author_username
                    .as_ref()
                    .and_then(|name| user_id_map.get(name).copied());

                let process_id = create_process(
                    &pool,
                    category_id,
                    &process.title,
                    process.content.as_deref(),
                    None,
                    author_id,
                )
                .await?;
                process_id_map.insert(process.title.clone(), process_id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                category_id_map,
                process_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub category_id_map: HashMap<String, i64>,
        pub process_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn category_id(&self, name: &str) -> Option<i64> {
            self.category_id_map.get(name).copied()
        }

        pub fn process_id(&self, title: &str) -> Option<i64> {
            self.process_id_map.get(title).copied()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .admin("admin")
            .technician("tech_user")
            .category("Networking")
            .category("Printing")
            .process(
                "Networking",
                "VPN Setup",
                Some("<p>Open the client and connect to the corporate tunnel</p>"),
                Some("tech_user"),
            )
            .process(
                "Printing",
                "Printer Reset",
                Some("<p>Hold the reset button for ten seconds</p>"),
                Some("tech_user"),
            )
            .build()
            .await
            .expect("Failed to build test database")
    }

    /// Config rooted in a temp directory; the `TempDir` must outlive the
    /// client, so it rides along in the harness.
    pub fn test_config() -> (AppConfig, TempDir) {
        let root = TempDir::new().expect("Failed to create temp directory");
        let config = AppConfig {
            database_url: "sqlite::memory:".to_string(),
            data_dir: root.path().join("data"),
            uploads_dir: root.path().join("uploads"),
            pdms_root: root.path().join("pdms"),
        };
        config.ensure_directories();
        (config, root)
    }

    pub struct TestHarness {
        pub db: TestDb,
        pub config: AppConfig,
        _root: TempDir,
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestHarness) {
        let (config, root) = test_config();
        let rocket = crate::init_rocket(test_db.pool.clone(), config.clone()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("Valid rocket instance");

        (
            client,
            TestHarness {
                db: test_db,
                config,
                _root: root,
            },
        )
    }
}
