#[cfg(test)]
mod tests {
    use crate::test::test_utils::{create_standard_test_db, setup_test_client};
    use rocket::http::{ContentType, Status};
    use serde_json::{Value, json};
    use sqlx::SqlitePool;

    #[rocket::async_test]
    async fn test_install_check_reports_prerequisites() {
        let test_db = create_standard_test_db().await;
        let (client, _harness) = setup_test_client(test_db).await;

        let response = client.get("/api/install/check").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let status: Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(status["success"], true);
        assert_eq!(status["installed"], false);

        let checks = status["checks"].as_array().unwrap();
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|c| c["ok"] == true));
    }

    #[rocket::async_test]
    async fn test_install_test_db() {
        let test_db = create_standard_test_db().await;
        let (client, harness) = setup_test_client(test_db).await;

        let url = format!(
            "sqlite://{}",
            harness.config.data_dir.join("probe.db").display()
        );
        let response = client
            .post("/api/install/test-db")
            .header(ContentType::JSON)
            .body(json!({ "database_url": url }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .post("/api/install/test-db")
            .header(ContentType::JSON)
            .body(json!({ "database_url": "not a database url" }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn test_install_run_provisions_and_locks() {
        let test_db = create_standard_test_db().await;
        let (client, harness) = setup_test_client(test_db).await;

        let db_path = harness.config.data_dir.join("installed.db");
        let url = format!("sqlite://{}", db_path.display());

        let response = client
            .post("/api/install/run")
            .header(ContentType::JSON)
            .body(json!({ "database_url": url }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        assert!(harness.config.lock_file().exists());
        let credentials =
            std::fs::read_to_string(harness.config.credentials_file()).unwrap();
        assert!(credentials.contains("DATABASE_URL=sqlite://"));

        // The fresh database carries the schema and the default admin.
        let pool = SqlitePool::connect(&url).await.unwrap();
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = 'admin'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
        pool.close().await;

        let response = client.get("/api/install/check").dispatch().await;
        let status: Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(status["installed"], true);

        // The lock file gates any further run.
        let response = client
            .post("/api/install/run")
            .header(ContentType::JSON)
            .body(json!({ "database_url": url }).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Conflict);
    }
}
