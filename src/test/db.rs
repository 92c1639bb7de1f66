#[cfg(test)]
mod tests {
    use crate::db::{
        authenticate_user, create_category, create_user, delete_category, delete_user,
        find_user_id, get_categories_with_processes, get_process, get_process_history,
        insert_history, list_categories, search_processes, update_process_content,
        update_process_title, update_username, upsert_client,
    };
    use crate::error::AppError;
    use crate::models::Role;
    use crate::test::test_utils::{STANDARD_PASSWORD, TestDbBuilder, create_standard_test_db};

    use rocket::tokio;

    #[tokio::test]
    async fn authenticate_accepts_correct_password_only() {
        let test_db = create_standard_test_db().await;

        let user = authenticate_user(&test_db.pool, "tech_user", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert_eq!(user.expect("User should authenticate").role, Role::Technician);

        let rejected = authenticate_user(&test_db.pool, "tech_user", "wrong_password")
            .await
            .expect("Authentication query failed");
        assert!(rejected.is_none());

        let unknown = authenticate_user(&test_db.pool, "nobody", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let test_db = create_standard_test_db().await;

        let result = create_user(&test_db.pool, "tech_user", "whatever", "technician").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn renaming_to_a_taken_username_is_a_conflict() {
        let test_db = create_standard_test_db().await;
        let tech_id = test_db.user_id("tech_user").unwrap();

        let result = update_username(&test_db.pool, tech_id, "admin").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Keeping the same name is allowed.
        update_username(&test_db.pool, tech_id, "tech_user")
            .await
            .expect("No-op rename should succeed");
    }

    #[tokio::test]
    async fn deleting_an_unknown_user_is_not_found() {
        let test_db = create_standard_test_db().await;

        let result = delete_user(&test_db.pool, 9999).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn find_user_id_tolerates_unknown_names() {
        let test_db = create_standard_test_db().await;

        let found = find_user_id(&test_db.pool, "tech_user")
            .await
            .expect("Lookup failed");
        assert_eq!(found, test_db.user_id("tech_user"));

        let missing = find_user_id(&test_db.pool, "ghost")
            .await
            .expect("Lookup failed");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn duplicate_category_is_a_conflict() {
        let test_db = create_standard_test_db().await;
        let before = list_categories(&test_db.pool)
            .await
            .expect("Listing failed")
            .len();

        let result = create_category(&test_db.pool, "Networking").await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let after = list_categories(&test_db.pool)
            .await
            .expect("Listing failed")
            .len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn categories_listing_nests_processes_and_keeps_empty_categories() {
        let test_db = TestDbBuilder::new()
            .technician("tech_user")
            .category("Networking")
            .category("Empty Shelf")
            .process("Networking", "VPN Setup", Some("tunnel notes"), None)
            .process("Networking", "DNS Flush", None, None)
            .build()
            .await
            .expect("Failed to build test database");

        let categories = get_categories_with_processes(&test_db.pool)
            .await
            .expect("Listing failed");

        assert_eq!(categories.len(), 2);

        let empty = categories
            .iter()
            .find(|c| c.name == "Empty Shelf")
            .expect("Empty category missing from listing");
        assert!(empty.processes.is_empty());

        let networking = categories
            .iter()
            .find(|c| c.name == "Networking")
            .expect("Networking category missing from listing");
        let titles: Vec<&str> = networking.processes.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["DNS Flush", "VPN Setup"]);
    }

    #[tokio::test]
    async fn deleting_a_category_orphans_its_processes() {
        let test_db = create_standard_test_db().await;
        let category_id = test_db.category_id("Networking").unwrap();
        let process_id = test_db.process_id("VPN Setup").unwrap();

        delete_category(&test_db.pool, category_id)
            .await
            .expect("Delete failed");

        let process = get_process(&test_db.pool, process_id)
            .await
            .expect("Orphaned process should survive its category");
        assert!(process.category_id.is_none());
        assert_eq!(process.title, "VPN Setup");
    }

    #[tokio::test]
    async fn updating_an_unknown_process_is_not_found() {
        let test_db = create_standard_test_db().await;

        let result = update_process_content(&test_db.pool, 9999, "new content").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let result = update_process_title(&test_db.pool, 9999, "renamed").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn history_is_returned_most_recent_first() {
        let test_db = create_standard_test_db().await;
        let process_id = test_db.process_id("VPN Setup").unwrap();
        let admin_id = test_db.user_id("admin").unwrap();
        let tech_id = test_db.user_id("tech_user").unwrap();

        insert_history(&test_db.pool, process_id, admin_id)
            .await
            .expect("Insert failed");
        insert_history(&test_db.pool, process_id, tech_id)
            .await
            .expect("Insert failed");

        let history = get_process_history(&test_db.pool, process_id)
            .await
            .expect("History query failed");

        assert_eq!(history.len(), 2);
        // Same timestamp resolution ties break on id, newest insert first.
        assert_eq!(history[0].username, "tech_user");
        assert_eq!(history[1].username, "admin");
    }

    #[tokio::test]
    async fn search_matches_title_and_content_case_insensitively() {
        let test_db = create_standard_test_db().await;

        let by_title = search_processes(&test_db.pool, "vpn")
            .await
            .expect("Search failed");
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].title, "VPN Setup");

        let by_content = search_processes(&test_db.pool, "RESET BUTTON")
            .await
            .expect("Search failed");
        assert_eq!(by_content.len(), 1);
        assert_eq!(by_content[0].title, "Printer Reset");

        let nothing = search_processes(&test_db.pool, "zzzz")
            .await
            .expect("Search failed");
        assert!(nothing.is_empty());
    }

    #[tokio::test]
    async fn search_is_capped_at_ten_results() {
        let mut builder = TestDbBuilder::new().category("Networking");
        for i in 0..12 {
            let title = format!("Router Guide {}", i);
            builder = builder.process("Networking", &title, Some("router manual"), None);
        }
        let test_db = builder.build().await.expect("Failed to build test database");

        let results = search_processes(&test_db.pool, "router")
            .await
            .expect("Search failed");
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn client_upsert_overwrites_in_place() {
        let test_db = create_standard_test_db().await;

        upsert_client(&test_db.pool, "Acme", "old@acme.fr", "old", "/pdms/Acme")
            .await
            .expect("Upsert failed");
        upsert_client(&test_db.pool, "Acme", "new@acme.fr", "new", "/pdms/Acme")
            .await
            .expect("Upsert failed");

        let clients = crate::db::list_clients(&test_db.pool)
            .await
            .expect("Listing failed");
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].email, "new@acme.fr");
        assert_eq!(clients[0].password, "new");
    }
}
