mod integration_tests {
    use crate::schemas::{CheckInResponse, HealthResponse, StatusResponse};
    use crate::test_utils::{register, setup_test_app, signed_init_data};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "healthy");
        assert_eq!(body.database, "connected");
    }

    #[tokio::test]
    async fn test_status_follows_active_day() {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api/status").await;
        response.assert_status(StatusCode::OK);
        response.assert_json(&json!({"active": false}));

        state.engine.open_day(2, "beta").await.unwrap();
        let body: StatusResponse = server.get("/api/status").await.json();
        assert!(body.active);
        assert_eq!(body.day, Some(2));

        state.engine.close_active_day().await.unwrap();
        let body: StatusResponse = server.get("/api/status").await.json();
        assert!(!body.active);
        assert_eq!(body.day, None);
    }

    #[tokio::test]
    async fn test_check_in_marks_then_reports_already_marked() {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        register(&state.engine, 1001, "Ivanov", "Ivan").await;
        state.engine.open_day(1, "alpha").await.unwrap();

        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "  ALPHA ", "initData": signed_init_data(1001)}))
            .await;
        response.assert_status(StatusCode::OK);
        let body: CheckInResponse = response.json();
        assert!(body.success);
        assert_eq!(body.already_marked, None);
        assert_eq!(body.day, Some(1));
        assert_eq!(body.total_days, Some(1));

        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "alpha", "initData": signed_init_data(1001)}))
            .await;
        response.assert_status(StatusCode::OK);
        let body: CheckInResponse = response.json();
        assert!(body.success);
        assert_eq!(body.already_marked, Some(true));
        assert_eq!(body.total_days, Some(1));

        let attended = state.engine.store().list_attended_days(1001).await.unwrap();
        assert_eq!(attended, vec![1]);
    }

    #[tokio::test]
    async fn test_check_in_accepts_identity_assertion_alias() {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        register(&state.engine, 7, "Petrov", "Petr").await;
        state.engine.open_day(3, "gamma").await.unwrap();

        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "gamma", "identityAssertion": signed_init_data(7)}))
            .await;

        response.assert_status(StatusCode::OK);
        let body: CheckInResponse = response.json();
        assert_eq!(body.day, Some(3));
    }

    #[tokio::test]
    async fn test_check_in_rejects_bad_requests() {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        register(&state.engine, 1001, "Ivanov", "Ivan").await;
        state.engine.open_day(1, "alpha").await.unwrap();

        // Missing code
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "   ", "initData": signed_init_data(1001)}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(!response.json::<CheckInResponse>().success);

        // Not JSON at all
        let response = server
            .post("/api/check-in")
            .content_type("application/json")
            .text("{not json")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Tampered assertion
        let forged = signed_init_data(1001).replace("1700000000", "1700000999");
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "alpha", "initData": forged}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        // No assertion
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "alpha"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let attended = state.engine.store().list_attended_days(1001).await.unwrap();
        assert!(attended.is_empty());
    }

    #[tokio::test]
    async fn test_check_in_business_rejections() {
        let (app, state) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();
        register(&state.engine, 1001, "Ivanov", "Ivan").await;

        // No active day
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "alpha", "initData": signed_init_data(1001)}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(response.json::<CheckInResponse>().error.is_some());

        state.engine.open_day(1, "alpha").await.unwrap();

        // Unregistered user with a valid assertion
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "alpha", "initData": signed_init_data(555)}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        // Wrong code
        let response = server
            .post("/api/check-in")
            .json(&json!({"code": "beta", "initData": signed_init_data(1001)}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<CheckInResponse>().error.as_deref(),
            Some("Неверный код")
        );

        assert!(state.engine.store().list_attended_days(1001).await.unwrap().is_empty());
        assert!(state.engine.store().get_user(555).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_swagger_document_is_served() {
        let (app, _) = setup_test_app().await;
        let server = TestServer::new(app).unwrap();

        let response = server.get("/api-docs/openapi.json").await;

        response.assert_status(StatusCode::OK);
        let document: serde_json::Value = response.json();
        assert!(document["paths"]["/api/check-in"]["post"].is_object());
        assert!(document["paths"]["/api/status"]["get"].is_object());
    }
}
