//! API routes

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use mailcast_common::config::ApiConfig;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers::{campaigns, health, settings, smtp};
use crate::state::AppState;

/// Create the API router
pub fn create_router(state: Arc<AppState>, api: &ApiConfig) -> Router {
    // Campaign routes
    let campaign_routes = Router::new()
        .route("/", post(campaigns::create_campaign))
        .route("/:id", delete(campaigns::delete_campaign))
        .route("/:id/start", post(campaigns::start_campaign))
        .route("/:id/pause", post(campaigns::pause_campaign))
        .route("/:id/retry", post(campaigns::retry_campaign))
        .route("/:id/errors", get(campaigns::campaign_errors));

    let api_routes = Router::new()
        .route(
            "/settings",
            get(settings::get_settings).post(settings::save_settings),
        )
        .route("/verify-smtp", post(smtp::verify_smtp))
        .route("/send-email", post(smtp::send_email))
        .nest("/campaigns", campaign_routes);

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&api.cors_origins)),
        )
        .with_state(state)
}

/// Any origin unless an allow-list is configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::ErrorResponse;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use mailcast_core::transport::testing::ScriptedTransport;
    use mailcast_core::{CampaignController, CampaignStore, SettingsStore};
    use mailcast_storage::models::{
        Campaign, CampaignStatus, ContactList, EmailContact, RecipientError, SettingsBundle,
        SmtpSettings, Template,
    };
    use mailcast_storage::repository::MemorySettingsRepository;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn contact(n: usize) -> EmailContact {
        EmailContact {
            id: n.to_string(),
            name: format!("Person {}", n),
            email: format!("p{}@example.com", n),
        }
    }

    fn bundle() -> SettingsBundle {
        SettingsBundle {
            templates: vec![Template {
                id: "t1".to_string(),
                name: "Greeting".to_string(),
                content: "Hi {{name}}".to_string(),
            }],
            contact_lists: vec![ContactList {
                id: "l1".to_string(),
                name: "Customers".to_string(),
                contacts: (1..=3).map(contact).collect(),
            }],
            campaigns: Vec::new(),
            smtp_config: SmtpSettings {
                host: "smtp.example.com".to_string(),
                username: "user".to_string(),
                password: "secret".to_string(),
                from_email: "no-reply@example.com".to_string(),
                from_name: "System".to_string(),
                ..Default::default()
            },
        }
    }

    async fn server_with(
        bundle: SettingsBundle,
        transport: ScriptedTransport,
    ) -> (TestServer, Arc<CampaignController>) {
        let repo = Arc::new(MemorySettingsRepository::with_bundle(bundle));
        let store = Arc::new(SettingsStore::load(repo).await.unwrap());
        let controller = Arc::new(CampaignController::new(store, Arc::new(transport)));
        let state = Arc::new(AppState::new(controller.clone(), None));
        let server = TestServer::new(create_router(state, &ApiConfig::default())).unwrap();
        (server, controller)
    }

    async fn create(server: &TestServer) -> String {
        let response = server
            .post("/api/campaigns")
            .json(&json!({
                "name": "Launch",
                "subject": "Hello",
                "templateId": "t1",
                "contactListIds": ["l1"]
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        body["campaign"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_without_database() {
        let (server, _) = server_with(bundle(), ScriptedTransport::new()).await;

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["checks"]["database"]["status"], "disabled");
    }

    #[tokio::test]
    async fn test_get_settings_uses_wire_names() {
        let (server, _) = server_with(bundle(), ScriptedTransport::new()).await;

        let body: Value = server.get("/api/settings").await.json();

        assert_eq!(body["smtpConfig"]["fromEmail"], "no-reply@example.com");
        assert_eq!(body["smtpConfig"]["useSSL"], false);
        assert_eq!(body["contactLists"][0]["contacts"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_settings_delta_and_replace() {
        let (server, controller) = server_with(bundle(), ScriptedTransport::new()).await;

        let response = server
            .post("/api/settings")
            .json(&json!({
                "type": "ADD_TEMPLATE",
                "data": {"id": "t2", "name": "Promo", "content": "<p>{{name}}</p>"},
                "smtpConfig": {"host": "mail.example.com", "port": 465}
            }))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({"success": true}));

        let snapshot = controller.store().snapshot().await;
        assert_eq!(snapshot.templates.len(), 2);
        assert_eq!(snapshot.smtp_config.host, "mail.example.com");
        assert!(snapshot.smtp_config.use_ssl);

        let mut replaced = bundle();
        replaced.templates.clear();
        server
            .post("/api/settings")
            .json(&replaced)
            .await
            .assert_status_ok();
        assert!(controller.store().snapshot().await.templates.is_empty());
    }

    #[tokio::test]
    async fn test_settings_validation_error() {
        let (server, _) = server_with(bundle(), ScriptedTransport::new()).await;

        let response = server
            .post("/api/settings")
            .json(&json!({
                "type": "ADD_CONTACT_LIST",
                "data": {"id": "l2", "name": "", "contacts": []}
            }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_campaign_run_over_http() {
        let transport = ScriptedTransport::new().fail_for("p2@example.com", "mailbox full");
        let (server, _) = server_with(bundle(), transport).await;
        let id = create(&server).await;

        let response = server.post(&format!("/api/campaigns/{}/start", id)).await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "completed-with-errors");
        assert_eq!(body["sent"], 2);
        assert_eq!(body["notice"]["level"], "warning");

        let errors: Vec<RecipientError> = server
            .get(&format!("/api/campaigns/{}/errors", id))
            .await
            .json();
        assert_eq!(
            errors,
            vec![RecipientError {
                email: "p2@example.com".to_string(),
                error: "mailbox full".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_start_precondition_error() {
        let mut b = bundle();
        b.smtp_config.host = String::new();
        let (server, _) = server_with(b, ScriptedTransport::new()).await;
        let id = create(&server).await;

        let response = server.post(&format!("/api/campaigns/{}/start", id)).await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorResponse = response.json();
        assert_eq!(body.error, "SMTP_NOT_CONFIGURED");
        assert_eq!(body.message, "Please configure SMTP settings first");
    }

    #[tokio::test]
    async fn test_delete_and_pause_guards() {
        let (server, controller) = server_with(bundle(), ScriptedTransport::new()).await;
        controller
            .store()
            .insert(Campaign {
                id: "c1".to_string(),
                name: "Launch".to_string(),
                subject: "Hello".to_string(),
                template_id: Some("t1".to_string()),
                template_name: None,
                contact_list_ids: vec!["l1".to_string()],
                status: CampaignStatus::Sending,
                sent_count: 1,
                total_count: 3,
                create_date: "2024-01-01T00:00:00.000Z".to_string(),
                error: None,
            })
            .await
            .unwrap();

        let response = server.delete("/api/campaigns/c1").await;
        response.assert_status(StatusCode::CONFLICT);
        let body: ErrorResponse = response.json();
        assert_eq!(body.message, "Cannot delete a campaign while it is sending");

        server
            .post("/api/campaigns/c1/pause")
            .await
            .assert_status_ok();
        let response = server.post("/api/campaigns/c1/pause").await;
        response.assert_status(StatusCode::CONFLICT);

        server.delete("/api/campaigns/c1").await.assert_status_ok();
        server
            .delete("/api/campaigns/c1")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_verify_smtp_contract() {
        let (server, _) = server_with(bundle(), ScriptedTransport::new()).await;
        let response = server
            .post("/api/verify-smtp")
            .json(&json!({"host": "smtp.example.com", "port": 587}))
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>(), json!({"success": true}));

        let (server, _) = server_with(
            bundle(),
            ScriptedTransport::new().fail_verify("authentication failed"),
        )
        .await;
        let response = server
            .post("/api/verify-smtp")
            .json(&json!({"host": "smtp.example.com", "port": 587}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>(),
            json!({"success": false, "error": "Failed to connect: authentication failed"})
        );
    }

    #[tokio::test]
    async fn test_send_email_contract() {
        let transport = ScriptedTransport::new().fail_for("bad@example.com", "rejected");
        let (server, _) = server_with(bundle(), transport).await;
        let smtp = json!({"host": "smtp.example.com", "port": 587});

        let response = server
            .post("/api/send-email")
            .json(&json!({
                "contact": {"id": "1", "name": "Ann", "email": "ann@example.com"},
                "subject": "Hi",
                "content": "<p>Hi Ann</p>",
                "smtpConfig": smtp
            }))
            .await;
        response.assert_status_ok();

        let response = server
            .post("/api/send-email")
            .json(&json!({
                "contact": {"id": "2", "name": "Bad", "email": "bad@example.com"},
                "subject": "Hi",
                "content": "<p>Hi</p>",
                "smtpConfig": smtp
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>(),
            json!({"success": false, "error": "rejected"})
        );
    }
}
