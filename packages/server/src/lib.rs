#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Actix-Web API server for the relief map application.
//!
//! Serves the REST API for incident intake, resource assignment, and
//! identity, plus uploaded incident media and the frontend static files.
//! Incident and principal documents live in a `SQLite` database at
//! `data/relief_map.db`; media files are stored on local disk under
//! `data/media`. Page routes are gated by the role-based route guard
//! middleware; API routes do their own per-handler auth checks.

mod handlers;
mod multipart;
mod route_guard;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use relief_map_storage::{FileStore, INCIDENT_MEDIA_BUCKET, LocalFileStore};
use switchy_database::Database;

/// Shared application state.
pub struct AppState {
    /// Database connection.
    pub db: Arc<dyn Database>,
    /// Store for uploaded incident media.
    pub files: Arc<dyn FileStore>,
}

/// Registers the `/api` routes.
///
/// More specific `/resources/*` routes come before `/resources/{id}` so
/// path matching never swallows them.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/auth/signup", web::post().to(handlers::signup))
            .route("/auth/login", web::post().to(handlers::login))
            .route("/auth/logout", web::post().to(handlers::logout))
            .route("/auth/me", web::get().to(handlers::me))
            .route("/incidents", web::get().to(handlers::incidents))
            .route("/incidents", web::post().to(handlers::create_incident))
            .route(
                "/incidents/{id}/resolve",
                web::post().to(handlers::resolve_incident),
            )
            .route("/resources/assign", web::post().to(handlers::assign))
            .route("/resources/stats", web::get().to(handlers::resource_stats))
            .route("/resources", web::get().to(handlers::resources))
            .route("/resources/{id}", web::get().to(handlers::resource_detail))
            .route("/resources/{id}", web::patch().to(handlers::update_resource))
            .route(
                "/assignments/{id}",
                web::patch().to(handlers::assignment_action),
            ),
    );
}

/// Starts the relief map API server.
///
/// Opens the `SQLite` database (creating the schema on first run), sets up
/// the local media store, and starts the Actix-Web HTTP server. This is a
/// regular async function — the caller is responsible for providing the
/// async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
///
/// # Panics
///
/// Panics if the database cannot be opened or the schema cannot be
/// created.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    log::info!("Opening database...");
    let db = relief_map_database::connect_from_env()
        .await
        .expect("Failed to open database");

    let store = LocalFileStore::from_env();
    let media_dir = store.bucket_dir(INCIDENT_MEDIA_BUCKET);
    std::fs::create_dir_all(&media_dir)?;

    let state = web::Data::new(AppState {
        db: Arc::from(db),
        files: Arc::new(store),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(middleware::from_fn(route_guard::enforce))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure_api)
            // Serve uploaded incident media
            .service(Files::new("/media", media_dir.clone()))
            // Serve frontend static files (production)
            .service(Files::new("/", "app/dist").index_file("index.html"))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::http::header;
    use actix_web::{middleware, test};

    use super::*;

    async fn test_state() -> web::Data<AppState> {
        let db = relief_map_database::open_in_memory().await.unwrap();
        let media_root = std::env::temp_dir().join(format!("relief-map-{}", uuid::Uuid::new_v4()));
        web::Data::new(AppState {
            db: Arc::from(db),
            files: Arc::new(LocalFileStore::new(media_root)),
        })
    }

    #[actix_web::test]
    async fn health_endpoint_reports_healthy() {
        let app = test::init_service(
            App::new().app_data(test_state().await).configure(configure_api),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request())
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["healthy"], true);
    }

    #[actix_web::test]
    async fn signup_sets_session_cookie_and_me_resolves() {
        let app = test::init_service(
            App::new().app_data(test_state().await).configure(configure_api),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/signup")
                .set_json(serde_json::json!({
                    "name": "Ada",
                    "email": "ada@example.com",
                    "password": "hunter22",
                    "role": "volunteer",
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "session")
            .expect("signup sets session cookie")
            .into_owned();

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["role"], "volunteer");
        assert_eq!(body["dashboard"], "/volunteer/dashboard");

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/auth/me")
                .cookie(cookie)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["email"], "ada@example.com");
    }

    #[actix_web::test]
    async fn profile_patch_rejects_out_of_range_rating() {
        let app = test::init_service(
            App::new().app_data(test_state().await).configure(configure_api),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/signup")
                .set_json(serde_json::json!({
                    "name": "Ada",
                    "email": "ada@example.com",
                    "password": "hunter22",
                    "role": "volunteer",
                }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == "session")
            .expect("signup sets session cookie")
            .into_owned();
        let body: serde_json::Value = test::read_body_json(resp).await;
        let id = body["id"].as_str().unwrap().to_string();

        for bad in [serde_json::json!(99), serde_json::json!(-3)] {
            let resp = test::call_service(
                &app,
                test::TestRequest::patch()
                    .uri(&format!("/api/resources/{id}"))
                    .cookie(cookie.clone())
                    .set_json(serde_json::json!({ "rating": bad }))
                    .to_request(),
            )
            .await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }

        // In-range ratings still go through.
        let resp = test::call_service(
            &app,
            test::TestRequest::patch()
                .uri(&format!("/api/resources/{id}"))
                .cookie(cookie)
                .set_json(serde_json::json!({ "rating": 4.5 }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["rating"], 4.5);
    }

    #[actix_web::test]
    async fn incidents_require_a_session() {
        let app = test::init_service(
            App::new().app_data(test_state().await).configure(configure_api),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/api/incidents").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn protected_page_redirects_to_login() {
        let app = test::init_service(
            App::new()
                .wrap(middleware::from_fn(route_guard::enforce))
                .app_data(test_state().await)
                .configure(configure_api),
        )
        .await;

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/admin/dashboard").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::FOUND);

        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok());
        assert_eq!(location, Some("/login?redirectTo=%2Fadmin%2Fdashboard"));
    }
}
