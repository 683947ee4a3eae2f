use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod fill;
pub mod generate;
pub mod output;
pub mod perception;
pub mod state;
pub mod table;
pub mod template;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

/// Largest accepted JSON body (fields, mappings and inline rows).
const JSON_LIMIT: usize = 1024 * 1024;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }

    pub fn internal_error(message: &str) -> Self {
        Self::new("InternalServerError", message)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::generate::handlers::generate,
        crate::generate::handlers::list_outputs,
        crate::generate::handlers::clear_outputs,
        crate::generate::handlers::form_pdf,
        crate::generate::handlers::table_preview,
        crate::generate::handlers::table_headers
    ),
    components(
        schemas(
            generate::models::GenerateRequest,
            generate::models::GenerateResponse,
            generate::models::FailedRow,
            generate::models::OutputListResponse,
            generate::models::ClearOutputResponse,
            generate::models::HeadersResponse,
            table::Table,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Generate", description = "Template filling and output endpoints.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

/// JSON extractor config shared by the server and tests.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            let message = err.to_string();
            actix_web::error::InternalError::from_response(
                err,
                HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message)),
            )
            .into()
        })
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let bind = (config.bind_addr.clone(), config.port);
    log::info!(
        "Template: {}, output: {}, table: {}",
        config.form_path.display(),
        config.output_dir.display(),
        config.table_path.display()
    );
    if !config.ocr_enabled {
        log::info!("OCR fallback disabled, only the text layer is consulted");
    }

    let app_state = web::Data::new(AppState::new(config));

    let prometheus = PrometheusMetricsBuilder::new("fillmeup_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .app_data(json_config())
            .route(
                "/",
                web::get().to(|| async { HttpResponse::Ok().body("fillmeup server is running") }),
            )
            .service(web::scope("/api").configure(generate::handlers::config))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .bind(bind)
    .context("failed to bind server address")?
    .run()
    .await
    .context("server stopped with an error")
}
