use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use log::{error, info, warn};

use crate::generate::models::{
    ClearOutputResponse, GenerateRequest, GenerateResponse, HeadersResponse, OutputListResponse,
};
use crate::table::{Table, PREVIEW_ROWS};
use crate::{AppState, ErrorResponse};

/// Rows from the request body when given, otherwise the configured table.
async fn request_table(state: &AppState, request: &GenerateRequest) -> Result<Table, HttpResponse> {
    match &request.rows {
        Some(rows) => {
            let headers = match &request.headers {
                Some(headers) => headers.clone(),
                None => state
                    .load_table()
                    .await
                    .map_err(|e| {
                        HttpResponse::BadRequest().json(ErrorResponse::bad_request(&format!(
                            "rows were given without headers and the default table is unavailable: {}",
                            e
                        )))
                    })?
                    .headers,
            };
            let headers: Vec<serde_json::Value> =
                headers.into_iter().map(serde_json::Value::String).collect();
            Table::from_json_values(&headers, rows)
                .map_err(|e| HttpResponse::BadRequest().json(ErrorResponse::bad_request(&e.to_string())))
        }
        None => state.load_table().await.map_err(|e| {
            error!("Failed to load table: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    post,
    path = "/generate",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "One PDF per sanitized row", body = GenerateResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Template or output directory unavailable", body = ErrorResponse)
    )
)]
pub async fn generate(
    state: web::Data<AppState>,
    body: web::Json<GenerateRequest>,
) -> impl Responder {
    let request = body.into_inner();
    info!(
        "Executing generate handler: {} field(s), {} mapping(s)",
        request.fields.len(),
        request.mappings.len()
    );

    let _batch = state.batch_lock.lock().await;

    let template = match state.template_bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(
                "Failed to read template {}: {}",
                state.config.form_path.display(),
                e
            );
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::internal_error("Template PDF is not available"));
        }
    };

    let table = match request_table(&state, &request).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let generator = state.generator(template);
    match generator
        .generate(&request.fields, &request.mappings, &table.rows, &table.headers)
        .await
    {
        Ok(report) => {
            if !report.failed.is_empty() {
                warn!("{} row(s) failed during generation", report.failed.len());
            }
            HttpResponse::Ok().json(GenerateResponse::from(&report))
        }
        Err(e) => {
            error!("Generation failed: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    get,
    path = "/output/list",
    responses(
        (status = 200, description = "Generated PDF names", body = OutputListResponse)
    )
)]
pub async fn list_outputs(state: web::Data<AppState>) -> impl Responder {
    match state.output_dir().list_pdfs().await {
        Ok(files) => HttpResponse::Ok().json(OutputListResponse { files }),
        Err(e) => {
            error!("Failed to list outputs: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    delete,
    path = "/output",
    responses(
        (status = 200, description = "Output directory emptied", body = ClearOutputResponse)
    )
)]
pub async fn clear_outputs(state: web::Data<AppState>) -> impl Responder {
    let _batch = state.batch_lock.lock().await;
    match state.output_dir().clear().await {
        Ok(removed) => HttpResponse::Ok().json(ClearOutputResponse {
            success: true,
            removed,
        }),
        Err(e) => {
            error!("Failed to clear outputs: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    get,
    path = "/form/pdf",
    responses(
        (status = 200, description = "The template PDF"),
        (status = 404, description = "Template not found", body = ErrorResponse)
    )
)]
pub async fn form_pdf(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match NamedFile::open_async(&state.config.form_path).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            warn!(
                "Template {} not served: {}",
                state.config.form_path.display(),
                e
            );
            HttpResponse::NotFound().json(ErrorResponse::not_found("Template PDF not found"))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    get,
    path = "/table/preview",
    responses(
        (status = 200, description = "Headers and the first rows of the table", body = Table),
        (status = 500, description = "Table unavailable", body = ErrorResponse)
    )
)]
pub async fn table_preview(state: web::Data<AppState>) -> impl Responder {
    match state.load_table().await {
        Ok(table) => HttpResponse::Ok().json(table.preview(PREVIEW_ROWS)),
        Err(e) => {
            error!("Failed to load table: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Generate",
    get,
    path = "/table/headers",
    responses(
        (status = 200, description = "Table headers", body = HeadersResponse),
        (status = 500, description = "Table unavailable", body = ErrorResponse)
    )
)]
pub async fn table_headers(state: web::Data<AppState>) -> impl Responder {
    match state.load_table().await {
        Ok(table) => HttpResponse::Ok().json(HeadersResponse {
            headers: table.headers,
        }),
        Err(e) => {
            error!("Failed to load table: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::internal_error(&e.to_string()))
        }
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/generate").route(web::post().to(generate)))
        .service(web::resource("/output/list").route(web::get().to(list_outputs)))
        .service(web::resource("/output").route(web::delete().to(clear_outputs)))
        .service(web::resource("/form/pdf").route(web::get().to(form_pdf)))
        .service(web::resource("/table/preview").route(web::get().to(table_preview)))
        .service(web::resource("/table/headers").route(web::get().to(table_headers)));
}
