use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use futures::{StreamExt, TryStreamExt};
use lead_enricher_lib::{enrichment, logger, roles};
use log::{error, info};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const UPLOAD_DIR: &str = "uploads";
const RESULT_DIR: &str = "results";
const BIND_ADDR: (&str, u16) = ("0.0.0.0", 8000);

#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

#[get("/roles")]
async fn get_roles() -> impl Responder {
    HttpResponse::Ok().json(json!({ "roles": roles::SUPPORTED_ROLES }))
}

/// Multipart upload: a `file` part with the table and a `rollen` text part
/// with comma-separated role tags. The enrichment run is synchronous and can
/// take a long time (it may wait on a human login); it is pushed onto the
/// blocking pool so the worker stays responsive.
#[post("/upload")]
async fn upload_file(mut payload: Multipart) -> impl Responder {
    let uid = Uuid::new_v4().simple().to_string();
    let uid = &uid[..8];

    let mut saved_path: Option<PathBuf> = None;
    let mut role_tags: Vec<String> = Vec::new();

    while let Ok(Some(mut field)) = payload.try_next().await {
        let disposition = field.content_disposition();
        let field_name = disposition.get_name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let original = disposition
                    .get_filename()
                    .unwrap_or("upload.csv")
                    .to_string();
                let path = PathBuf::from(UPLOAD_DIR).join(format!("{}_{}", uid, original));
                let mut file = match std::fs::File::create(&path) {
                    Ok(f) => f,
                    Err(e) => {
                        error!("Could not create upload file {:?}: {}", path, e);
                        return HttpResponse::InternalServerError()
                            .json(json!({ "error": "could not store the upload" }));
                    }
                };
                while let Some(chunk) = field.next().await {
                    let data = match chunk {
                        Ok(data) => data,
                        Err(e) => {
                            error!("Upload stream broke: {}", e);
                            return HttpResponse::InternalServerError()
                                .json(json!({ "error": "upload stream broke" }));
                        }
                    };
                    if let Err(e) = file.write_all(&data) {
                        error!("Could not write upload file {:?}: {}", path, e);
                        return HttpResponse::InternalServerError()
                            .json(json!({ "error": "could not store the upload" }));
                    }
                }
                saved_path = Some(path);
            }
            "rollen" => {
                let mut raw = Vec::new();
                while let Some(Ok(data)) = field.next().await {
                    raw.extend_from_slice(&data);
                }
                role_tags = String::from_utf8_lossy(&raw)
                    .split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect();
            }
            _ => {}
        }
    }

    let input = match saved_path {
        Some(path) => path,
        None => {
            return HttpResponse::BadRequest().json(json!({ "error": "missing 'file' field" }))
        }
    };

    info!("Starting enrichment for {:?} with roles {:?}", input, role_tags);
    let run = web::block(move || {
        enrichment::run_enrichment(&input, &role_tags, Path::new(RESULT_DIR))
    })
    .await;

    match run {
        Ok(Ok(output)) => {
            let result_file = output
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("result.csv")
                .to_string();
            HttpResponse::Ok().json(json!({ "result_file": result_file }))
        }
        Ok(Err(e)) => {
            error!("Enrichment failed: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "error": format!("enrichment failed: {}", e) }))
        }
        Err(e) => {
            error!("Enrichment task was cancelled: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "error": "enrichment task was cancelled" }))
        }
    }
}

#[get("/result/{filename}")]
async fn download_result(path: web::Path<String>) -> impl Responder {
    let filename = path.into_inner();
    let file_path = PathBuf::from(RESULT_DIR).join(&filename);

    match std::fs::read_to_string(&file_path) {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/csv")
            .append_header((
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", filename),
            ))
            .body(content),
        Err(_) => HttpResponse::NotFound().json(json!({ "error": "result file not found" })),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logger::init();

    for dir in [UPLOAD_DIR, RESULT_DIR, enrichment::PROFILE_DIR] {
        std::fs::create_dir_all(dir)?;
    }

    info!(
        "Starting web server at http://{}:{}",
        BIND_ADDR.0, BIND_ADDR.1
    );

    HttpServer::new(|| {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .service(health_check)
            .service(get_roles)
            .service(upload_file)
            .service(download_result)
    })
    .bind(BIND_ADDR)?
    .run()
    .await
}
