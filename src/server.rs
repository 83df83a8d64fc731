use actix_cors::Cors;
use actix_multipart::Multipart;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use futures::{StreamExt, TryStreamExt};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use job_screener_lib::Settings;

mod supervisor;
use supervisor::Supervisor;

struct AppState {
    supervisor: Arc<Supervisor>,
    settings: Settings,
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

/// Uploads a queries file (CSV or Excel) and starts a screening run over it.
#[post("/api/screen")]
async fn start_screening(mut payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    let mut file_path = PathBuf::from("uploads");
    std::fs::create_dir_all(&file_path).unwrap_or_default();

    let run_id = Uuid::new_v4().to_string();
    let mut extension = "csv".to_string();
    let mut saved = false;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let content_disposition = field.content_disposition();
        if content_disposition.get_name().unwrap_or("") == "file" {
            if let Some(original_name) = content_disposition.get_filename() {
                let lower = original_name.to_lowercase();
                if lower.ends_with(".xlsx") {
                    extension = "xlsx".to_string();
                } else if lower.ends_with(".xls") {
                    extension = "xls".to_string();
                }
            }

            file_path.push(format!("{}.{}", run_id, extension));

            let mut f = match std::fs::File::create(&file_path) {
                Ok(f) => f,
                Err(e) => {
                    return HttpResponse::InternalServerError()
                        .json(format!("Failed to store upload: {}", e));
                }
            };
            while let Some(chunk) = field.next().await {
                match chunk {
                    Ok(bytes) => {
                        if let Err(e) = f.write_all(&bytes) {
                            return HttpResponse::InternalServerError()
                                .json(format!("Failed to store upload: {}", e));
                        }
                    }
                    Err(e) => {
                        return HttpResponse::BadRequest().json(format!("Upload error: {}", e));
                    }
                }
            }
            saved = true;
        }
    }

    let queries_path = if saved { Some(file_path) } else { None };

    let mut output_dir = PathBuf::from(&data.settings.output_dir);
    std::fs::create_dir_all(&output_dir).unwrap_or_default();
    output_dir.push(format!("run_{}", run_id));

    data.supervisor.start_run(
        run_id.clone(),
        data.settings.clone(),
        queries_path,
        output_dir,
    );

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "run_id": run_id,
        "message": "Screening run queued."
    }))
}

#[get("/api/status/{run_id}")]
async fn get_status(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let run_id = path.into_inner();
    match data.supervisor.status_of(&run_id) {
        Some(status) => HttpResponse::Ok().json(status),
        None => HttpResponse::NotFound().json("Run not found"),
    }
}

#[get("/api/download/{run_id}")]
async fn download_results(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let run_id = path.into_inner();
    let mut output_path = PathBuf::from(&data.settings.output_dir);
    output_path.push(format!("run_{}", run_id));
    output_path.push("all_jobs.csv");

    if output_path.exists() {
        match std::fs::read_to_string(&output_path) {
            Ok(content) => HttpResponse::Ok()
                .content_type("text/csv")
                .append_header((
                    "Content-Disposition",
                    format!("attachment; filename=\"jobs_{}.csv\"", run_id),
                ))
                .body(content),
            Err(e) => HttpResponse::InternalServerError().body(format!("Read failed: {}", e)),
        }
    } else {
        HttpResponse::NotFound().body("Result file not generated yet.")
    }
}

#[post("/api/pause/{run_id}")]
async fn pause_run(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let run_id = path.into_inner();
    if data.supervisor.send_control(&run_id, "pause") {
        HttpResponse::Ok().json("Run paused")
    } else {
        HttpResponse::NotFound().json("Run not found")
    }
}

#[post("/api/resume/{run_id}")]
async fn resume_run(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let run_id = path.into_inner();
    if data.supervisor.send_control(&run_id, "resume") {
        HttpResponse::Ok().json("Run resumed")
    } else {
        HttpResponse::NotFound().json("Run not found")
    }
}

#[post("/api/stop/{run_id}")]
async fn stop_run(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let run_id = path.into_inner();
    if data.supervisor.send_control(&run_id, "stop") {
        HttpResponse::Ok().json("Run stopped")
    } else {
        HttpResponse::NotFound().json("Run not found")
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    std::env::set_var("RUST_LOG", "info");
    env_logger::init();

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "screener_config.json".to_string());
    let settings = Settings::load(settings_path);

    let supervisor = Arc::new(Supervisor::new());
    let state = web::Data::new(AppState {
        supervisor,
        settings,
    });

    log::info!("Starting Screening Server at http://0.0.0.0:8080");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .service(health_check)
            .service(start_screening)
            .service(get_status)
            .service(download_results)
            .service(pause_run)
            .service(resume_run)
            .service(stop_run)
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}
