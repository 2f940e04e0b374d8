use actix_web::middleware::{NormalizePath, TrailingSlash};
use actix_web::{middleware, web, web::Data, App, HttpResponse, HttpServer};
use anyhow::Error;
use log::info;
use serde_json::json;
use std::sync::Arc;

use crate::utils::loop_heartbeats::LoopHeartbeats;

pub struct AppState {
    pub heartbeats: Arc<LoopHeartbeats>,
}

async fn health(data: Data<AppState>) -> HttpResponse {
    let health_status = data.heartbeats.health_status();
    if health_status.healthy {
        HttpResponse::Ok().json(health_status)
    } else {
        HttpResponse::InternalServerError().json(health_status)
    }
}

pub(crate) fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)));
}

pub async fn start_server(host: &str, port: u16, heartbeats: Arc<LoopHeartbeats>) -> Result<(), Error> {
    info!("Starting health server at http://{host}:{port}");
    let app_state = Data::new(AppState { heartbeats });

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .configure(configure)
            .default_service(web::route().to(|| async {
                HttpResponse::NotFound().json(json!({
                    "success": false,
                    "error": "Resource not found"
                }))
            }))
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
