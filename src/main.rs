use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod repo;
mod routes;
mod service;
mod utils;

use config::Config;
use db::init_db;

use crate::docs::ApiDoc;
use crate::repo::attendance_repo::MySqlAttendanceStore;
use crate::repo::leave_repo::MySqlLeaveStore;
use crate::repo::user_repo::UserRepo;
use crate::service::attendance::AttendanceEngine;
use crate::service::leave::LeaveWorkflow;
use tracing::{info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "presence is up"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(config.log_level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .init();

    info!(addr = %config.server_addr, production = config.production, "Server starting...");
    if cfg!(feature = "debug-reset") {
        warn!("Built with debug-reset; POST /attendance/debug/reset-today is mounted");
    }

    let pool = init_db(&config).await?;

    let attendance = Data::new(AttendanceEngine::new(
        Arc::new(MySqlAttendanceStore::new(pool.clone())),
        config.office.clone(),
        config.attendance_timeout,
        config.production,
    ));
    let leave = Data::new(LeaveWorkflow::new(
        Arc::new(MySqlLeaveStore::new(pool.clone())),
        config.leave_policy.clone(),
        config.leave_timeout,
    ));
    let users = Data::new(UserRepo::new(pool));

    let server_addr = config.server_addr.clone();
    let config_data = Data::new(config);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(config_data.clone())
            .app_data(attendance.clone())
            .app_data(leave.clone())
            .app_data(users.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.get_ref().clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
