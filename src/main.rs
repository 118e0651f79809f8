use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;

mod api;
mod client;
mod config;
mod db;
mod docs;
mod error;
mod lifecycle;
mod model;
mod routes;
mod store;
mod utils;

use client::{HttpGateway, LifecycleGateway};
use config::Config;
use db::init_db;
use store::{MySqlStore, WfhStore};

use crate::docs::ApiDoc;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "WFH scheduling lifecycle service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    let store: Arc<dyn WfhStore> = Arc::new(MySqlStore::new(pool));
    let gateway: Arc<dyn LifecycleGateway> =
        Arc::new(HttpGateway::new(&config).context("failed to build the service client")?);
    let policy = config.auto_approve_policy();

    let server_addr = config.server_addr.clone();
    info!(
        %server_addr,
        stale_threshold_days = config.stale_threshold_days,
        auto_approve_staff = config.auto_approve_staff_ids.len(),
        "Configuration loaded"
    );

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::from(store.clone()))
            .app_data(Data::from(gateway.clone()))
            .app_data(Data::new(policy.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind {}", server_addr))?
    .run()
    .await?;

    Ok(())
}
