mod api_error;
mod auth;
mod config;
mod db;
mod http;
mod models;
mod security;
mod service;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use config::Config;
use http::security_headers::SecurityHeaders;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let pool = db::connect(&config).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let bind_addr = (config.api_host.clone(), config.api_port);
    let workers = config.api_workers as usize;

    tracing::info!(host = %bind_addr.0, port = bind_addr.1, "starting rivio-backend");

    HttpServer::new(move || {
        let cors_origins = config.cors_allowed_origins.clone();
        let cors = cors_origins.iter().fold(Cors::default(), |acc, origin| {
            if origin == "*" {
                acc.allow_any_origin()
            } else {
                acc.allowed_origin(origin)
            }
        });
        let cors = cors
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(SecurityHeaders::new(config.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(http::configure)
    })
    .bind(bind_addr)?
    .workers(workers)
    .run()
    .await?;

    Ok(())
}
