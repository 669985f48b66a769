/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use login_api::{api::configure_routes, db::create_pool, models::AppConfig};
use tracing::info;

const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    info!("start");

    let oauth_client_id =
        std::env::var("GOOGLE_CLIENT_ID").unwrap_or_else(|_| String::from(""));
    let oauth_secret =
        std::env::var("GOOGLE_CLIENT_SECRET").unwrap_or_else(|_| String::from(""));
    let oauth_redirect_url = std::env::var("OAUTH_REDIRECT_URL")
        .unwrap_or_else(|_| String::from("http://localhost:8080/login/callback"));
    let oauth_discovery_url = std::env::var("OAUTH_DISCOVERY_URL")
        .unwrap_or_else(|_| String::from(GOOGLE_DISCOVERY_URL));

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = create_pool(&database_url)
        .await
        .expect("Failed to create database pool");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(AppConfig {
                oauth_client_id: oauth_client_id.clone(),
                oauth_secret: oauth_secret.clone(),
                oauth_redirect_url: oauth_redirect_url.clone(),
                oauth_discovery_url: oauth_discovery_url.clone(),
            }))
            .wrap(cors)
            .configure(configure_routes)
    })
    .bind((
        "0.0.0.0",
        std::env::var("ACTIX_PORT")
            .unwrap_or_else(|_| String::from("8080"))
            .parse::<u16>()
            .unwrap(),
    ))?
    .run()
    .await
}
