pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod openapi;
pub mod schema;

#[cfg(test)]
mod testing;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub use application::order_service::OrderService;
pub use auth::JwtVerifier;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("Applied {} pending migration(s)", applied.len());
    Ok(())
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: OrderService,
    jwt: JwtVerifier,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    let jwt = web::Data::new(jwt);

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(jwt.clone())
            .wrap(Logger::default())
            .configure(handlers::orders::routes)
            .service(openapi::swagger_ui())
    })
    .bind((host.to_string(), port))?
    .run())
}
