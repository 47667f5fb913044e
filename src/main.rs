mod api;
mod database;
mod dictionary;
mod error;
mod guards;
mod memory;
mod model;
mod ranking;
mod service;
mod storage;

use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::sync::Arc;

fn to_io<E>(err: E) -> std::io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(std::io::ErrorKind::Other, err)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    std::env::set_var("RUST_LOG", "filmograph=debug,actix_web=info");
    env_logger::init();

    // FILMOGRAPH_DB selects the sled backend; without it everything
    // stays in memory for the lifetime of the process.
    let (films, users) = match std::env::var("FILMOGRAPH_DB") {
        Ok(path) => {
            info!("using sled storage at {}", path);
            let db = sled::open(path).map_err(to_io)?;
            service::build(Arc::new(database::SledStore::open(&db).map_err(to_io)?))
        }
        Err(_) => {
            info!("using in-memory storage");
            service::build(Arc::new(memory::MemoryStore::new()))
        }
    };
    let films = web::Data::new(films);
    let users = web::Data::new(users);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(films.clone())
            .app_data(users.clone())
            .configure(api::configure)
    })
    .bind("127.0.0.1:8080")?
    .run()
    .await
}
