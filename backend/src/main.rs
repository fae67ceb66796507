use actix_cors::Cors;
use actix_web::{App, HttpServer};
use std::env;
use std::io;
use wasteseg_backend::{AppConfig, AppServices, configure_routes, load_model};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    config.ensure_dirs()?;
    log::info!(
        "Uploads in {}, annotated output in {}",
        config.upload_dir().display(),
        config.output_dir().display()
    );
    log::info!("Serving frontend from {}", config.frontend_dir.display());

    let model = match load_model(&config.model) {
        Ok(model) => model,
        Err(e) => {
            log::error!("Failed to load model at startup: {}", e);
            return Err(io::Error::other(format!("Model loading failed: {}", e)));
        }
    };
    log::info!("Segmentation backend: {}", model.name());

    let services = AppServices::new(&config, model);
    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .configure(|cfg| configure_routes(cfg, &services))
    })
    .bind(&bind_address)?
    .run()
    .await
}
