use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use salon::config::Config;
use salon::db::{init_db, run_migrations};
use salon::docs::ApiDoc;
use salon::registry::AppRegistry;
use salon::routes;
use salon::utils::email_filter;

#[get("/")]
async fn index() -> impl Responder {
    "Salon API"
}

fn startup_error(what: &str, e: impl std::fmt::Display) -> std::io::Error {
    error!(error = %e, "{what}");
    std::io::Error::other(format!("{what}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .map_err(|e| startup_error("Failed to connect to database", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run migrations", e))?;

    let pool_for_filter_warmup = pool.clone();

    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool_for_filter_warmup, 100).await {
            error!(error = %e, "Failed to warm up email filter");
        }
    });

    let registry = AppRegistry::new(pool.clone(), &config);
    let server_addr = config.server_addr.clone();

    HttpServer::new(move || {
        let route_config = config.clone();
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard so the JS/CSS assets match
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(registry.clone()))
            .service(index)
            .configure(move |cfg| routes::configure(cfg, route_config))
    })
    .bind(server_addr)?
    .run()
    .await
}
