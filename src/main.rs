use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // brings ApiDoc::openapi() into scope
use utoipa_swagger_ui::SwaggerUi;

use discuss::config::ServerConfig;
use discuss::openapi::ApiDoc;
use discuss::repo::inmem::InMemRepo;
use discuss::{config, cors, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env only in debug builds; production sets the environment explicitly
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = ServerConfig::from_env();
    if let Err(problems) = cfg.validate() {
        for p in &problems {
            error!("{p}");
        }
        anyhow::bail!("invalid configuration ({} problem(s)); see .env.example", problems.len());
    }

    info!(data_dir = %cfg.data_dir.display(), "bootstrapping discussion service");
    let repo = InMemRepo::with_data_dir(&cfg.data_dir);
    let state = web::Data::new(AppState { repo: Arc::new(repo) });
    let openapi = ApiDoc::openapi();
    let frontend = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors(&frontend))
            .app_data(state.clone())
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(cfg.bind.as_str())
    .with_context(|| format!("binding {}", cfg.bind))?;

    info!("listening on http://{}", cfg.bind);
    server.run().await.context("server terminated")?;
    Ok(())
}
