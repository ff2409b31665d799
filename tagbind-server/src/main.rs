use anyhow::Context;
use axum::routing::{delete, get, post, put};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

mod claim;
mod db;
mod error;
mod extractors;
mod filter;
mod handlers;

pub use error::Error;
use extractors::{AppConfig, AppState, PgPool};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, structopt::StructOpt)]
#[structopt(name = "tagbind-server", about = "NFC tag ownership registry")]
struct Opt {
    /// Address to listen on
    #[structopt(long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Postgres connection string
    #[structopt(long, env = "DATABASE_URL")]
    database_url: String,

    /// Shared secret gating the administrative surface. When unset, every
    /// administrative call is rejected.
    #[structopt(long, env = "ADMIN_TOKEN", hide_env_values = true)]
    admin_token: Option<String>,

    /// Base URL from which tag display URLs are derived
    #[structopt(
        long,
        env = "PUBLIC_BASE_URL",
        default_value = "https://tags.example.org"
    )]
    public_base_url: String,

    /// Do not create tag records on first reference to an unknown identifier
    #[structopt(long)]
    no_auto_provision: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let opt = <Opt as structopt::StructOpt>::from_args();

    let db = sqlx::postgres::PgPoolOptions::new()
        .connect(&opt.database_url)
        .await
        .with_context(|| format!("error opening database {:?}", opt.database_url))?;
    MIGRATOR
        .run(
            &mut *db
                .acquire()
                .await
                .context("acquiring migration connection")?,
        )
        .await
        .context("applying migrations")?;

    if opt.admin_token.is_none() {
        tracing::warn!("no admin token configured, administrative surface is unreachable");
    }

    let state = AppState {
        db: PgPool::new(db),
        config: AppConfig {
            public_base_url: opt.public_base_url,
            auto_provision: !opt.no_auto_provision,
        },
        admin_token: opt.admin_token,
    };

    tracing::info!("listening on {}", opt.bind);
    axum::Server::bind(&opt.bind)
        .serve(app(state).into_make_service())
        .await
        .context("serving axum webserver")
}

fn app(state: AppState) -> axum::Router {
    axum::Router::new()
        .route(
            "/api/admin/tags",
            post(handlers::admin_create_tag).get(handlers::admin_list_tags),
        )
        .route("/api/admin/tags/:tag_id", delete(handlers::admin_delete_tag))
        .route(
            "/api/admin/tags/:tag_id/injected",
            put(handlers::admin_set_injected),
        )
        .route(
            "/api/admin/tags/:tag_id/status",
            put(handlers::admin_set_status),
        )
        .route(
            "/api/tags/mine",
            get(handlers::own_tag).delete(handlers::release_own_tag),
        )
        .route("/api/tags/:tag_id/claim", post(handlers::claim_tag))
        .route("/api/tags/:tag_id", get(handlers::lookup_tag))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
