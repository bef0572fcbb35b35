//! Example consumer: serves list, search and show for the models in `config/`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Documents live in memory and are seeded at startup. Entities need `DATABASE_URL`.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use backoffice_sdk::config::default_schema;
use backoffice_sdk::{
    load_from_str, success_one, success_page, AppError, AppState, Backends, DataProxy, InMemoryDocumentStore,
    ListRequest, MappingSet, QueryHooks,
};
use std::sync::Arc;
use tokio::net::TcpListener;

async fn list(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(req): Query<ListRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_page(state.list(&model, &req).await?))
}

async fn search(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(req): Query<ListRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_page(state.search(&model, &req).await?))
}

async fn show(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    Ok(success_one(state.show(&model, &id).await?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("backoffice_sdk=info")),
        )
        .init();

    let (relational, document) =
        MappingSet::from_json_str(include_str!("../config/mappings.json"))?.into_providers(&default_schema())?;

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/backoffice".into());
    // connects on first relational query
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(&database_url)?;

    let store = Arc::new(InMemoryDocumentStore::new());
    store.seed(
        "articles",
        (1..=40).map(|n| {
            let doc = serde_json::json!({
                "id": format!("a{:02}", n),
                "title": if n % 3 == 0 { format!("Cat care #{}", n) } else { format!("Release notes {}", n) },
                "views": n * 10,
                "status": if n % 2 == 0 { "published" } else { "draft" },
            });
            match doc {
                serde_json::Value::Object(map) => map,
                _ => serde_json::Map::new(),
            }
        }),
    )?;

    let proxy = Arc::new(DataProxy::new(Backends {
        relational: Arc::new(relational),
        document: Arc::new(document),
        executor: Arc::new(pool),
        store,
        hooks: QueryHooks::default(),
    }));
    let config = load_from_str(include_str!("../config/admin.json"))?;
    let state = AppState::bootstrap(proxy, config)?;

    let app = Router::new()
        .route("/admin/:model", get(list))
        .route("/admin/:model/search", get(search))
        .route("/admin/:model/show/:id", get(show))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    let port = listener.local_addr()?.port();
    tracing::info!("Example consumer listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app).await?;
    Ok(())
}
