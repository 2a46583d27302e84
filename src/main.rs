use std::{process, sync::Arc};

use dalec::{
    application::{
        error::AppError,
        listing::ContentListingService,
        refresh::{BatchPolicy, BatchRefresh, RefreshEngine},
        registry::ProviderRegistry,
        repos::{ContentsRepo, FetchHistoryRepo},
    },
    config::{self, StorageBackend},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryRepositories,
        providers, telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let chain = dalec::application::error::error_chain(error);
    if dispatcher::has_been_set() {
        error!(error = %error, chain = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Refresh(args) => run_refresh(settings, args).await,
        config::Command::Providers(args) => run_providers(settings, args),
    }
}

struct Repositories {
    contents: Arc<dyn ContentsRepo>,
    history: Arc<dyn FetchHistoryRepo>,
    postgres: Option<Arc<PostgresRepositories>>,
}

async fn init_repositories(settings: &config::Settings) -> Result<Repositories, AppError> {
    let postgres = if settings.storage.needs_database() {
        let database_url = settings
            .database
            .url
            .as_ref()
            .ok_or_else(|| InfraError::configuration("database url is not configured"))
            .map_err(AppError::from)?;

        let pool =
            PostgresRepositories::connect(database_url, settings.database.max_connections.get())
                .await
                .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
        PostgresRepositories::run_migrations(&pool)
            .await
            .map_err(|err| AppError::from(InfraError::migration(err.to_string())))?;
        Some(Arc::new(PostgresRepositories::new(pool)))
    } else {
        None
    };

    // memory backends share one store
    let memory = Arc::new(MemoryRepositories::new());
    let contents: Arc<dyn ContentsRepo> = match postgres.as_ref() {
        Some(db) if settings.storage.content_backend == StorageBackend::Postgres => db.clone(),
        _ => memory.clone(),
    };
    let history: Arc<dyn FetchHistoryRepo> = match postgres.as_ref() {
        Some(db) if settings.storage.fetch_history_backend == StorageBackend::Postgres => {
            db.clone()
        }
        _ => memory,
    };

    info!(
        content_backend = %settings.storage.content_backend,
        fetch_history_backend = %settings.storage.fetch_history_backend,
        "storage initialised"
    );

    Ok(Repositories {
        contents,
        history,
        postgres,
    })
}

fn build_engine(
    settings: &config::Settings,
    repositories: &Repositories,
) -> Result<Arc<RefreshEngine>, AppError> {
    let registry = Arc::new(ProviderRegistry::new());
    providers::register_builtin(&registry, &settings.providers)?;
    providers::install_loaders(&registry, &settings.providers);

    Ok(Arc::new(RefreshEngine::new(
        registry,
        Arc::clone(&repositories.contents),
        Arc::clone(&repositories.history),
        Arc::new(settings.contents.clone()),
    )))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let engine = build_engine(&settings, &repositories)?;
    let listing = Arc::new(ContentListingService::new(
        Arc::clone(&repositories.contents),
        Arc::clone(engine.settings()),
    ));

    let state = HttpState {
        engine,
        listing,
        db: repositories.postgres.clone(),
    };
    serve_http(&settings, state).await
}

async fn run_refresh(settings: config::Settings, args: config::RefreshArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let engine = build_engine(&settings, &repositories)?;

    let policy = if args.continue_on_error {
        BatchPolicy::ContinueOnError
    } else {
        BatchPolicy::FailFast
    };
    let batch = BatchRefresh::new(args.app, args.content_type)
        .channel(args.channel)
        .channel_objects(args.channel_objects)
        .force(args.force)
        .policy(policy);

    let outcome = engine.refresh_batch(&batch).await?;
    for (scope, result) in &outcome.outcomes {
        match result.counts() {
            Some(counts) => println!(
                "{scope}: created={} updated={} deleted={}",
                counts.created, counts.updated, counts.deleted
            ),
            None => println!("{scope}: still fresh"),
        }
    }

    let failed = outcome.failures.len();
    for failure in outcome.failures {
        warn!(scope = %failure.scope, error = %failure.failure, "scope refresh failed");
        println!("{}: failed ({})", failure.scope, failure.failure);
    }
    if failed > 0 {
        return Err(AppError::unexpected(format!("{failed} scope(s) failed to refresh")));
    }
    Ok(())
}

fn run_providers(settings: config::Settings, args: config::ProvidersArgs) -> Result<(), AppError> {
    let registry = ProviderRegistry::new();
    providers::install_loaders(&registry, &settings.providers);

    if args.autoload {
        for app in registry.list_loaders() {
            registry.get(&app, true)?;
        }
    }

    let registered = registry.list_registered();
    for app in registry.list_loaders().union(&registered) {
        let state = if registered.contains(app) {
            "registered"
        } else {
            "loader"
        };
        println!("{app}\t{state}");
    }
    Ok(())
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    info!(addr = %settings.server.addr, "dalec listening");

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}
