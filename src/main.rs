use std::{future::IntoFuture, process, sync::Arc};

use staffetta::{
    cache::{Gateway, MemoryStore},
    config,
    infra::{
        error::InfraError,
        http::{GatewayState, build_router},
        origin::HttpOrigin,
        tasks::TokioScheduler,
        telemetry,
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

fn report_application_error(error: &InfraError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), InfraError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    let origin = Arc::new(HttpOrigin::new(&settings.origin)?);
    let store = Arc::new(MemoryStore::new());
    let tasks = Arc::new(TokioScheduler::new());
    let gateway = Arc::new(Gateway::new(origin, store, tasks));

    info!(
        target = "staffetta::server",
        origin = %settings.origin.base_url,
        "forwarding cache misses and refreshes to origin"
    );

    serve_http(&settings, build_router(GatewayState { gateway })).await
}

async fn serve_http(settings: &config::Settings, router: axum::Router) -> Result<(), InfraError> {
    let listener = tokio::net::TcpListener::bind(settings.server.listen_addr).await?;
    info!(
        target = "staffetta::server",
        addr = %settings.server.listen_addr,
        "listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let mut server = tokio::spawn(
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                shutdown_rx.await.ok();
            })
            .into_future(),
    );

    let finished = tokio::select! {
        result = &mut server => Some(result),
        signal = tokio::signal::ctrl_c() => {
            if let Err(error) = signal {
                warn!(
                    target = "staffetta::server",
                    error = %error,
                    "failed to listen for shutdown signal"
                );
            }
            None
        }
    };

    let result = match finished {
        Some(result) => result,
        None => {
            let grace = settings.server.graceful_shutdown;
            info!(
                target = "staffetta::server",
                grace_seconds = grace.as_secs(),
                "shutdown signal received, draining connections"
            );
            shutdown_tx.send(()).ok();

            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        target = "staffetta::server",
                        grace_seconds = grace.as_secs(),
                        "drain window elapsed, aborting open connections"
                    );
                    server.abort();
                    return Ok(());
                }
            }
        }
    };

    match result {
        Ok(inner) => inner.map_err(InfraError::from),
        Err(join_error) => Err(InfraError::server(format!(
            "server task failed: {join_error}"
        ))),
    }
}
