use std::fs;
use std::path::Path;

use anyhow::Context;
use futures::{FutureExt, TryFutureExt};
use kube::{Client, CustomResourceExt};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use kfn_operator::core::config::OperatorConfig;
use kfn_operator::http::probe::{probe_router, CacheSynced};
use kfn_operator::model::spec::Function;
use kfn_operator::policy::derivation::{derive_config, serialize_properties};
use kfn_operator::service::controller_svc::run_controller;

fn setup_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Error installing metrics recorder")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Error listening for ctrl-c - {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("Error listening for SIGTERM - {err}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Shutdown signal received");
}

pub async fn run(cfg: OperatorConfig) -> anyhow::Result<()> {
    cfg.validate().context("Invalid configuration")?;
    let recorder_handle = setup_metrics_recorder()?;
    let synced = CacheSynced::default();
    let shutdown = shutdown_signal().shared();

    let client = Client::try_default().await
        .context("Error building kubernetes client")?;

    log::info!("Serving metrics and health probes on {}", cfg.metrics_address);
    let probes = axum::Server::bind(&cfg.metrics_address)
        .serve(probe_router(recorder_handle, synced.clone()).into_make_service())
        .with_graceful_shutdown(shutdown.clone())
        .map_err(anyhow::Error::from);

    tokio::try_join!(
        probes,
        run_controller(client, &cfg, shutdown, move || synced.mark()),
    )?;
    Ok(())
}

pub fn print_crd() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Function::crd())?);
    Ok(())
}

pub fn render(cfg: &OperatorConfig, path: &Path) -> anyhow::Result<()> {
    let manifest = fs::read_to_string(path)
        .with_context(|| format!("Error reading {}", path.display()))?;
    let function: Function = serde_yaml::from_str(&manifest)
        .with_context(|| format!("{} is not a Function manifest", path.display()))?;
    print!("{}", serialize_properties(&derive_config(&cfg.default_overlay(), &function)));
    Ok(())
}
