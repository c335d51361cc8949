//! Vigil API Server Entry Point
//!
//! Loads configuration, wires collectors, provider and analyzer, and serves
//! the Axum router until Ctrl-C.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use vigil_analyzer::{load_change_history, Analyzer};
use vigil_api::jobs::cache_sweep_task;
use vigil_api::telemetry::{init_tracer, TelemetryConfig};
use vigil_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, FileConfig};
use vigil_cache::ResultCache;
use vigil_collectors::{
    CompositeSource, JaegerSource, LokiSource, PrometheusSource, TelemetrySource,
};
use vigil_core::{AnalyzerConfig, ChangeHistoryConfig, CollectorConfig, ProviderConfig};
use vigil_llm::OpenAICompatProvider;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracer(&TelemetryConfig::from_env())?;

    let mut api_config = ApiConfig::from_env();
    let mut collector_config = CollectorConfig::from_env();
    let mut analyzer_config = AnalyzerConfig::from_env();
    let mut provider_config = ProviderConfig::from_env()?;
    FileConfig::from_env()?.apply(
        &mut api_config,
        &mut collector_config,
        &mut analyzer_config,
        &mut provider_config,
    );
    analyzer_config.validate()?;

    let source = build_source(&collector_config);
    let provider = Arc::new(OpenAICompatProvider::new(&provider_config));
    let changes = load_change_history(&ChangeHistoryConfig::from_env()).await;

    let cache = Arc::new(ResultCache::new(analyzer_config.cache_ttl));
    let analyzer = Analyzer::with_cache(&analyzer_config, source, provider, cache.clone())?
        .with_change_history(changes);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(cache_sweep_task(
        cache,
        analyzer_config.cleanup_interval,
        shutdown_rx,
    ));

    let state = AppState::new(Arc::new(analyzer), api_config.request_timeout);
    let app: Router = create_api_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(
        %addr,
        prometheus = %collector_config.prometheus_url,
        model = %analyzer_config.model,
        "Starting Vigil API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "cache sweep task did not stop cleanly");
    }
    Ok(())
}

/// Prometheus is always the primary source; Jaeger and Loki join when configured.
fn build_source(config: &CollectorConfig) -> Arc<dyn TelemetrySource> {
    let mut composite = CompositeSource::new(Arc::new(PrometheusSource::new(
        config.prometheus_url.clone(),
        config.http_timeout,
    )));

    if let Some(url) = &config.jaeger_url {
        composite = composite.with_secondary(Arc::new(JaegerSource::new(
            url.clone(),
            config.http_timeout,
            config.jaeger_trace_limit,
        )));
    }
    if let Some(url) = &config.loki_url {
        composite = composite.with_secondary(Arc::new(LokiSource::new(
            url.clone(),
            config.http_timeout,
            config.loki_label.clone(),
            config.loki_line_limit,
        )));
    }

    Arc::new(composite)
}
