use axum::Json;
use axum::{
    extract::Extension,
    routing::get,
    Router,
};
use sched_worker::modules::{DockerImageLoader, DockerRuntime, DEFAULT_MOUNT_PREFIX};
use sched_worker::registry::adapter::RegistryHandle;
use sched_worker::registry::http::HttpRegistry;
use sched_worker::registry::memory::InMemoryRegistry;
use sched_worker::registry::types::{ProcessId, ProcessStatus, TaskFilter, TaskStatus};
use sched_worker::registry::TaskRegistry;
use sched_worker::storage::StorageContext;
use sched_worker::worker::{listener, WorkerContext};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut registry_url: Option<String> = None;
    let mut standalone = false;
    let mut data_root: Option<String> = None;
    let mut process_id: Option<String> = None;
    let mut poll_ms: Option<u64> = None;
    let mut bind_addr: Option<SocketAddr> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--registry" => {
                registry_url = Some(args[i + 1].clone());
                i += 2;
            }
            "--standalone" => {
                standalone = true;
                i += 1;
            }
            "--data-root" => {
                data_root = Some(args[i + 1].clone());
                i += 2;
            }
            "--process-id" => {
                process_id = Some(args[i + 1].clone());
                i += 2;
            }
            "--poll-ms" => {
                poll_ms = Some(args[i + 1].parse()?);
                i += 2;
            }
            "--bind" => {
                bind_addr = Some(args[i + 1].parse()?);
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    if registry_url.is_none() && !standalone {
        eprintln!(
            "Usage: {} --registry <url> [--data-root <path>] [--process-id <id>] [--poll-ms <ms>] [--bind <addr:port>]",
            args[0]
        );
        eprintln!("       {} --standalone [same options]", args[0]);
        std::process::exit(1);
    }

    let poll_ms = poll_ms
        .or_else(|| {
            std::env::var("POLL_MS")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
        })
        .unwrap_or(5000);

    let data_root = data_root
        .or_else(|| std::env::var("DATA_ROOT").ok())
        .unwrap_or_else(|| "/var/lib/sched-worker".to_string());

    let mount_prefix =
        std::env::var("MOUNT_PREFIX").unwrap_or_else(|_| DEFAULT_MOUNT_PREFIX.to_string());

    let process_id = match process_id {
        Some(id) => ProcessId(id),
        None => ProcessId::new(),
    };

    let backend: Arc<dyn TaskRegistry> = match &registry_url {
        Some(url) => {
            tracing::info!("Using registry at {}", url);
            Arc::new(HttpRegistry::new(url.clone()))
        }
        None => {
            tracing::info!("Running standalone with an in-memory registry");
            Arc::new(InMemoryRegistry::new())
        }
    };
    let registry = RegistryHandle::new(backend);

    tracing::info!("Worker process {} starting", process_id);
    tracing::info!("Data root: {}", data_root);
    tracing::info!("Poll period: {}ms", poll_ms);

    let ctx = WorkerContext {
        process_id: process_id.clone(),
        period: Duration::from_millis(poll_ms),
        mount_prefix,
        registry: registry.clone(),
        storage: StorageContext::new(&data_root),
        runtime: Arc::new(DockerRuntime::new()),
        loader: Arc::new(DockerImageLoader::new()),
    };

    // Register the worker process with the registry.
    registry
        .set_process_status(&process_id, ProcessStatus::Idle)
        .await;

    // Health surface, if requested:
    if let Some(addr) = bind_addr {
        let app = Router::new()
            .route("/health/routes", get(handle_routes))
            .route("/health/stats", get(handle_stats))
            .layer(Extension(registry.clone()))
            .layer(Extension(process_id.clone()));

        let tcp_listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Health server listening on {}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(tcp_listener, app).await {
                tracing::error!("Health server failed: {}", e);
            }
        });
    }

    // Run the claim loop. It only ever returns on a fatal registry fault;
    // exit non-zero so the process supervisor restarts us.
    if let Err(e) = listener::run(&ctx).await {
        tracing::error!("Worker listener aborted: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Serialize)]
struct RoutesResponse {
    routes: Vec<&'static str>,
}

#[derive(Serialize)]
struct WorkerStatsResponse {
    process_id: String,
    tasks_scheduled: u64,
    tasks_running: u64,
    tasks_completed: u64,
    tasks_error: u64,
    cpu_usage: f32,
    mem_used_mb: u64,
    mem_total_mb: u64,
}

async fn handle_routes() -> Json<RoutesResponse> {
    Json(RoutesResponse {
        routes: vec!["/health/routes", "/health/stats"],
    })
}

async fn handle_stats(
    Extension(registry): Extension<RegistryHandle>,
    Extension(process_id): Extension<ProcessId>,
) -> Json<WorkerStatsResponse> {
    let tasks_scheduled = registry
        .count_tasks(&TaskFilter::with_status(TaskStatus::Scheduled))
        .await;
    let tasks_running = registry
        .count_tasks(&TaskFilter::with_status(TaskStatus::Running))
        .await;
    let tasks_completed = registry
        .count_tasks(&TaskFilter::with_status(TaskStatus::Completed))
        .await;
    let tasks_error = registry
        .count_tasks(&TaskFilter::with_status(TaskStatus::Error))
        .await;

    let mut sys = System::new_all();
    sys.refresh_cpu();
    sys.refresh_memory();
    let cpu_usage = sys.global_cpu_info().cpu_usage();
    // sysinfo returns bytes for memory values.
    let mem_total_mb = sys.total_memory() / (1024 * 1024);
    let mem_used_mb = sys.used_memory() / (1024 * 1024);

    Json(WorkerStatsResponse {
        process_id: process_id.0.clone(),
        tasks_scheduled,
        tasks_running,
        tasks_completed,
        tasks_error,
        cpu_usage,
        mem_used_mb,
        mem_total_mb,
    })
}
