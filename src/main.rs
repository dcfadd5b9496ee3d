use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use kube_dashboard_client::{
    load_config, AnalyticsView, DashboardClient, NodesView, NotificationLevel, Notifier, PodsView,
    TaskHandle, ViewKind,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    info!(
        api = %cfg.api_base_url,
        views = ?cfg.views,
        page_size = cfg.page_size,
        time_range = cfg.time_range.label(),
        analytics_time_range = cfg.analytics_time_range.label(),
        "starting dashboard client"
    );

    let client = DashboardClient::from_config(&cfg)?;
    let (notifier, mut notifications) = Notifier::channel();

    // Notifications are already logged by the notifier; this is the display side.
    let printer = tokio::spawn(async move {
        while let Some(n) = notifications.recv().await {
            let tag = match n.level {
                NotificationLevel::Info => "info",
                NotificationLevel::Success => "ok",
                NotificationLevel::Error => "error",
            };
            println!("[{}] {}", tag, n.message);
        }
    });

    let mut handles: Vec<TaskHandle> = Vec::new();
    let mut pods: Option<Arc<PodsView>> = None;
    let mut nodes: Option<Arc<NodesView>> = None;
    let mut analytics: Option<Arc<AnalyticsView>> = None;

    for view in &cfg.views {
        match view {
            ViewKind::Pods => {
                let v = Arc::new(PodsView::from_config(client.clone(), notifier.clone(), &cfg));
                handles.push(v.start());
                pods = Some(v);
            }
            ViewKind::Nodes => {
                let v = Arc::new(NodesView::from_config(client.clone(), notifier.clone(), &cfg));
                handles.push(v.start());
                nodes = Some(v);
            }
            ViewKind::Analytics => {
                let v = Arc::new(AnalyticsView::from_config(client.clone(), notifier.clone(), &cfg));
                handles.push(v.start());
                analytics = Some(v);
            }
        }
    }
    info!(tasks = handles.len(), "views started");

    wait_for_shutdown().await;
    info!("shutting down");

    for handle in handles {
        handle.shutdown().await;
    }
    if let Some(v) = &pods {
        v.teardown();
    }
    if let Some(v) = &nodes {
        v.teardown();
    }

    if let Some(v) = &analytics {
        v.teardown();
        if let Some(dir) = &cfg.export_dir {
            match v.export(dir, cfg.export_format) {
                Ok(path) => info!(path = %path.display(), "analytics summary written"),
                Err(e) => warn!(error = %e, "analytics summary not written"),
            }
        }
    }

    // Closing every sender lets the printer drain what is left and finish.
    drop(pods);
    drop(nodes);
    drop(analytics);
    drop(notifier);
    let _ = printer.await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
