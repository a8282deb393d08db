//! Watch mode, entered after the dev task completes.

use std::sync::Arc;

use anyhow::{Context, Result};
use taskkit_core::{Executor, ReloadHub, WatchLoop, WatcherConfig};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::formatting::{print_info, print_key_value, print_section_header, print_warning, SectionStyle};
use crate::server;

use super::Project;

pub(super) async fn run_watch(project: &Project, executor: Arc<Executor>) -> Result<()> {
    let bindings = project.config.watch_bindings(&project.registry)?;
    if bindings.is_empty() {
        print_warning("No watch bindings configured, nothing to watch");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel())
        .map_err(|e| anyhow::anyhow!("Failed to set signal handler: {}", e))?;

    let root = project.config.project_root();
    let hub = Arc::new(ReloadHub::default());

    print_section_header("Watch Mode", SectionStyle::Primary);
    print_key_value("Root", &root.display().to_string());
    for binding in &bindings {
        print_key_value("Watching", binding.label());
    }

    let server = match &project.config.reload {
        Some(reload) => {
            let addr = reload.bind_addr();
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind live reload endpoint on {}", addr))?;
            print_key_value("Live reload", &format!("http://{}/__reload", addr));
            Some(tokio::spawn(server::serve(
                listener,
                Arc::clone(&hub),
                cancel.clone(),
            )))
        }
        None => None,
    };
    print_info("Press Ctrl+C to stop");

    let watch_loop = WatchLoop::new(executor, hub).with_config(WatcherConfig {
        debounce_ms: project.config.watch.debounce_ms,
        root,
    });
    let result = watch_loop.watch(bindings, cancel.clone()).await;
    cancel.cancel();

    if let Some(server) = server {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "live reload endpoint failed"),
            Err(e) => warn!(error = %e, "live reload endpoint panicked"),
        }
    }

    result?;
    println!();
    print_section_header("Stopped watching", SectionStyle::Warning);
    Ok(())
}
