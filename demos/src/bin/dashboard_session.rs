//! Dashboard session demo.
//!
//! Restores or opens a session, lists documents with the actions the caller
//! may perform on each, and re-lists whenever the server pushes a state
//! change.
//!
//! # Running
//!
//! ```bash
//! export CAPGATE_LOCAL_API_URL="http://localhost:12000"
//! export CAPGATE_LOCAL_OIDC_AUTH_URL="http://localhost:11000"
//! export CAPGATE_APPLICATION_NAME="document"
//! export CAPGATE_USERNAME="alice"
//! export CAPGATE_PASSWORD="pw"
//!
//! RUST_LOG=capgate=debug cargo run -p capgate-demos --bin dashboard_session
//! ```

use std::{env, sync::Arc};

use capgate::prelude::*;
use capgate::resource::{Column, ColumnSource, RequiredFields};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

fn documents() -> ResourceDefinition {
    ResourceDefinition::builder()
        .name("documents")
        .display_name("Document")
        .display_name_plural("Documents")
        .reference_key("Document")
        .list_path("/npl/document/Document/")
        .detail_path("/npl/document/Document/{id}/")
        .create_path("/npl/document/Document/")
        .columns(vec![
            Column::builder()
                .key("id")
                .label("ID")
                .source(ColumnSource::Id)
                .build(),
            Column::builder()
                .key("state")
                .label("State")
                .source(ColumnSource::State)
                .build(),
            Column::builder()
                .key("content")
                .label("Content")
                .source(ColumnSource::Pointer("/content".into()))
                .build(),
        ])
        .actions(vec![
            ActionDescriptor::builder()
                .name("edit")
                .label("Edit Document")
                .payload_shape(RequiredFields::new(["content"]))
                .build(),
            ActionDescriptor::builder()
                .name("approve")
                .label("Approve")
                .requires_confirmation(true)
                .confirmation_message("Are you sure you want to approve this document?")
                .build(),
        ])
        .build()
}

async fn print_documents(gateway: &Gateway, resource: &ResourceDefinition) -> Result<()> {
    let entities = gateway.pipeline().list_all::<serde_json::Value>(resource).await?;
    println!("{} ({})", resource.display_name_plural(), entities.len());

    for entity in &entities {
        let json = serde_json::to_value(entity)?;
        let cells: Vec<String> = resource
            .columns()
            .iter()
            .map(|column| match column.value(&json) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "-".to_string(),
            })
            .collect();
        let actions: Vec<&str> = available_actions(resource.actions(), &entity.actions)
            .into_iter()
            .map(ActionDescriptor::label)
            .collect();
        println!("  {}  [{}]", cells.join(" | "), actions.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = RuntimeConfig::from_env()?;
    let store_path = env::var("CAPGATE_STORE_PATH")
        .unwrap_or_else(|_| env::temp_dir().join("capgate-session.json").display().to_string());
    let store = CredentialStore::new(Arc::new(FileStore::open(store_path)?));
    let gateway = Gateway::from_runtime_config(&config, store)?;

    if gateway.initialize().await? {
        println!("Restored stored session");
    } else {
        let username = env::var("CAPGATE_USERNAME").unwrap_or_else(|_| "alice".to_string());
        let password = env::var("CAPGATE_PASSWORD").unwrap_or_else(|_| "pw".to_string());
        gateway
            .login(&LoginCredentials::new(username, password))
            .await?;
        println!("Logged in");
    }

    let resource = documents();
    print_documents(&gateway, &resource).await?;

    let changed = Arc::new(Notify::new());
    let notifier = Arc::clone(&changed);
    let subscription = gateway.subscribe_states(move || notifier.notify_one())?;
    println!("Watching for state changes (Ctrl-C to quit)");

    let mut liveness = subscription.liveness();
    loop {
        tokio::select! {
            _ = changed.notified() => {
                if let Err(e) = print_documents(&gateway, &resource).await {
                    eprintln!("Refresh failed: {e}");
                    if matches!(e.kind(), ErrorKind::SessionExpired | ErrorKind::UnauthorizedRetryExhausted) {
                        break;
                    }
                }
            }
            Ok(()) = liveness.changed() => {
                if !*liveness.borrow_and_update() {
                    println!("Push channel closed; restart to resume live updates");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    subscription.unsubscribe();
    Ok(())
}
