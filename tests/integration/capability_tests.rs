//! Capability-gated actions on entities fetched through the pipeline.

use capgate::resource::{Column, ColumnSource, RequiredFields};
use capgate::{
    ActionDescriptor, CredentialStore, ErrorKind, LoginCredentials, ResourceDefinition,
    ResourceRegistry, available_actions,
};
use serde::Deserialize;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path, query_param},
};

use crate::common::{PASSWORD, USERNAME, gateway, mount_token_endpoint};

#[derive(Debug, Deserialize)]
struct Document {
    content: String,
}

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
                .build(),
        ])
        .build()
}

/// Mounts `d1` with only `edit` granted and returns the edit handle.
async fn mount_d1(server: &MockServer) -> String {
    let edit = format!("{}/npl/document/Document/d1/edit", server.uri());
    Mock::given(method("GET"))
        .and(path("/npl/document/Document/d1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@id": "d1",
            "@state": "created",
            "@actions": {"edit": edit},
            "@parties": {"editor": {"claims": {"email": ["alice@example.com"]}}},
            "content": "draft",
        })))
        .mount(server)
        .await;
    edit
}

/// Test that only actions in the entity's capability map are offered
#[tokio::test]
async fn test_available_actions_follow_capability_map() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_d1(&server).await;
    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let resource = documents();
    let entity = gateway
        .pipeline()
        .detail::<Document>(&resource, "d1")
        .await
        .expect("detail");

    assert_eq!(entity.data.content, "draft");
    assert_eq!(entity.state.as_deref(), Some("created"));
    let offered: Vec<&str> = available_actions(resource.actions(), &entity.actions)
        .into_iter()
        .map(ActionDescriptor::name)
        .collect();
    assert_eq!(offered, vec!["edit"]);
}

/// Test that an available action posts its payload to the handle
#[tokio::test]
async fn test_invoke_available_action() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_d1(&server).await;
    Mock::given(method("POST"))
        .and(path("/npl/document/Document/d1/edit"))
        .and(body_json(json!({"content": "final"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"@id": "d1"})))
        .expect(1)
        .mount(&server)
        .await;
    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let resource = documents();
    let entity = gateway
        .pipeline()
        .detail::<Document>(&resource, "d1")
        .await
        .expect("detail");
    let result = gateway
        .pipeline()
        .invoke_action(&resource, &entity, "edit", Some(json!({"content": "final"})))
        .await
        .expect("edit should succeed");

    assert_eq!(result, json!({"@id": "d1"}));
}

/// Test that unavailable or malformed invocations never reach the server
#[tokio::test]
async fn test_rejected_invocations_send_nothing() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    mount_d1(&server).await;
    Mock::given(method("POST"))
        .and(path("/npl/document/Document/d1/edit"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let resource = documents();
    let entity = gateway
        .pipeline()
        .detail::<Document>(&resource, "d1")
        .await
        .expect("detail");

    let unavailable = gateway
        .pipeline()
        .invoke_action(&resource, &entity, "approve", None)
        .await
        .expect_err("approve is not granted");
    assert_eq!(unavailable.kind(), ErrorKind::ActionUnavailable);

    let undeclared = gateway
        .pipeline()
        .invoke_action(&resource, &entity, "archive", None)
        .await
        .expect_err("archive is not declared");
    assert_eq!(undeclared.kind(), ErrorKind::InvalidArgument);

    let malformed = gateway
        .pipeline()
        .invoke_action(&resource, &entity, "edit", Some(json!({"text": "x"})))
        .await
        .expect_err("payload lacks content");
    assert_eq!(malformed.kind(), ErrorKind::SchemaViolation);
}

/// Test that listing walks every page reported by the server
#[tokio::test]
async fn test_list_all_pages() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;
    for (page, ids) in [(1, ["d1", "d2"]), (2, ["d3", "d4"])] {
        let items: Vec<_> = ids
            .iter()
            .map(|id| json!({"@id": id, "@actions": {}, "content": id}))
            .collect();
        Mock::given(method("GET"))
            .and(path("/npl/document/Document/"))
            .and(query_param("page", page.to_string()))
            .and(query_param("pageSize", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": items,
                "page": page,
                "totalPages": 2,
                "totalItems": 4,
            })))
            .mount(&server)
            .await;
    }
    let gateway = gateway(&server, CredentialStore::in_memory()).expect("gateway");
    gateway
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .expect("login");

    let all = gateway
        .pipeline()
        .list_all::<Document>(&documents())
        .await
        .expect("list_all");

    let ids: Vec<&str> = all.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["d1", "d2", "d3", "d4"]);
    assert!(all.iter().all(|e| e.actions.is_empty()));
}

/// Test that the registry resolves definitions by name and reference key
#[test]
fn test_registry_lookup() {
    let registry = ResourceRegistry::new([documents()]).expect("registry");

    let by_name = registry.get("documents").expect("by name");
    let by_key = registry.by_reference_key("Document").expect("by key");
    assert_eq!(by_name.name(), by_key.name());
    assert_eq!(by_name.detail_path_for("d1"), "/npl/document/Document/d1/");
    assert!(registry.get("invoices").is_none());

    let duplicate = ResourceRegistry::new([documents(), documents()]).expect_err("duplicate");
    assert_eq!(duplicate.kind(), ErrorKind::Configuration);
}
