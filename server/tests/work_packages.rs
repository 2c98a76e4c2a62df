// SPDX-FileCopyrightText: 2024 German Human Genome-Phenome Archive (GHGA)
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests of the REST API, running the real server over
//! in-memory storage providers.

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use wpsbackend::access::{AccessError, AccessProvider};
use wpsbackend::auth::{AuthConfig, IdentityVerifier};
use wpsbackend::storage_provider_trait::{DatasetStorageProvider, WorkPackageStorageProvider};
use wpsbackend::work_package::{WorkPackage, WorkPackageRepository};
use wpsserver::storage_provider::memory::MemoryStorageProvider;
use wpsserver::{run, ServerRunParams};
use wpstypes::crypto::seal::UserSecretKey;
use wpstypes::crypto::signing::{
    test_utils::generate_jwk_pair, Algorithm, SigningKey, Validation, VerifyingKey,
};
use wpstypes::dataset::{Dataset, DatasetFile, WorkType};
use wpstypes::identifiers::WorkPackageId;
use wpstypes::time::TimeStamp;
use wpstypes::tokens::{AccessToken, WorkOrderToken};

/// An access provider with scriptable decisions.
#[derive(Clone)]
struct TestAccess {
    allow: Arc<AtomicBool>,
    datasets: Arc<Mutex<Vec<String>>>,
    grants: Arc<Mutex<Vec<(String, String)>>>,
}

impl Default for TestAccess {
    fn default() -> Self {
        Self {
            allow: Arc::new(AtomicBool::new(true)),
            datasets: Arc::new(Mutex::new(vec!["DS001".into()])),
            grants: Arc::new(Mutex::new(vec![])),
        }
    }
}

#[async_trait]
impl AccessProvider for TestAccess {
    async fn check_access(
        &self,
        _user_id: &str,
        _dataset_id: &str,
        _work_type: WorkType,
    ) -> Result<bool, AccessError> {
        Ok(self.allow.load(Ordering::SeqCst))
    }

    async fn accessible_datasets(&self, _user_id: &str) -> Result<Vec<String>, AccessError> {
        Ok(self.datasets.lock().unwrap().clone())
    }

    async fn register_grant(
        &self,
        user_id: &str,
        file_id: &str,
        _valid_until: TimeStamp,
    ) -> Result<(), AccessError> {
        self.grants
            .lock()
            .unwrap()
            .push((user_id.into(), file_id.into()));
        Ok(())
    }
}

struct TestApp {
    address: String,
    client: reqwest::Client,
    storage: MemoryStorageProvider,
    access: TestAccess,
    auth_signing_key: SigningKey,
    work_order_public_jwk: String,
    user_secret: UserSecretKey,
    user_key: String,
}

/// Start the server on a random port over fresh in-memory providers.
async fn spawn_app() -> TestApp {
    let storage = MemoryStorageProvider::new();
    storage.upsert_dataset(some_dataset()).await.unwrap();
    let access = TestAccess::default();

    let (work_order_private, work_order_public_jwk) = generate_jwk_pair();
    let signing_key = SigningKey::from_jwk(&work_order_private).unwrap();
    let repository = WorkPackageRepository::new(
        signing_key,
        30,
        storage.clone(),
        storage.clone(),
        access.clone(),
    );

    let (auth_private, auth_public) = generate_jwk_pair();
    let auth_signing_key = SigningKey::from_jwk(&auth_private).unwrap();
    let verifier = IdentityVerifier::new(&AuthConfig {
        auth_key: auth_public,
        auth_algs: vec!["ES256".into()],
        auth_check_claims: ["id", "name", "email", "iat", "exp"]
            .map(String::from)
            .to_vec(),
    })
    .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind to random port");
    let port = listener.local_addr().unwrap().port();
    let server = run(ServerRunParams {
        listener,
        repository,
        verifier,
    })
    .expect("Failed to start the server");
    actix_web::rt::spawn(server);

    let (user_secret, user_public) = UserSecretKey::generate();
    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        client: reqwest::Client::new(),
        storage,
        access,
        auth_signing_key,
        work_order_public_jwk,
        user_secret,
        user_key: user_public.as_base64().to_owned(),
    }
}

fn some_dataset() -> Dataset {
    Dataset {
        id: "DS001".into(),
        title: "Some dataset".into(),
        description: Some("Test dataset".into()),
        stage: WorkType::Download,
        files: vec![
            DatasetFile {
                id: "F001".into(),
                extension: ".txt".into(),
            },
            DatasetFile {
                id: "F002".into(),
                extension: ".csv".into(),
            },
            DatasetFile {
                id: "F003".into(),
                extension: ".json".into(),
            },
        ],
    }
}

impl TestApp {
    /// A valid internal assertion for the given user.
    fn assertion(&self, user_id: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        self.auth_signing_key
            .sign(&json!({
                "id": user_id,
                "name": "Jane Doe",
                "email": "jane@home.org",
                "title": "Dr.",
                "iat": now,
                "exp": now + 300,
            }))
            .unwrap()
    }

    fn creation_body(&self, file_ids: Option<Vec<&str>>) -> Value {
        let mut body = json!({
            "dataset_id": "DS001",
            "type": "download",
            "user_public_crypt4gh_key": self.user_key,
        });
        if let Some(file_ids) = file_ids {
            body["file_ids"] = json!(file_ids);
        }
        body
    }

    /// Create a work package and decrypt the returned access token.
    async fn created_package(&self, file_ids: Option<Vec<&str>>) -> (String, String) {
        let response = self
            .client
            .post(format!("{}/work-packages", self.address))
            .bearer_auth(self.assertion("user-1"))
            .json(&self.creation_body(file_ids))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.unwrap();
        let id = body["id"].as_str().unwrap().to_owned();
        let token = self
            .user_secret
            .open(body["token"].as_str().unwrap())
            .unwrap();
        (id, String::from_utf8(token).unwrap())
    }

    async fn get_details(&self, id: &str, bearer: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/work-packages/{id}", self.address))
            .bearer_auth(bearer)
            .send()
            .await
            .unwrap()
    }

    async fn mint_work_order_token(&self, id: &str, file_id: &str, bearer: &str) -> reqwest::Response {
        self.client
            .post(format!(
                "{}/work-packages/{id}/files/{file_id}/work-order-tokens",
                self.address
            ))
            .bearer_auth(bearer)
            .send()
            .await
            .unwrap()
    }
}

#[actix_web::test]
async fn health_reports_ok() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "OK"}));
}

#[actix_web::test]
async fn creates_and_inspects_a_work_package() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(None).await;
    assert!(token.starts_with(&format!("{id}:")));

    let response = app.get_details(&id, &token).await;
    assert_eq!(response.status().as_u16(), 200);
    let details: Value = response.json().await.unwrap();
    assert_eq!(details["type"], "download");
    assert_eq!(
        details["files"],
        json!({"F001": ".txt", "F002": ".csv", "F003": ".json"})
    );
    assert!(details["created"].is_string());
    assert!(details["expires"].is_string());
}

#[actix_web::test]
async fn restricts_packages_to_known_files() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(Some(vec!["F002", "F009", "F001"])).await;

    let details: Value = app.get_details(&id, &token).await.json().await.unwrap();
    assert_eq!(details["files"], json!({"F001": ".txt", "F002": ".csv"}));
}

#[actix_web::test]
async fn denies_creation_without_permission() {
    let app = spawn_app().await;
    app.access.allow.store(false, Ordering::SeqCst);

    let response = app
        .client
        .post(format!("{}/work-packages", app.address))
        .bearer_auth(app.assertion("user-1"))
        .json(&app.creation_body(None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn denies_creation_without_valid_assertion() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/work-packages", app.address))
        .json(&app.creation_body(None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .client
        .post(format!("{}/work-packages", app.address))
        .bearer_auth("not-a-token")
        .json(&app.creation_body(None))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn rejects_malformed_user_keys() {
    let app = spawn_app().await;

    let mut body = app.creation_body(None);
    body["user_public_crypt4gh_key"] = json!("not base64!");
    let response = app
        .client
        .post(format!("{}/work-packages", app.address))
        .bearer_auth(app.assertion("user-1"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
}

#[actix_web::test]
async fn rejects_malformed_bodies() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(format!("{}/work-packages", app.address))
        .bearer_auth(app.assertion("user-1"))
        .json(&json!({"unexpected": true}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
}

#[actix_web::test]
async fn mints_a_work_order_token() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(None).await;

    let response = app.mint_work_order_token(&id, "F002", &token).await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();

    let signed = app
        .user_secret
        .open(body["token"].as_str().unwrap())
        .unwrap();
    let verifying = VerifyingKey::from_jwk(&app.work_order_public_jwk).unwrap();
    let claims: WorkOrderToken = verifying
        .verify(
            &String::from_utf8(signed).unwrap(),
            &Validation::new(Algorithm::ES256),
        )
        .unwrap();
    assert_eq!(claims.work_type, WorkType::Download);
    assert_eq!(claims.file_id, "F002");
    assert_eq!(claims.user_id, "user-1");
    assert_eq!(claims.full_user_name, "Dr. Jane Doe");
    assert_eq!(claims.email, "jane@home.org");
    assert_eq!(claims.user_public_crypt4gh_key, app.user_key);

    let grants = app.access.grants.lock().unwrap();
    assert_eq!(
        grants.as_slice(),
        [("user-1".to_string(), "F002".to_string())]
    );
}

#[actix_web::test]
async fn denies_work_order_tokens_for_foreign_files() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(Some(vec!["F001"])).await;

    let response = app.mint_work_order_token(&id, "F002", &token).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn survives_dataset_deletion() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(None).await;

    app.storage.delete_dataset("DS001").await.unwrap();

    // details degrade to empty extensions
    let details: Value = app.get_details(&id, &token).await.json().await.unwrap();
    assert_eq!(details["files"], json!({"F001": "", "F002": "", "F003": ""}));

    // work order tokens still mint from the snapshot
    let response = app.mint_work_order_token(&id, "F002", &token).await;
    assert_eq!(response.status().as_u16(), 201);
}

#[actix_web::test]
async fn denies_access_with_mismatched_or_tampered_tokens() {
    let app = spawn_app().await;
    let (id, token) = app.created_package(None).await;
    let (other_id, _) = app.created_package(None).await;

    // token presented against another package id
    let response = app.get_details(&other_id, &token).await;
    assert_eq!(response.status().as_u16(), 403);

    // tampered secret
    let response = app.get_details(&id, &format!("{id}:AAAAAAAA")).await;
    assert_eq!(response.status().as_u16(), 403);

    // no token at all
    let response = app
        .client
        .get(format!("{}/work-packages/{id}", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn denies_all_operations_on_expired_packages() {
    let app = spawn_app().await;

    // plant an expired record together with a token that would match it
    let id = WorkPackageId::random();
    let token = AccessToken::generate(id.clone());
    let created: TimeStamp = (chrono::Utc::now() - chrono::Duration::days(40)).into();
    let expires: TimeStamp = (chrono::Utc::now() - chrono::Duration::days(10)).into();
    app.storage
        .insert_work_package(WorkPackage {
            id: id.clone(),
            dataset_id: "DS001".into(),
            work_type: WorkType::Download,
            user_id: "user-1".into(),
            user_public_crypt4gh_key: app.user_key.clone(),
            full_user_name: "Dr. Jane Doe".into(),
            email: "jane@home.org".into(),
            file_ids: vec!["F001".into()],
            token_hash: token.fingerprint(),
            created,
            expires,
        })
        .await
        .unwrap();

    let bearer = token.to_string();
    let response = app.get_details(id.as_str(), &bearer).await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app.mint_work_order_token(id.as_str(), "F001", &bearer).await;
    assert_eq!(response.status().as_u16(), 403);
}

#[actix_web::test]
async fn lists_accessible_datasets() {
    let app = spawn_app().await;
    app.access.datasets.lock().unwrap().push("DS999".into());

    let response = app
        .client
        .get(format!("{}/users/user-1/datasets", app.address))
        .bearer_auth(app.assertion("user-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let datasets: Value = response.json().await.unwrap();
    // unknown datasets are dropped
    assert_eq!(datasets.as_array().unwrap().len(), 1);
    assert_eq!(datasets[0]["id"], "DS001");
    assert_eq!(datasets[0]["stage"], "download");
    assert_eq!(datasets[0]["files"][0]["extension"], ".txt");
}

#[actix_web::test]
async fn denies_listing_for_other_users() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/users/user-2/datasets", app.address))
        .bearer_auth(app.assertion("user-1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}
