mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

/// Full fleet lifecycle as the bootstrap admin: tenant provisioning, folder
/// tree, agent enrollment, heartbeats, liveness and share URLs.
#[tokio::test]
async fn tenant_provisioning_creates_root_folder_and_auto_tag() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;
    let name = common::unique("acme");

    let res = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "tenant create failed");
    let tenant = res.json::<serde_json::Value>().await?;
    let tenant_id = tenant["id"].as_i64().unwrap();

    // Provisioning leaves exactly one parentless folder named after the tenant.
    let folders = client
        .get(format!("{}/api/folders?tenant_id={}", server.base_url, tenant_id))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let roots: Vec<_> = folders["items"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["parent_id"].is_null())
        .collect();
    assert_eq!(roots.len(), 1);
    assert_eq!(roots[0]["name"], json!(name));

    // And an auto-tag derived from the tenant name.
    let tags = client
        .get(format!("{}/api/tags?tenant_id={}", server.base_url, tenant_id))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let expected = format!("tenant-{}", name.to_lowercase());
    assert!(
        tags["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["name"] == json!(expected)),
        "auto tag {} missing: {}",
        expected,
        tags
    );

    // Duplicate tenant names are rejected.
    let res = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": name }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn enrolled_device_heartbeats_and_goes_online_once_foldered() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let tenant = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("fleet") }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let tenant_id = tenant["id"].as_i64().unwrap();

    let folder = client
        .post(format!("{}/api/folders", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("lab"), "tenant_id": tenant_id }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let folder_id = folder["id"].as_i64().unwrap();

    // Unauthenticated agent enrollment by serial number.
    let serial = common::unique("sn");
    let name = common::unique("kiosk");
    let res = client
        .post(format!("{}/devices/register", server.base_url))
        .json(&json!({ "name": name, "serial_number": serial, "os_name": "linux" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK, "device register failed");

    // Heartbeat before the device is foldered: recorded, but still offline.
    let res = client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "cpu_load": 0.3 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let beat = res.json::<serde_json::Value>().await?;
    assert!(beat["heartbeat_s"].as_i64().unwrap() > 0);

    let device = client
        .get(format!("{}/api/devices/{}", server.base_url, serial))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(device["is_online"], json!(false));
    assert!(device["last_heartbeat"].is_string());

    // Move it into the folder; the existing heartbeat now counts.
    let res = client
        .patch(format!("{}/api/devices/{}", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "folder_id": folder_id }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let device = res.json::<serde_json::Value>().await?;
    assert_eq!(device["folder_id"], json!(folder_id));
    assert_eq!(device["is_online"], json!(true));

    // Re-registering the same serial updates in place, no duplicate.
    let res = client
        .post(format!("{}/devices/register", server.base_url))
        .json(&json!({ "name": name, "serial_number": serial, "os_name": "linux", "os_version": "6.1" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let again = res.json::<serde_json::Value>().await?;
    assert_eq!(again["id"], device["id"]);

    // An explicit null detaches the device from its folder again.
    let res = client
        .patch(format!("{}/api/devices/{}", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "folder_id": null }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let device = res.json::<serde_json::Value>().await?;
    assert_eq!(device["folder_id"], json!(null));
    assert_eq!(device["is_online"], json!(false));
    Ok(())
}

#[tokio::test]
async fn deleting_a_folder_reassigns_its_devices() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let tenant = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("branch") }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let tenant_id = tenant["id"].as_i64().unwrap();

    let folder = client
        .post(format!("{}/api/folders", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("doomed"), "tenant_id": tenant_id }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let folder_id = folder["id"].as_i64().unwrap();

    let device = client
        .post(format!("{}/api/devices", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("till"), "folder_id": folder_id }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let device_id = device["id"].as_i64().unwrap();

    let res = client
        .delete(format!("{}/api/folders/{}", server.base_url, folder_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    // The device survives, rehomed to the system tenant's root folder.
    let device = client
        .get(format!("{}/api/devices/{}", server.base_url, device_id))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_ne!(device["folder_id"], json!(folder_id));

    let res = client
        .get(format!("{}/api/folders/{}", server.base_url, folder_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn root_folder_cannot_be_deleted_or_reparented() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let tenant = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("rooted") }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let tenant_id = tenant["id"].as_i64().unwrap();

    let folders = client
        .get(format!("{}/api/folders?tenant_id={}", server.base_url, tenant_id))
        .bearer_auth(&token)
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let root_id = folders["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["parent_id"].is_null())
        .and_then(|f| f["id"].as_i64())
        .unwrap();

    let res = client
        .delete(format!("{}/api/folders/{}", server.base_url, root_id))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn tenant_heartbeat_settings_validate_and_apply() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let tenant = client
        .post(format!("{}/api/tenants", server.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": common::unique("tuned") }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    let tenant_id = tenant["id"].as_i64().unwrap();

    let res = client
        .put(format!("{}/api/tenants/{}/settings", server.base_url, tenant_id))
        .bearer_auth(&token)
        .json(&json!({ "heartbeat_s": 0 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .put(format!("{}/api/tenants/{}/settings", server.base_url, tenant_id))
        .bearer_auth(&token)
        .json(&json!({ "heartbeat_s": 120 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let settings = res.json::<serde_json::Value>().await?;
    assert_eq!(settings["heartbeat_s"], json!(120));
    Ok(())
}

#[tokio::test]
async fn share_url_gates_the_connection_flow() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let serial = common::unique("share-sn");
    client
        .post(format!("{}/devices/register", server.base_url))
        .json(&json!({ "name": common::unique("shared"), "serial_number": serial }))
        .send()
        .await?;

    // Out-of-range lifetime is rejected outright.
    let res = client
        .post(format!("{}/api/devices/{}/share", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "expiration_minutes": 100000 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client
        .post(format!("{}/api/devices/{}/share", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "expiration_minutes": 5 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let share = res.json::<serde_json::Value>().await?;
    let share_url = share["share_url"].as_str().unwrap().to_string();

    // Valid token but no credentials pushed yet.
    let res = client
        .get(format!("{}/connect/{}", server.base_url, share_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Agent pushes both credential halves with its heartbeat.
    client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "remote_access_id": "ra-17", "remote_access_password": "s3cret" }))
        .send()
        .await?;

    let res = client
        .get(format!("{}/connect/{}", server.base_url, share_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let info = res.json::<serde_json::Value>().await?;
    assert_eq!(info["remote_access_id"], json!("ra-17"));
    assert_eq!(info["remote_access_password"], json!("s3cret"));

    // Issuing a fresh share URL revokes the old token.
    let res = client
        .post(format!("{}/api/devices/{}/share", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "expiration_minutes": 5 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/connect/{}", server.base_url, share_url))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn lone_credential_halves_never_clobber_the_stored_pair() -> Result<()> {
    if !common::database_configured() {
        eprintln!("skipping: DATABASE_URL not set");
        return Ok(());
    }
    let server = common::ensure_server().await?;
    let client = reqwest::Client::new();
    let token = common::admin_token(server).await?;

    let serial = common::unique("merge-sn");
    client
        .post(format!("{}/devices/register", server.base_url))
        .json(&json!({ "name": common::unique("console"), "serial_number": serial }))
        .send()
        .await?;

    client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "remote_access_id": "ra-42", "remote_access_password": "original" }))
        .send()
        .await?;

    // A password with no id, whether the id is absent or an explicit null,
    // leaves the stored pair untouched.
    client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "remote_access_password": "clobber" }))
        .send()
        .await?;
    client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "remote_access_id": null, "remote_access_password": "clobber" }))
        .send()
        .await?;

    let res = client
        .post(format!("{}/api/devices/{}/share", server.base_url, serial))
        .bearer_auth(&token)
        .json(&json!({ "expiration_minutes": 5 }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let share = res.json::<serde_json::Value>().await?;
    let share_url = share["share_url"].as_str().unwrap();

    let info = client
        .get(format!("{}/connect/{}", server.base_url, share_url))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(info["remote_access_id"], json!("ra-42"));
    assert_eq!(info["remote_access_password"], json!("original"));

    // A full pair replaces both halves together.
    client
        .post(format!("{}/devices/{}/heartbeat", server.base_url, serial))
        .json(&json!({ "remote_access_id": "ra-43", "remote_access_password": "rotated" }))
        .send()
        .await?;
    let info = client
        .get(format!("{}/connect/{}", server.base_url, share_url))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(info["remote_access_id"], json!("ra-43"));
    assert_eq!(info["remote_access_password"], json!("rotated"));
    Ok(())
}
