use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// Integration suites need a built server binary plus a reachable database;
/// they are opt-in via OPSDESK_IT=1 so a plain `cargo test` stays green.
pub fn integration_enabled() -> bool {
    std::env::var("OPSDESK_IT").as_deref() == Ok("1")
}

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    #[allow(dead_code)]
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Spawn the already-built binary to keep start fast during tests
        // Assumes debug profile; adjust if you run tests with --release
        let mut cmd = Command::new("target/debug/opsdesk-api");
        cmd.env("OPSDESK_PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // Inherit environment so the server can see DATABASE_URL and JWT_SECRET from .env
        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                // Consider server ready on any non-404 response
                if resp.status() == StatusCode::OK || resp.status() == StatusCode::SERVICE_UNAVAILABLE {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Unique email per test run; registration has a unique constraint
#[allow(dead_code)]
pub fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("{}+{}@example.test", prefix, nanos)
}

/// Register a fresh company and return (token, company_id)
#[allow(dead_code)]
pub async fn register_company(base_url: &str, prefix: &str) -> Result<(String, i64)> {
    let client = reqwest::Client::new();
    let email = unique_email(prefix);
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&serde_json::json!({
            "company_name": format!("{} Test Co", prefix),
            "email": email,
            "password": "correct-horse-battery",
            "first_name": "Test",
            "last_name": "Admin",
        }))
        .send()
        .await?;
    anyhow::ensure!(
        resp.status() == StatusCode::CREATED,
        "registration failed: {}",
        resp.status()
    );
    let body: serde_json::Value = resp.json().await?;
    let token = body["data"]["token"]
        .as_str()
        .context("missing token in registration response")?
        .to_string();
    let company_id = body["data"]["company"]["id"]
        .as_i64()
        .context("missing company id in registration response")?;
    Ok((token, company_id))
}
