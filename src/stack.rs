//! One-time post-install configuration for the legacy flow.
//!
//! Che only materializes its on-disk layout after a first boot, so the
//! installer starts Che, stops it, copies the packaged templates into the
//! live data directory, and starts it again. Once it is back up the
//! packaged stack is registered through the REST API and its icon
//! uploaded.
//!
//! REST steps never abort the hook on connection problems: they are logged
//! and reported as [`StepOutcome::Recovered`], which can leave the
//! configuration partially applied.

use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};

use crate::error::{InstallError, Result};
use crate::outcome::StepOutcome;
use crate::service::ServiceEndpoint;

/// What happened to the stack registration steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackReport {
    /// Identifier the service generated for the stack.
    pub stack: StepOutcome<String>,
    pub icon: StepOutcome,
}

/// Copy `names` from `source_dir` into `dest_dir`, overwriting.
///
/// Returns the number of files copied. Any I/O failure is fatal.
pub async fn copy_templates(source_dir: &Path, names: &[String], dest_dir: &Path) -> Result<usize> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|source| InstallError::Template {
            path: dest_dir.to_path_buf(),
            source,
        })?;

    for name in names {
        let from = source_dir.join(name);
        let to = dest_dir.join(name);
        tokio::fs::copy(&from, &to)
            .await
            .map_err(|source| InstallError::Template { path: from.clone(), source })?;
        tracing::debug!("Copied {} to {}", from.display(), to.display());
    }

    tracing::info!("Copied {} template(s) into {}", names.len(), dest_dir.display());
    Ok(names.len())
}

/// Registers packaged stacks with a running Che.
pub struct StackRegistrar {
    endpoint: ServiceEndpoint,
    http_client: reqwest::Client,
}

impl StackRegistrar {
    pub fn new(endpoint: ServiceEndpoint, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint,
            http_client,
        }
    }

    /// Register the stack in `descriptor`, then upload `icon` for it.
    ///
    /// The icon upload only runs when registration produced an id.
    pub async fn register_with_icon(&self, descriptor: &Path, icon: &Path) -> Result<StackReport> {
        let stack = self.register(descriptor).await?;

        let icon = match stack.done() {
            Some(id) => self.upload_icon(id, icon).await?,
            None => {
                tracing::warn!("Stack was not registered, skipping icon upload");
                StepOutcome::skipped("stack registration did not return an id")
            }
        };

        Ok(StackReport { stack, icon })
    }

    /// `POST /api/stack` with the descriptor; expects 201 and an `id`.
    pub async fn register(&self, descriptor: &Path) -> Result<StepOutcome<String>> {
        let raw = tokio::fs::read_to_string(descriptor)
            .await
            .map_err(|source| InstallError::Template {
                path: descriptor.to_path_buf(),
                source,
            })?;
        let body: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| InstallError::StackDescriptor {
                path: descriptor.to_path_buf(),
                reason: e.to_string(),
            })?;

        let url = self.endpoint.url_for("/api/stack");
        tracing::info!("Registering stack from {}", descriptor.display());

        let resp = match self.http_client.post(&url).json(&body).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Stack registration failed: {}", e);
                return Ok(StepOutcome::recovered(e.to_string()));
            }
        };

        if resp.status() != StatusCode::CREATED {
            tracing::warn!("Stack registration answered {}", resp.status());
            return Ok(StepOutcome::recovered(format!(
                "unexpected status {}",
                resp.status()
            )));
        }

        // A body cut off in transit is a connection problem, not a bad answer.
        let raw = match resp.bytes().await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Reading stack registration response failed: {}", e);
                return Ok(StepOutcome::recovered(e.to_string()));
            }
        };
        let created: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| InstallError::StackResponse {
                reason: e.to_string(),
            })?;
        let id = created
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| InstallError::StackResponse {
                reason: "response has no 'id' field".to_string(),
            })?;

        tracing::info!("Registered stack {}", id);
        Ok(StepOutcome::Done(id.to_string()))
    }

    /// `POST /api/stack/{id}/icon` as multipart form data; expects 200.
    pub async fn upload_icon(&self, id: &str, icon: &Path) -> Result<StepOutcome> {
        let bytes = tokio::fs::read(icon)
            .await
            .map_err(|source| InstallError::Template {
                path: icon.to_path_buf(),
                source,
            })?;

        let file_name = icon
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "icon".to_string());
        let part = match Part::bytes(bytes).file_name(file_name).mime_str(icon_mime(icon)) {
            Ok(part) => part,
            Err(e) => return Ok(StepOutcome::recovered(e.to_string())),
        };
        let form = Form::new().part("body", part);

        let url = self.endpoint.url_for(&icon_path(id));
        let resp = match self.http_client.post(&url).multipart(form).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!("Icon upload failed: {}", e);
                return Ok(StepOutcome::recovered(e.to_string()));
            }
        };

        if resp.status() != StatusCode::OK {
            tracing::warn!("Icon upload answered {}", resp.status());
            return Ok(StepOutcome::recovered(format!(
                "unexpected status {}",
                resp.status()
            )));
        }

        tracing::info!("Uploaded icon for stack {}", id);
        Ok(StepOutcome::Done(()))
    }
}

/// REST path of a stack's icon.
pub fn icon_path(id: &str) -> String {
    format!("/api/stack/{}/icon", id)
}

fn icon_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::tempdir;

    use super::*;
    use crate::testing::{MockCheServer, StackResponse};

    struct StackFiles {
        descriptor: PathBuf,
        icon: PathBuf,
    }

    fn files(dir: &Path) -> StackFiles {
        let descriptor = dir.join("stack.json");
        let icon = dir.join("stack-icon.svg");
        std::fs::write(&descriptor, r#"{"name":"java-maven","tags":["java"]}"#).unwrap();
        std::fs::write(&icon, "<svg/>").unwrap();
        StackFiles { descriptor, icon }
    }

    fn registrar(endpoint: ServiceEndpoint) -> StackRegistrar {
        StackRegistrar::new(endpoint, Duration::from_secs(2))
    }

    #[test]
    fn test_icon_path_and_mime() {
        assert_eq!(icon_path("abc123"), "/api/stack/abc123/icon");
        assert_eq!(icon_mime(Path::new("a.SVG")), "image/svg+xml");
        assert_eq!(icon_mime(Path::new("a.png")), "image/png");
        assert_eq!(icon_mime(Path::new("a")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_copy_templates_overwrites() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let live = dst.path().join("instance/data/templates");
        std::fs::create_dir_all(&live).unwrap();
        std::fs::write(src.path().join("che.env"), "CHE_FOO=new").unwrap();
        std::fs::write(src.path().join("stacks.json"), "[]").unwrap();
        std::fs::write(live.join("che.env"), "CHE_FOO=old").unwrap();

        let names = vec!["che.env".to_string(), "stacks.json".to_string()];
        let copied = copy_templates(src.path(), &names, &live).await.unwrap();

        assert_eq!(copied, 2);
        assert_eq!(std::fs::read_to_string(live.join("che.env")).unwrap(), "CHE_FOO=new");
    }

    #[tokio::test]
    async fn test_copy_missing_template_is_fatal() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let err = copy_templates(src.path(), &["missing.json".to_string()], dst.path())
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Template { .. }));
    }

    #[tokio::test]
    async fn test_register_then_upload_icon_to_returned_id() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());
        let server = MockCheServer::builder()
            .stack_response(StackResponse::Created(r#"{"id":"abc123"}"#.to_string()))
            .start()
            .await;

        let report = registrar(server.endpoint())
            .register_with_icon(&files.descriptor, &files.icon)
            .await
            .unwrap();

        assert_eq!(report.stack, StepOutcome::Done("abc123".to_string()));
        assert_eq!(report.icon, StepOutcome::Done(()));

        let posts = server.posts();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].path, "/api/stack");
        assert_eq!(
            posts[0].json.as_ref().and_then(|j| j.get("name")).and_then(|v| v.as_str()),
            Some("java-maven")
        );
        assert_eq!(posts[1].path, "/api/stack/abc123/icon");
        assert!(
            posts[1]
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("multipart/form-data"))
        );
    }

    /// An endpoint nothing listens on.
    fn closed_endpoint() -> ServiceEndpoint {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        ServiceEndpoint {
            host: "127.0.0.1".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_skips_icon() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());

        let report = registrar(closed_endpoint())
            .register_with_icon(&files.descriptor, &files.icon)
            .await
            .unwrap();

        assert!(matches!(report.stack, StepOutcome::Recovered { .. }));
        assert!(matches!(report.icon, StepOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_unexpected_status_is_recovered() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());
        let server = MockCheServer::builder()
            .stack_response(StackResponse::Status(409))
            .start()
            .await;

        let report = registrar(server.endpoint())
            .register_with_icon(&files.descriptor, &files.icon)
            .await
            .unwrap();

        assert!(matches!(report.stack, StepOutcome::Recovered { .. }));
        assert!(matches!(report.icon, StepOutcome::Skipped { .. }));
        assert_eq!(server.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_icon_is_recovered() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());
        let server = MockCheServer::builder()
            .stack_response(StackResponse::Created(r#"{"id":"abc123"}"#.to_string()))
            .icon_status(500)
            .start()
            .await;

        let report = registrar(server.endpoint())
            .register_with_icon(&files.descriptor, &files.icon)
            .await
            .unwrap();

        assert_eq!(report.stack, StepOutcome::Done("abc123".to_string()));
        assert!(
            matches!(report.icon, StepOutcome::Recovered { ref reason } if reason.contains("500"))
        );
        let posts = server.posts();
        assert_eq!(posts[1].path, "/api/stack/abc123/icon");
        assert!(posts[1].body_len > "<svg/>".len());
    }

    #[tokio::test]
    async fn test_icon_upload_to_unreachable_service_is_recovered() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());

        let outcome = registrar(closed_endpoint())
            .upload_icon("abc123", &files.icon)
            .await
            .unwrap();

        assert!(matches!(outcome, StepOutcome::Recovered { .. }));
    }

    #[tokio::test]
    async fn test_truncated_created_body_is_recovered() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let dir = tempdir().unwrap();
        let files = files(dir.path());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        // Answers 201 but hangs up halfway through the promised body.
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            while !request.ends_with(b"}") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = socket
                .write_all(
                    b"HTTP/1.1 201 Created\r\ncontent-type: application/json\r\n\
                      content-length: 64\r\n\r\n{\"id\":\"ab",
                )
                .await;
            let _ = socket.shutdown().await;
        });

        let outcome = registrar(ServiceEndpoint {
            host: "127.0.0.1".to_string(),
            port,
        })
        .register(&files.descriptor)
        .await
        .unwrap();

        assert!(matches!(outcome, StepOutcome::Recovered { .. }));
    }

    #[tokio::test]
    async fn test_created_without_id_is_fatal() {
        let dir = tempdir().unwrap();
        let files = files(dir.path());
        let server = MockCheServer::builder()
            .stack_response(StackResponse::Created(r#"{"name":"java-maven"}"#.to_string()))
            .start()
            .await;

        let err = registrar(server.endpoint())
            .register(&files.descriptor)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::StackResponse { .. }));
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_fatal() {
        let dir = tempdir().unwrap();
        let descriptor = dir.path().join("stack.json");
        std::fs::write(&descriptor, "{broken").unwrap();

        let err = registrar(ServiceEndpoint::default())
            .register(&descriptor)
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::StackDescriptor { .. }));
    }
}
