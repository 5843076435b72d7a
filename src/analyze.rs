//! Hand a project to an external analysis service.
//!
//! The service is a plain HTTP endpoint that receives the project name and
//! the graph it lives in, and pulls whatever it needs from the graph itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{LibrarianConfig, WebhookConfig};
use crate::error::{LibrarianError, Result};
use crate::graph::query::project_exists;
use crate::graph::GraphBackend;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body sent to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub project: String,
    pub graph: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutcome {
    pub project: String,
    pub status: u16,
    /// Response body as returned by the service
    pub response: String,
}

/// Webhook settings, or a config error when none are configured.
pub fn webhook_config(config: &LibrarianConfig) -> Result<&WebhookConfig> {
    config
        .webhook
        .as_ref()
        .ok_or_else(|| LibrarianError::config("no [webhook] configured; analyze needs webhook.url"))
}

/// Check the project exists, then POST it to the webhook.
pub fn analyze_project(
    backend: &dyn GraphBackend,
    config: &LibrarianConfig,
    project: &str,
) -> Result<AnalyzeOutcome> {
    let hook = webhook_config(config)?;
    if !project_exists(backend, project)? {
        return Err(LibrarianError::Query(format!("no project named '{}' in the graph", project)));
    }
    let request = AnalyzeRequest {
        project: project.to_string(),
        graph: config.database.graph.clone(),
    };
    post(hook, &request)
}

fn post(hook: &WebhookConfig, request: &AnalyzeRequest) -> Result<AnalyzeOutcome> {
    let client = reqwest::blocking::Client::builder()
        .timeout(WEBHOOK_TIMEOUT)
        .user_agent(crate::version::user_agent())
        .build()
        .map_err(|e| LibrarianError::Webhook(format!("cannot build HTTP client: {e}")))?;

    let mut builder = client.post(&hook.url).json(request);
    if let Some(token) = hook.token.as_deref().filter(|t| !t.is_empty()) {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    tracing::info!(url = %hook.url, project = %request.project, "posting analysis request");
    let response = builder
        .send()
        .map_err(|e| LibrarianError::Webhook(format!("request failed: {e}")))?;

    let status = response.status();
    let body = response.text().unwrap_or_default();
    if !status.is_success() {
        return Err(LibrarianError::Webhook(format!(
            "webhook returned status {}: {}",
            status, body
        )));
    }
    Ok(AnalyzeOutcome {
        project: request.project.clone(),
        status: status.as_u16(),
        response: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FileLabel, GraphOp, MemoryGraph};
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn config_with_hook(url: &str) -> LibrarianConfig {
        let mut config = LibrarianConfig::default();
        config.webhook = Some(WebhookConfig {
            url: url.to_string(),
            token: Some("secret".to_string()),
        });
        config
    }

    fn graph_with_project(name: &str) -> MemoryGraph {
        let graph = MemoryGraph::new();
        let path = format!("/w/{}/main.py", name);
        graph
            .execute(&GraphOp::UpsertCode {
                path: path.clone(),
                name: "main.py".to_string(),
                language: "python".to_string(),
                modified: 0,
            })
            .unwrap();
        graph
            .execute(&GraphOp::Contain {
                label: FileLabel::Code,
                path,
                project: name.to_string(),
            })
            .unwrap();
        graph
    }

    /// Accept one request, capture head and body, reply with `status`.
    fn serve_once(status: &str) -> (String, mpsc::Receiver<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let status = status.to_string();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    length = v.trim().parse().unwrap();
                }
                head.push_str(&line);
            }
            let mut body = vec![0u8; length];
            reader.read_exact(&mut body).unwrap();
            let reply = format!("HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok", status);
            let mut stream = stream;
            stream.write_all(reply.as_bytes()).unwrap();
            tx.send((head, String::from_utf8(body).unwrap())).unwrap();
        });
        (url, rx)
    }

    #[test]
    fn test_missing_webhook_is_config_error() {
        let graph = graph_with_project("app");
        let config = LibrarianConfig::default();
        let err = analyze_project(&graph, &config, "app").unwrap_err();
        assert!(matches!(err, LibrarianError::Config(_)));
    }

    #[test]
    fn test_unknown_project_is_rejected_before_posting() {
        let graph = MemoryGraph::new();
        let config = config_with_hook("http://127.0.0.1:9/never");
        let err = analyze_project(&graph, &config, "ghost").unwrap_err();
        assert!(matches!(err, LibrarianError::Query(_)));
    }

    #[test]
    fn test_posts_project_with_bearer_token() {
        let (url, rx) = serve_once("200 OK");
        let graph = graph_with_project("app");
        let config = config_with_hook(&url);

        let outcome = analyze_project(&graph, &config, "app").unwrap();
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.response, "ok");

        let (head, body) = rx.recv().unwrap();
        assert!(head.to_ascii_lowercase().contains("authorization: bearer secret"));
        let sent: AnalyzeRequest = serde_json::from_str(&body).unwrap();
        assert_eq!(
            sent,
            AnalyzeRequest {
                project: "app".into(),
                graph: config.database.graph.clone(),
            }
        );
    }

    #[test]
    fn test_error_status_is_webhook_error() {
        let (url, _rx) = serve_once("500 Internal Server Error");
        let graph = graph_with_project("app");
        let err = analyze_project(&graph, &config_with_hook(&url), "app").unwrap_err();
        assert!(matches!(err, LibrarianError::Webhook(_)));
    }
}
