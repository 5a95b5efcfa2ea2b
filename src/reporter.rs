use crate::report::HealthReport;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("не удалось сериализовать отчёт: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("ошибка запроса к супервизору: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("супервизор ответил статусом {0}")]
    Status(StatusCode),
}

#[derive(Debug, Clone)]
pub struct Reporter {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl Reporter {
    pub fn new(client: Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn send(&self, report: &HealthReport) -> Result<StatusCode, ReportError> {
        let body = report.to_json()?;
        let resp = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ReportError::Status(status));
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::HealthStatus;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};
    use tokio::net::TcpListener;

    fn report() -> HealthReport {
        HealthReport {
            device_id: "dev-1".to_string(),
            ts: 1_700_000_000,
            cpu_pct: 12.4,
            net_loss: 0.02,
            status: HealthStatus::Ok,
        }
    }

    async fn serve(app: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Url::parse(&format!("http://{addr}/report")).unwrap()
    }

    #[tokio::test]
    async fn posts_json_body_with_content_type() {
        let seen: Arc<Mutex<Option<(String, Vec<u8>)>>> = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let app = Router::new().route(
            "/report",
            post(move |headers: HeaderMap, body: axum::body::Bytes| {
                let captured = captured.clone();
                async move {
                    let content_type = headers
                        .get(axum::http::header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((content_type, body.to_vec()));
                    AxumStatus::NO_CONTENT
                }
            }),
        );
        let url = serve(app).await;

        let reporter = Reporter::new(Client::new(), url, Duration::from_secs(2));
        let status = reporter.send(&report()).await.expect("доставка отчёта");
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (content_type, body) = seen.lock().unwrap().take().expect("запрос не дошёл");
        assert_eq!(content_type, "application/json");
        let decoded: HealthReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded, report());
    }

    #[tokio::test]
    async fn server_error_is_surfaced() {
        let app = Router::new().route("/report", post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }));
        let url = serve(app).await;

        let reporter = Reporter::new(Client::new(), url, Duration::from_secs(2));
        match reporter.send(&report()).await {
            Err(ReportError::Status(code)) => assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR),
            other => panic!("ожидалась ошибка статуса, получено {other:?}"),
        }
    }

    #[tokio::test]
    async fn redirect_range_is_a_failure() {
        let app = Router::new().route("/report", post(|| async { AxumStatus::NOT_MODIFIED }));
        let url = serve(app).await;

        let reporter = Reporter::new(Client::new(), url, Duration::from_secs(2));
        assert!(matches!(
            reporter.send(&report()).await,
            Err(ReportError::Status(_))
        ));
    }

    #[tokio::test]
    async fn stalled_supervisor_times_out() {
        let app = Router::new().route(
            "/report",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                AxumStatus::OK
            }),
        );
        let url = serve(app).await;

        let reporter = Reporter::new(Client::new(), url, Duration::from_millis(200));
        let started = std::time::Instant::now();
        match reporter.send(&report()).await {
            Err(ReportError::Transport(err)) => assert!(err.is_timeout()),
            other => panic!("ожидался таймаут, получено {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn unreachable_supervisor_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/report")).unwrap();
        let reporter = Reporter::new(Client::new(), url, Duration::from_secs(2));
        assert!(matches!(
            reporter.send(&report()).await,
            Err(ReportError::Transport(_))
        ));
    }
}
