use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::error::DeskError;
use crate::model::{Analysis, Asset, Candle, IngestionStatus, Interval, Signal};

/// Boundary to the market, watchlist, analysis and ingestion services.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    async fn fetch_market(&self) -> Result<Vec<Asset>, DeskError>;

    async fn fetch_watchlist(&self) -> Result<Vec<Asset>, DeskError>;

    async fn save_watchlist(&self, assets: &[Asset]) -> Result<(), DeskError>;

    async fn delete_watchlist_entry(&self, symbol: &str) -> Result<(), DeskError>;

    async fn fetch_analysis(&self, symbol: &str, interval: Interval)
    -> Result<Analysis, DeskError>;

    async fn send_chat_query(&self, symbol: &str, text: &str) -> Result<String, DeskError>;

    async fn trigger_ingestion(&self) -> Result<IngestionStatus, DeskError>;
}

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5000/api";

pub struct HttpGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SaveWatchlistRequest<'a> {
    coins: &'a [Asset],
}

#[derive(Debug, Serialize)]
struct DeleteWatchlistRequest<'a> {
    symbol: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    symbol: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    chart: Vec<Candle>,
    ai_analysis: SignalPayload,
}

#[derive(Debug, Deserialize)]
struct SignalPayload {
    signal: String,
    #[serde(default)]
    rsi: f64,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    reply: String,
}

impl AnalyzeResponse {
    fn into_analysis(self) -> Analysis {
        let mut history = self.chart;
        history.sort_by_key(|candle| candle.timestamp);
        Analysis {
            history,
            signal: Signal {
                label: self.ai_analysis.signal,
                rsi: self.ai_analysis.rsi,
                reason: self.ai_analysis.reason,
            },
        }
    }
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Result<Self, anyhow::Error> {
        Ok(HttpGateway {
            client: build_http_client()?,
            base_url: normalize_base_url(base_url),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DeskError> {
        self.client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|err| DeskError::transport(operation, err))?
            .error_for_status()
            .map_err(|err| DeskError::transport(operation, err))?
            .json::<T>()
            .await
            .map_err(|err| DeskError::transport(operation, err))
    }

    async fn post_json<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T, DeskError> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|err| DeskError::transport(operation, err))?
            .error_for_status()
            .map_err(|err| DeskError::transport(operation, err))?
            .json::<T>()
            .await
            .map_err(|err| DeskError::transport(operation, err))
    }
}

#[async_trait]
impl MarketGateway for HttpGateway {
    async fn fetch_market(&self) -> Result<Vec<Asset>, DeskError> {
        self.get_json("fetch market", "market", &[]).await
    }

    async fn fetch_watchlist(&self) -> Result<Vec<Asset>, DeskError> {
        self.get_json("fetch watchlist", "watchlist", &[]).await
    }

    async fn save_watchlist(&self, assets: &[Asset]) -> Result<(), DeskError> {
        let response: StatusResponse = self
            .post_json("save watchlist", "watchlist", &SaveWatchlistRequest { coins: assets })
            .await?;
        ensure_accepted("save watchlist", response)
    }

    async fn delete_watchlist_entry(&self, symbol: &str) -> Result<(), DeskError> {
        let response: StatusResponse = self
            .post_json(
                "delete watchlist entry",
                "watchlist/delete",
                &DeleteWatchlistRequest { symbol },
            )
            .await?;
        ensure_accepted("delete watchlist entry", response)
    }

    async fn fetch_analysis(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Analysis, DeskError> {
        let response: AnalyzeResponse = self
            .get_json(
                "fetch analysis",
                &format!("analyze/{symbol}"),
                &[("interval", interval.as_str())],
            )
            .await?;
        Ok(response.into_analysis())
    }

    async fn send_chat_query(&self, symbol: &str, text: &str) -> Result<String, DeskError> {
        let response: ChatResponse = self
            .post_json(
                "chat",
                "chat",
                &ChatRequestBody {
                    symbol,
                    message: text,
                },
            )
            .await?;
        Ok(response.reply)
    }

    async fn trigger_ingestion(&self) -> Result<IngestionStatus, DeskError> {
        let response: StatusResponse = self
            .post_json("trigger ingestion", "run-spider", &serde_json::json!({}))
            .await?;
        Ok(ingestion_status(response))
    }
}

fn ensure_accepted(operation: &'static str, response: StatusResponse) -> Result<(), DeskError> {
    if response.status.eq_ignore_ascii_case("error") {
        return Err(DeskError::transport(
            operation,
            response
                .message
                .unwrap_or_else(|| "store rejected the request".to_string()),
        ));
    }
    Ok(())
}

fn ingestion_status(response: StatusResponse) -> IngestionStatus {
    if response.status.eq_ignore_ascii_case("success") {
        IngestionStatus::Success
    } else {
        IngestionStatus::Failure(response.message.unwrap_or(response.status))
    }
}

fn normalize_base_url(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn build_http_client() -> Result<Client, anyhow::Error> {
    Ok(ClientBuilder::new()
        .connect_timeout(Duration::from_secs(5))
        .read_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(20))
        .build()?)
}
