use async_trait::async_trait;
use log::trace;
use pts_common::Point;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    StatusCode,
};
use serde::Deserialize;

use super::{AccrualApi, AccrualApiError, AccrualOrder, AccrualStatus};

/// REST client for the accrual system, `GET {base}/api/orders/{number}`.
#[derive(Debug, Clone)]
pub struct RestAccrualClient {
    client: Client,
    base_url: String,
}

impl RestAccrualClient {
    pub fn new(base_url: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .user_agent("Points Gateway")
            .default_headers(headers)
            .build()
            .expect("Failed to create reqwest client");
        RestAccrualClient { client, base_url: base_url.trim_end_matches('/').to_string() }
    }
}

/// Wire format of a successful accrual response. `accrual` is absent while the reward has not been
/// calculated.
#[derive(Debug, Deserialize)]
struct AccrualResponse {
    order: String,
    status: AccrualStatus,
    #[serde(default)]
    accrual: f64,
}

#[async_trait]
impl AccrualApi for RestAccrualClient {
    async fn order_status(&self, number: &str) -> Result<AccrualOrder, AccrualApiError> {
        let url = format!("{}/api/orders/{number}", self.base_url);
        trace!("🛰️ Polling accrual system for order {number}");
        let res =
            self.client.get(&url).send().await.map_err(|e| AccrualApiError::Upstream(e.to_string()))?;
        match res.status() {
            StatusCode::TOO_MANY_REQUESTS => Err(AccrualApiError::RateLimited),
            status if status.is_success() => {
                let body: AccrualResponse =
                    res.json().await.map_err(|e| AccrualApiError::Upstream(format!("malformed response: {e}")))?;
                let accrual = Point::try_from(body.accrual)
                    .map_err(|e| AccrualApiError::Upstream(format!("malformed accrual amount: {e}")))?;
                trace!("🛰️ Accrual system reports order {number} as {}", body.status);
                Ok(AccrualOrder { number: body.order, status: body.status, accrual })
            },
            status => Err(AccrualApiError::Upstream(format!("accrual system returned {status}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn response_deserializes_with_and_without_accrual() {
        let full: AccrualResponse =
            serde_json::from_str(r#"{"order":"6122","status":"PROCESSED","accrual":300.12}"#).unwrap();
        assert_eq!(full.order, "6122");
        assert_eq!(full.status, AccrualStatus::Processed);
        assert_eq!(Point::try_from(full.accrual).unwrap(), Point::from(30012));

        let partial: AccrualResponse = serde_json::from_str(r#"{"order":"6122","status":"REGISTERED"}"#).unwrap();
        assert_eq!(partial.status, AccrualStatus::Registered);
        assert_eq!(partial.accrual, 0.0);
    }

    #[test]
    fn unknown_statuses_are_rejected() {
        assert!(serde_json::from_str::<AccrualResponse>(r#"{"order":"6122","status":"UNKNOWN"}"#).is_err());
    }

    #[test]
    fn base_url_is_normalized() {
        let client = RestAccrualClient::new("http://accrual.local/");
        assert_eq!(client.base_url, "http://accrual.local");
    }
}
