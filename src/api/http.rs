//! reqwest-backed implementation of [`InventoryApi`].
//!
//! Maps HTTP outcomes into the core taxonomy: any error before a response is
//! usable becomes [`ApiError::Transport`], any non-2xx response becomes
//! [`ApiError::Rejected`] with the server-provided message.

use super::{
    ApiError, ApiResult, CategoryRow, InventoryApi, ListQuery, MovementRow, Page, ProductRow,
    StockRow,
};
use crate::commands::{
    CategoryCreate, MovementOperation, MovementTransfer, ProductCreate, ProductUpdate, ScanEvent,
    StockCreate, StockUpdate, ThresholdCreate,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpInventoryApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpInventoryApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.request(method, self.url(path));
        if let Some(ref token) = self.token {
            req = req.header("Authorization", format!("Bearer {}", token));
        }
        req
    }

    async fn send_expect_ok(&self, req: reqwest::RequestBuilder) -> ApiResult<()> {
        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "no error body".to_string());
        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_expect_json<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> ApiResult<T> {
        let response = req
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "no error body".to_string());
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        // A 2xx whose body cannot be decoded counts as unusable transport
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Transport(format!("invalid response body: {}", e)))
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> ApiResult<()> {
        self.send_expect_ok(self.request(reqwest::Method::POST, path).json(body))
            .await
    }

    async fn list<T: DeserializeOwned>(&self, path: &str, query: &ListQuery) -> ApiResult<Page<T>> {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        if let Some(ref name) = query.name {
            params.push(("name", name.clone()));
        }
        self.send_expect_json(self.request(reqwest::Method::GET, path).query(&params))
            .await
    }
}

#[async_trait]
impl InventoryApi for HttpInventoryApi {
    async fn health(&self) -> ApiResult<()> {
        self.send_expect_ok(self.request(reqwest::Method::GET, "health"))
            .await
    }

    async fn create_product(&self, body: &ProductCreate) -> ApiResult<()> {
        self.post_json("products", body).await
    }

    async fn update_product(&self, product_id: i64, body: &ProductUpdate) -> ApiResult<()> {
        self.send_expect_ok(
            self.request(reqwest::Method::PUT, &format!("products/{}", product_id))
                .json(body),
        )
        .await
    }

    async fn delete_product(&self, product_id: i64) -> ApiResult<()> {
        self.send_expect_ok(
            self.request(reqwest::Method::DELETE, &format!("products/{}", product_id)),
        )
        .await
    }

    async fn create_stock(&self, body: &StockCreate) -> ApiResult<()> {
        self.post_json("stocks", body).await
    }

    async fn update_stock(&self, stock_id: i64, body: &StockUpdate) -> ApiResult<()> {
        self.send_expect_ok(
            self.request(reqwest::Method::PUT, &format!("stocks/{}", stock_id))
                .json(body),
        )
        .await
    }

    async fn create_category(&self, body: &CategoryCreate) -> ApiResult<()> {
        self.post_json("categories", body).await
    }

    async fn create_threshold(&self, body: &ThresholdCreate) -> ApiResult<()> {
        self.post_json("thresholds", body).await
    }

    async fn movement_in(&self, body: &MovementOperation) -> ApiResult<()> {
        self.post_json("movements/in", body).await
    }

    async fn movement_out(&self, body: &MovementOperation) -> ApiResult<()> {
        self.post_json("movements/out", body).await
    }

    async fn movement_adjust(&self, body: &MovementOperation) -> ApiResult<()> {
        self.post_json("movements/adjust", body).await
    }

    async fn movement_transfer(&self, body: &MovementTransfer) -> ApiResult<()> {
        self.post_json("movements/transfer", body).await
    }

    async fn create_scan_event(&self, body: &ScanEvent) -> ApiResult<()> {
        self.post_json("events", body).await
    }

    async fn list_products(&self, query: &ListQuery) -> ApiResult<Page<ProductRow>> {
        self.list("products", query).await
    }

    async fn get_product(&self, product_id: i64) -> ApiResult<ProductRow> {
        self.send_expect_json(
            self.request(reqwest::Method::GET, &format!("products/{}", product_id)),
        )
        .await
    }

    async fn list_stocks(&self, query: &ListQuery) -> ApiResult<Page<StockRow>> {
        self.list("stocks", query).await
    }

    async fn list_categories(&self, query: &ListQuery) -> ApiResult<Page<CategoryRow>> {
        self.list("categories", query).await
    }

    async fn list_movements(&self, query: &ListQuery) -> ApiResult<Page<MovementRow>> {
        self.list("movements", query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let api = HttpInventoryApi::new("http://localhost:8000/", None);
        assert_eq!(api.url("/health"), "http://localhost:8000/health");
        assert_eq!(api.url("products"), "http://localhost:8000/products");
    }
}
