//! HTTP implementation of the ordering service contract.

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::models::{
    Coordinates, Ingredient, Menu, MenuDetails, MenuImage, NewUser, Order, ProfileUpdate,
    UserProfile,
};

use super::{ApiError, OrderingApi};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client for the SkyDeli ordering service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Send a request and map the response per the service's conventions:
    /// 200 carries a JSON body, 204 is a valid empty success (`None`), any
    /// other status becomes an [`ApiError`] carrying status and body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await.map_err(ApiError::Network)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if status.is_success() {
            let parsed = response
                .json::<T>()
                .await
                .context("failed to parse JSON response body")?;
            return Ok(Some(parsed));
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body).into())
    }

    /// A body-bearing endpoint answered 204; report the broken contract
    /// instead of fabricating an empty record.
    fn require<T>(resp: Option<T>, what: &str) -> Result<T> {
        resp.ok_or_else(|| {
            anyhow::Error::from(ApiError::InvalidResponse(format!(
                "{what} returned no content"
            )))
        })
    }

    pub async fn create_user(&self) -> Result<NewUser> {
        debug!("registering new user");
        let resp = self
            .execute(self.client.post(self.url("user")).json(&serde_json::json!({})))
            .await?;
        Self::require(resp, "user registration")
    }

    pub async fn get_user(&self, uid: i64, sid: &str) -> Result<UserProfile> {
        let url = self.url(&format!("user/{uid}"));
        let resp = self
            .execute(self.client.get(url).query(&[("sid", sid)]))
            .await?;
        Self::require(resp, "user fetch")
    }

    pub async fn update_user(&self, uid: i64, sid: &str, update: &ProfileUpdate) -> Result<()> {
        #[derive(Serialize)]
        struct Body<'a> {
            sid: &'a str,
            #[serde(flatten)]
            update: &'a ProfileUpdate,
        }

        let url = self.url(&format!("user/{uid}"));
        debug!(uid, "updating user profile");
        // The server answers 204; any body it might send is ignored.
        let _: Option<serde_json::Value> = self
            .execute(self.client.put(url).json(&Body { sid, update }))
            .await?;
        Ok(())
    }

    pub async fn list_menus(&self, sid: &str, near: Coordinates) -> Result<Vec<Menu>> {
        let resp = self
            .execute(self.client.get(self.url("menu")).query(&[
                ("lat", near.lat.to_string()),
                ("lng", near.lng.to_string()),
                ("sid", sid.to_string()),
            ]))
            .await?;
        Self::require(resp, "menu list")
    }

    pub async fn get_menu(&self, mid: i64, sid: &str, near: Coordinates) -> Result<MenuDetails> {
        let url = self.url(&format!("menu/{mid}"));
        let resp = self
            .execute(self.client.get(url).query(&[
                ("lat", near.lat.to_string()),
                ("lng", near.lng.to_string()),
                ("sid", sid.to_string()),
            ]))
            .await?;
        Self::require(resp, "menu detail")
    }

    pub async fn get_ingredients(&self, mid: i64, sid: &str) -> Result<Vec<Ingredient>> {
        let url = self.url(&format!("menu/{mid}/ingredients"));
        let resp = self
            .execute(self.client.get(url).query(&[("sid", sid)]))
            .await?;
        Self::require(resp, "ingredient list")
    }

    pub async fn get_image(&self, mid: i64, sid: &str) -> Result<MenuImage> {
        let url = self.url(&format!("menu/{mid}/image"));
        debug!(mid, "fetching menu image");
        let resp = self
            .execute(self.client.get(url).query(&[("sid", sid)]))
            .await?;
        Self::require(resp, "menu image")
    }

    pub async fn create_order(&self, mid: i64, sid: &str, delivery: Coordinates) -> Result<Order> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            sid: &'a str,
            delivery_location: Coordinates,
        }

        let url = self.url(&format!("menu/{mid}/buy"));
        debug!(mid, "placing order");
        let resp = self
            .execute(self.client.post(url).json(&Body {
                sid,
                delivery_location: delivery,
            }))
            .await?;
        Self::require(resp, "order creation")
    }

    pub async fn get_order(&self, oid: i64, sid: &str) -> Result<Order> {
        let url = self.url(&format!("order/{oid}"));
        let resp = self
            .execute(self.client.get(url).query(&[("sid", sid)]))
            .await?;
        Self::require(resp, "order fetch")
    }
}

impl OrderingApi for ApiClient {
    async fn create_user(&self) -> Result<NewUser> {
        ApiClient::create_user(self).await
    }

    async fn get_user(&self, uid: i64, sid: &str) -> Result<UserProfile> {
        ApiClient::get_user(self, uid, sid).await
    }

    async fn update_user(&self, uid: i64, sid: &str, update: &ProfileUpdate) -> Result<()> {
        ApiClient::update_user(self, uid, sid, update).await
    }

    async fn list_menus(&self, sid: &str, near: Coordinates) -> Result<Vec<Menu>> {
        ApiClient::list_menus(self, sid, near).await
    }

    async fn get_menu(&self, mid: i64, sid: &str, near: Coordinates) -> Result<MenuDetails> {
        ApiClient::get_menu(self, mid, sid, near).await
    }

    async fn get_ingredients(&self, mid: i64, sid: &str) -> Result<Vec<Ingredient>> {
        ApiClient::get_ingredients(self, mid, sid).await
    }

    async fn get_image(&self, mid: i64, sid: &str) -> Result<MenuImage> {
        ApiClient::get_image(self, mid, sid).await
    }

    async fn create_order(&self, mid: i64, sid: &str, delivery: Coordinates) -> Result<Order> {
        ApiClient::create_order(self, mid, sid, delivery).await
    }

    async fn get_order(&self, oid: i64, sid: &str) -> Result<Order> {
        ApiClient::get_order(self, oid, sid).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_duplicate_slash() {
        let client = ApiClient::new("https://example.com/api/").unwrap();
        assert_eq!(client.url("menu/3/image"), "https://example.com/api/menu/3/image");
    }

    #[test]
    fn missing_body_on_a_body_bearing_endpoint_is_distinguished() {
        let err = ApiClient::require::<i32>(None, "order fetch").unwrap_err();
        match err.downcast_ref::<ApiError>() {
            Some(ApiError::InvalidResponse(message)) => {
                assert!(message.contains("order fetch"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn present_body_passes_through_require() {
        assert_eq!(ApiClient::require(Some(5), "order fetch").unwrap(), 5);
    }

    #[test]
    fn order_body_wire_shape() {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            sid: &'a str,
            delivery_location: Coordinates,
        }

        let body = Body {
            sid: "tok",
            delivery_location: Coordinates::new(45.0, 9.0),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["sid"], "tok");
        assert_eq!(json["deliveryLocation"]["lat"], 45.0);
    }
}
