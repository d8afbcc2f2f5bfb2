//! The device's single authenticated identity record.
//!
//! A `UserSession` is created once via remote registration, enriched from
//! server responses through an explicit merge, mutated on profile edits and
//! order state changes, and destroyed only on account reset. Server
//! responses are parsed into dedicated partial types (`UserProfile`,
//! `ProfileUpdate`) and folded in field by field so an unexpectedly-shaped
//! response can never clobber unrelated fields.

use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// The one session record persisted on the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub uid: i64,
    /// Secret token issued at registration; authenticates every request.
    pub sid: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub card_full_name: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_expire_month: Option<i32>,
    #[serde(default)]
    pub card_expire_year: Option<i32>,
    #[serde(default, rename = "cardCVV")]
    pub card_cvv: Option<String>,
    #[serde(default, rename = "lastOid")]
    pub last_order_id: Option<i64>,
    #[serde(default, rename = "orderStatus")]
    pub last_order_status: Option<OrderStatus>,
}

impl UserSession {
    /// A freshly registered session carries only the server-issued identity.
    pub fn new(uid: i64, sid: String) -> Self {
        Self {
            uid,
            sid,
            first_name: None,
            last_name: None,
            card_full_name: None,
            card_number: None,
            card_expire_month: None,
            card_expire_year: None,
            card_cvv: None,
            last_order_id: None,
            last_order_status: None,
        }
    }

    /// Fold a server user response into this session.
    ///
    /// Only the enumerated profile and order fields may be overwritten, and
    /// only when the server actually sent a value. Identity (`uid`/`sid`)
    /// is never touched by a merge.
    pub fn merge_profile(&mut self, profile: &UserProfile) {
        if let Some(v) = &profile.first_name {
            self.first_name = Some(v.clone());
        }
        if let Some(v) = &profile.last_name {
            self.last_name = Some(v.clone());
        }
        if let Some(v) = &profile.card_full_name {
            self.card_full_name = Some(v.clone());
        }
        if let Some(v) = &profile.card_number {
            self.card_number = Some(v.clone());
        }
        if let Some(v) = profile.card_expire_month {
            self.card_expire_month = Some(v);
        }
        if let Some(v) = profile.card_expire_year {
            self.card_expire_year = Some(v);
        }
        if let Some(v) = &profile.card_cvv {
            self.card_cvv = Some(v.clone());
        }
        if let Some(v) = profile.last_oid {
            self.last_order_id = Some(v);
        }
        if let Some(v) = profile.order_status {
            self.last_order_status = Some(v);
        }
    }

    /// Apply a locally edited profile after the server accepted it.
    pub fn apply_update(&mut self, update: &ProfileUpdate) {
        self.first_name = Some(update.first_name.clone());
        self.last_name = Some(update.last_name.clone());
        self.card_full_name = Some(update.card_full_name.clone());
        self.card_number = Some(update.card_number.clone());
        self.card_expire_month = Some(update.card_expire_month);
        self.card_expire_year = Some(update.card_expire_year);
        self.card_cvv = Some(update.card_cvv.clone());
    }

    /// Record the order the user most recently placed or observed.
    pub fn record_order(&mut self, oid: i64, status: OrderStatus) {
        self.last_order_id = Some(oid);
        self.last_order_status = Some(status);
    }

    /// True when every profile and payment field needed to place an order
    /// is present.
    pub fn is_complete(&self) -> bool {
        self.first_name.is_some()
            && self.last_name.is_some()
            && self.card_full_name.is_some()
            && self.card_number.is_some()
            && self.card_expire_month.is_some()
            && self.card_expire_year.is_some()
            && self.card_cvv.is_some()
    }
}

/// Identity pair returned by the registration endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub uid: i64,
    pub sid: String,
}

/// Partial user record as returned by `GET /user/{uid}`.
///
/// Every field is optional on the wire; unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub card_full_name: Option<String>,
    #[serde(default)]
    pub card_number: Option<String>,
    #[serde(default)]
    pub card_expire_month: Option<i32>,
    #[serde(default)]
    pub card_expire_year: Option<i32>,
    #[serde(default, rename = "cardCVV")]
    pub card_cvv: Option<String>,
    #[serde(default, rename = "lastOid")]
    pub last_oid: Option<i64>,
    #[serde(default, rename = "orderStatus")]
    pub order_status: Option<OrderStatus>,
}

/// Body of a profile edit sent to `PUT /user/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub card_full_name: String,
    pub card_number: String,
    pub card_expire_month: i32,
    pub card_expire_year: i32,
    #[serde(rename = "cardCVV")]
    pub card_cvv: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_name(first: &str) -> UserProfile {
        UserProfile {
            first_name: Some(first.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn merge_keeps_identity_and_absent_fields() {
        let mut session = UserSession::new(7, "secret".into());
        session.card_number = Some("4242424242424242".into());

        session.merge_profile(&profile_with_name("Ada"));

        assert_eq!(session.uid, 7);
        assert_eq!(session.sid, "secret");
        assert_eq!(session.first_name.as_deref(), Some("Ada"));
        // A response without card data must not erase what we had.
        assert_eq!(session.card_number.as_deref(), Some("4242424242424242"));
    }

    #[test]
    fn merge_folds_order_state() {
        let mut session = UserSession::new(1, "s".into());
        let profile = UserProfile {
            last_oid: Some(55),
            order_status: Some(OrderStatus::OnDelivery),
            ..Default::default()
        };
        session.merge_profile(&profile);
        assert_eq!(session.last_order_id, Some(55));
        assert_eq!(session.last_order_status, Some(OrderStatus::OnDelivery));
    }

    #[test]
    fn unknown_response_fields_are_ignored() {
        let json = r#"{"firstName":"Ada","favouriteColor":"green"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.first_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn completeness_requires_all_card_fields() {
        let mut session = UserSession::new(1, "s".into());
        assert!(!session.is_complete());

        session.apply_update(&ProfileUpdate {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            card_full_name: "Ada Lovelace".into(),
            card_number: "4242424242424242".into(),
            card_expire_month: 12,
            card_expire_year: 2030,
            card_cvv: "123".into(),
        });
        assert!(session.is_complete());
    }

    #[test]
    fn session_round_trips_through_json() {
        let mut session = UserSession::new(3, "tok".into());
        session.record_order(9, OrderStatus::Completed);
        let json = serde_json::to_string(&session).unwrap();
        let back: UserSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
