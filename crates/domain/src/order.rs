//! Order data model, status/carrier/platform inference, and return
//! eligibility — the pure-function laws from §8 ("Laws" and the eligibility
//! decision table in §4.1).

use serde::{Deserialize, Serialize};

/// Closed status enum. Unknown backend codes map to `Pending` (never an
/// error — see [`map_status`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

/// `10→pending, 20→preparing, 30→confirmed, 40→shipped, 50→delivered,
/// 99→cancelled`; unknown codes → `pending`.
pub fn map_status(code: &str) -> OrderStatus {
    match code {
        "10" => OrderStatus::Pending,
        "20" => OrderStatus::Preparing,
        "30" => OrderStatus::Confirmed,
        "40" => OrderStatus::Shipped,
        "50" => OrderStatus::Delivered,
        "99" => OrderStatus::Cancelled,
        _ => OrderStatus::Pending,
    }
}

/// A human-readable status message derived from status plus carrier/tracking
/// presence, used verbatim by `check_order_status`.
pub fn status_message(status: OrderStatus, carrier: Option<&str>, tracking: Option<&str>) -> String {
    match status {
        OrderStatus::Pending => "ご注文を承っております。発送準備が整い次第ご連絡いたします。".to_string(),
        OrderStatus::Preparing => "現在発送準備中です。".to_string(),
        OrderStatus::Confirmed => "ご注文内容を確認いたしました。まもなく発送いたします。".to_string(),
        OrderStatus::Shipped => match (carrier, tracking) {
            (Some(c), Some(t)) => format!("{c}にて発送済みです。追跡番号は{t}です。"),
            (Some(c), None) => format!("{c}にて発送済みです。"),
            (None, Some(t)) => format!("発送済みです。追跡番号は{t}です。"),
            (None, None) => "発送済みです。".to_string(),
        },
        OrderStatus::Delivered => "お届け済みです。".to_string(),
        OrderStatus::Cancelled => "このご注文はキャンセルされております。".to_string(),
        OrderStatus::Returned => "このご注文は返品手続きが完了しております。".to_string(),
    }
}

/// Substring match against a fixed carrier table. Unmatched returns the raw
/// string (the backend's delivery-method string, verbatim).
pub fn extract_carrier(delivery_method: &str) -> String {
    const TABLE: &[(&str, &str)] = &[
        ("ヤマト", "ヤマト運輸"),
        ("Yamato", "ヤマト運輸"),
        ("佐川", "佐川急便"),
        ("Sagawa", "佐川急便"),
        ("ゆうパック", "日本郵便(ゆうパック)"),
        ("郵便", "日本郵便"),
        ("Japan Post", "日本郵便"),
        ("西濃", "西濃運輸"),
        ("Seino", "西濃運輸"),
        ("福山", "福山通運"),
        ("Fukuyama", "福山通運"),
    ];
    for (needle, canonical) in TABLE {
        if delivery_method.contains(needle) {
            return (*canonical).to_string();
        }
    }
    delivery_method.to_string()
}

/// `rakuten*`/`1*` → rakuten; `amazon*`/`2*` → amazon; else shopify.
pub fn infer_platform(store_id: &str) -> &'static str {
    let lower = store_id.to_ascii_lowercase();
    if lower.starts_with("rakuten") || lower.starts_with('1') {
        "rakuten"
    } else if lower.starts_with("amazon") || lower.starts_with('2') {
        "amazon"
    } else {
        "shopify"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub qty: u32,
    pub price: u64,
}

/// Canonical order record. Read-only within the bridge except via the
/// explicit return-registration write (C1).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSummary {
    pub order_id: String,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub order_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipped_date: Option<String>,
    /// Not part of the carrier-facing summary table in the spec's data
    /// model, but required to evaluate "days-since-delivery" in the return
    /// eligibility table (§4.1) — carried alongside `shipped_date` from the
    /// backend's delivery-confirmation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    pub items: Vec<OrderItem>,
    pub total_amount: u64,
    pub platform: String,
}

impl OrderSummary {
    #[cfg(any(test, feature = "test-support"))]
    pub fn sample_for_tests() -> Self {
        Self {
            order_id: "R-42".into(),
            customer_name: "田中 太郎".into(),
            customer_email: Some("tanaka@example.com".into()),
            customer_phone: "08012345678".into(),
            status: OrderStatus::Shipped,
            order_date: "2024-03-01".into(),
            shipped_date: Some("2024-03-03".into()),
            delivered_date: None,
            carrier: Some("ヤマト運輸".into()),
            tracking_number: Some("1234-5678-9012".into()),
            items: vec![OrderItem {
                name: "美容クリーム".into(),
                qty: 1,
                price: 3200,
            }],
            total_amount: 3200,
            platform: "shopify".into(),
        }
    }
}

/// Reason a customer gives for a return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnReason {
    Defective,
    Damaged,
    WrongItem,
    SizeIssue,
    ImageDifferent,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCondition {
    Unopened,
    Opened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnRequestKind {
    Refund,
    Exchange,
}

/// Days elapsed between a `YYYY-MM-DD` date string and now. Returns `None`
/// if the date fails to parse (treated as "unknown" by the caller, which
/// should then require handoff rather than guess).
pub fn days_since(date: &str) -> Option<i64> {
    let parsed = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let today = chrono::Utc::now().date_naive();
    Some((today - parsed).num_days())
}

#[derive(Debug, Clone)]
pub struct ReturnEligibility {
    pub eligible: bool,
    pub requires_handoff: bool,
    pub reason: Option<&'static str>,
    /// Who pays return shipping, when eligible.
    pub shipper_pays: Option<&'static str>,
}

/// The return-eligibility decision table from §4.1. A total function over
/// `{reason} × {condition} × {total_amount} × {days_since_delivery}`.
pub fn return_eligibility(
    total_amount: u64,
    days_since_delivery: i64,
    reason: ReturnReason,
    condition: ItemCondition,
) -> ReturnEligibility {
    if total_amount >= 10_000 {
        return ReturnEligibility {
            eligible: false,
            requires_handoff: true,
            reason: Some("high-value, needs agent"),
            shipper_pays: None,
        };
    }
    if days_since_delivery > 7 {
        return ReturnEligibility {
            eligible: false,
            requires_handoff: true,
            reason: Some("return window expired"),
            shipper_pays: None,
        };
    }
    if matches!(
        reason,
        ReturnReason::Defective | ReturnReason::Damaged | ReturnReason::WrongItem
    ) {
        return ReturnEligibility {
            eligible: true,
            requires_handoff: false,
            reason: None,
            shipper_pays: Some("seller"),
        };
    }
    if condition == ItemCondition::Opened {
        return ReturnEligibility {
            eligible: false,
            requires_handoff: true,
            reason: Some("opened, customer-convenience return"),
            shipper_pays: None,
        };
    }
    ReturnEligibility {
        eligible: true,
        requires_handoff: false,
        reason: None,
        shipper_pays: Some("buyer"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_law() {
        assert_eq!(map_status("10"), OrderStatus::Pending);
        assert_eq!(map_status("20"), OrderStatus::Preparing);
        assert_eq!(map_status("30"), OrderStatus::Confirmed);
        assert_eq!(map_status("40"), OrderStatus::Shipped);
        assert_eq!(map_status("50"), OrderStatus::Delivered);
        assert_eq!(map_status("99"), OrderStatus::Cancelled);
        assert_eq!(map_status("77"), OrderStatus::Pending);
        assert_eq!(map_status(""), OrderStatus::Pending);
    }

    #[test]
    fn carrier_inference_matches_table() {
        assert_eq!(extract_carrier("ヤマト宅急便"), "ヤマト運輸");
        assert_eq!(extract_carrier("Sagawa Express"), "佐川急便");
        assert_eq!(extract_carrier("unknown logistics co"), "unknown logistics co");
    }

    #[test]
    fn platform_inference_by_prefix() {
        assert_eq!(infer_platform("rakuten-123"), "rakuten");
        assert_eq!(infer_platform("1abc"), "rakuten");
        assert_eq!(infer_platform("amazon-xyz"), "amazon");
        assert_eq!(infer_platform("2xyz"), "amazon");
        assert_eq!(infer_platform("storefront-9"), "shopify");
    }

    /// Enumerates `{reason} × {condition} × {total_amount ∈ 0,9999,10000} ×
    /// {days ∈ 0,7,8}` and asserts the documented outputs — the §8 Law.
    #[test]
    fn eligibility_is_a_total_function_over_the_decision_table() {
        let reasons = [
            ReturnReason::Defective,
            ReturnReason::Damaged,
            ReturnReason::WrongItem,
            ReturnReason::SizeIssue,
            ReturnReason::ImageDifferent,
            ReturnReason::Other,
        ];
        let conditions = [ItemCondition::Unopened, ItemCondition::Opened];
        let amounts = [0u64, 9999, 10_000];
        let days = [0i64, 7, 8];

        for reason in reasons {
            for condition in conditions {
                for amount in amounts {
                    for day in days {
                        let decision = return_eligibility(amount, day, reason, condition);
                        if amount >= 10_000 {
                            assert!(!decision.eligible);
                            assert!(decision.requires_handoff);
                        } else if day > 7 {
                            assert!(!decision.eligible);
                            assert!(decision.requires_handoff);
                        } else if matches!(
                            reason,
                            ReturnReason::Defective | ReturnReason::Damaged | ReturnReason::WrongItem
                        ) {
                            assert!(decision.eligible);
                            assert_eq!(decision.shipper_pays, Some("seller"));
                        } else if condition == ItemCondition::Opened {
                            assert!(!decision.eligible);
                            assert!(decision.requires_handoff);
                        } else {
                            assert!(decision.eligible);
                            assert_eq!(decision.shipper_pays, Some("buyer"));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn high_value_return_scenario_5() {
        let decision = return_eligibility(15_000, 2, ReturnReason::SizeIssue, ItemCondition::Unopened);
        assert!(!decision.eligible);
        assert!(decision.requires_handoff);
    }
}
