//! Tool dispatcher (§4.4): routes a parsed tool call to the order backend
//! or the email adapter and returns the `ToolResult` the mediator feeds
//! back to the model (or branches on, for `Handoff`).

use serde::Deserialize;

use vb_domain::call::IdentificationContext;
use vb_domain::order::{status_message, ItemCondition, ReturnReason, ReturnRequestKind};
use vb_domain::tool::{HandoffPriority, ToolResult};
use vb_order_backend::{OrderBackendClient, RegisterReturnRequest, SearchQuery};

use crate::email::{render, EmailAdapter, EmailParams, EmailTemplate};

/// Per-call context the dispatcher needs but doesn't own: the caller's
/// number (for argument-less `check_order_status`) and the identification
/// context captured at webhook time (for `send_email`'s customer lookup).
pub struct DispatchContext<'a> {
    pub caller_number: &'a str,
    pub identification: &'a IdentificationContext,
}

pub struct ToolDispatcher {
    order_backend: std::sync::Arc<OrderBackendClient>,
    email_adapter: Option<Box<dyn EmailAdapter>>,
    email_enabled: bool,
    shop_name: String,
}

#[derive(Deserialize, Default)]
struct CheckOrderStatusArgs {
    phone_number: Option<String>,
    order_id: Option<String>,
}

#[derive(Deserialize)]
struct RegisterReturnArgs {
    order_id: String,
    reason: ReturnReason,
    condition: ItemCondition,
    request: ReturnRequestKind,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct SendEmailArgs {
    template: EmailTemplate,
    #[serde(default)]
    order_id: Option<String>,
}

#[derive(Deserialize)]
struct TransferToHumanArgs {
    reason: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    priority: HandoffPriority,
}

impl ToolDispatcher {
    pub fn new(
        order_backend: std::sync::Arc<OrderBackendClient>,
        email_adapter: Option<Box<dyn EmailAdapter>>,
        email_enabled: bool,
        shop_name: String,
    ) -> Self {
        Self {
            order_backend,
            email_adapter,
            email_enabled,
            shop_name,
        }
    }

    pub async fn dispatch(
        &self,
        tool_name: &str,
        arguments: &serde_json::Value,
        ctx: &DispatchContext<'_>,
    ) -> ToolResult {
        match tool_name {
            "check_order_status" => self.check_order_status(arguments, ctx).await,
            "register_return" => self.register_return(arguments).await,
            "send_email" => self.send_email(arguments, ctx).await,
            "transfer_to_human" => Self::transfer_to_human(arguments),
            other => ToolResult::Structured {
                success: false,
                message: format!("unknown tool: {other}"),
                requires_handoff: false,
            },
        }
    }

    async fn check_order_status(
        &self,
        arguments: &serde_json::Value,
        ctx: &DispatchContext<'_>,
    ) -> ToolResult {
        let args: CheckOrderStatusArgs =
            serde_json::from_value(arguments.clone()).unwrap_or_default();

        if let Some(order_id) = args.order_id {
            return match self.order_backend.get_order(&order_id).await {
                Ok(Some(order)) => ToolResult::Text(status_message(
                    order.status,
                    order.carrier.as_deref(),
                    order.tracking_number.as_deref(),
                )),
                Ok(None) => ToolResult::Text("ご注文が見つかりませんでした。".to_string()),
                Err(e) => {
                    tracing::warn!(error = %e, "order lookup failed");
                    ToolResult::Text(
                        "只今システムに接続できません。しばらくしてから再度お試しください。"
                            .to_string(),
                    )
                }
            };
        }

        let phone = args.phone_number.unwrap_or_else(|| ctx.caller_number.to_string());
        let orders = match self
            .order_backend
            .search_orders(SearchQuery {
                phone: Some(phone),
                order_id: None,
                limit: 5,
            })
            .await
        {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!(error = %e, "phone search failed");
                return ToolResult::Text(
                    "只今システムに接続できません。しばらくしてから再度お試しください。"
                        .to_string(),
                );
            }
        };

        match orders.as_slice() {
            [] => ToolResult::Text("ご注文が見つかりませんでした。".to_string()),
            [order] => ToolResult::Text(status_message(
                order.status,
                order.carrier.as_deref(),
                order.tracking_number.as_deref(),
            )),
            many => {
                let list = many
                    .iter()
                    .map(|o| format!("注文番号{}（{}）", o.order_id, o.order_date))
                    .collect::<Vec<_>>()
                    .join("、");
                ToolResult::Text(format!(
                    "複数のご注文が見つかりました。{list}。どちらのご注文についてお伺いしますか。"
                ))
            }
        }
    }

    async fn register_return(&self, arguments: &serde_json::Value) -> ToolResult {
        let args: RegisterReturnArgs = match serde_json::from_value(arguments.clone()) {
            Ok(a) => a,
            Err(e) => {
                return ToolResult::Structured {
                    success: false,
                    message: format!("引数が不正です: {e}"),
                    requires_handoff: false,
                }
            }
        };

        let order = match self.order_backend.get_order(&args.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                return ToolResult::Structured {
                    success: false,
                    message: "ご注文が見つかりませんでした。".to_string(),
                    requires_handoff: false,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "order lookup failed during return registration");
                return ToolResult::Structured {
                    success: false,
                    message: "只今システムに接続できません。".to_string(),
                    requires_handoff: true,
                };
            }
        };

        let eligibility = self.order_backend.eligibility_for(&order, args.reason, args.condition);
        if !eligibility.eligible {
            let message = match eligibility.reason {
                Some("high-value, needs agent") => "高額商品のため、担当者が対応いたします。",
                Some("return window expired") => "返品期限を過ぎているため、担当者にご案内いたします。",
                Some("opened, customer-convenience return") => {
                    "開封済み商品のお客様都合による返品のため、担当者にご案内いたします。"
                }
                _ => "大変申し訳ございませんが、返品条件を満たしていないため、担当者にご案内いたします。",
            };
            return ToolResult::Structured {
                success: false,
                message: message.to_string(),
                requires_handoff: true,
            };
        }

        let req = RegisterReturnRequest {
            order_id: args.order_id,
            reason: args.reason,
            condition: args.condition,
            request: args.request,
            description: args.description,
        };

        match self.order_backend.register_return(req).await {
            Ok(resp) => ToolResult::Structured {
                success: resp.success,
                message: resp.message,
                requires_handoff: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "return write-back failed");
                ToolResult::Structured {
                    success: false,
                    message: "返品登録に失敗しました。時間をおいて再度お試しください。".to_string(),
                    requires_handoff: true,
                }
            }
        }
    }

    async fn send_email(
        &self,
        arguments: &serde_json::Value,
        ctx: &DispatchContext<'_>,
    ) -> ToolResult {
        let args: SendEmailArgs = match serde_json::from_value(arguments.clone()) {
            Ok(a) => a,
            Err(e) => {
                return ToolResult::Structured {
                    success: false,
                    message: format!("引数が不正です: {e}"),
                    requires_handoff: false,
                }
            }
        };

        if !self.email_enabled {
            return ToolResult::Structured {
                success: false,
                message: "現在メール送信機能は利用できません。".to_string(),
                requires_handoff: true,
            };
        }

        let order = match &args.order_id {
            Some(id) => self.order_backend.get_order(id).await.ok().flatten(),
            None => ctx.identification.latest_order().cloned(),
        };

        let customer_email = order.as_ref().and_then(|o| o.customer_email.clone());
        let Some(to) = customer_email else {
            return ToolResult::Structured {
                success: false,
                message: "メールアドレスが登録されていないようです。お客様のメールアドレスをお伺いできますか。".to_string(),
                requires_handoff: false,
            };
        };

        let params = EmailParams {
            customer_name: order
                .as_ref()
                .map(|o| o.customer_name.clone())
                .or_else(|| ctx.identification.customer_name.clone())
                .unwrap_or_default(),
            order_id: order.as_ref().map(|o| o.order_id.clone()).unwrap_or_default(),
            carrier: order.as_ref().and_then(|o| o.carrier.clone()).unwrap_or_default(),
            tracking_number: order
                .as_ref()
                .and_then(|o| o.tracking_number.clone())
                .unwrap_or_default(),
            tracking_url: String::new(),
            shop_name: self.shop_name.clone(),
        };
        let (subject, body) = render(args.template, &params);

        let Some(adapter) = &self.email_adapter else {
            return ToolResult::Structured {
                success: false,
                message: "現在メール送信機能は利用できません。".to_string(),
                requires_handoff: true,
            };
        };

        match adapter.send(&to, &subject, &body).await {
            Ok(()) => ToolResult::Structured {
                success: true,
                message: "メールを送信いたしました。".to_string(),
                requires_handoff: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "email send failed");
                ToolResult::Structured {
                    success: false,
                    message: "メール送信に失敗しました。".to_string(),
                    requires_handoff: true,
                }
            }
        }
    }

    fn transfer_to_human(arguments: &serde_json::Value) -> ToolResult {
        let args: TransferToHumanArgs = match serde_json::from_value(arguments.clone()) {
            Ok(a) => a,
            Err(_) => TransferToHumanArgs {
                reason: "unspecified".to_string(),
                summary: None,
                priority: HandoffPriority::Normal,
            },
        };
        ToolResult::Handoff {
            reason: args.reason,
            summary: args.summary.unwrap_or_default(),
            priority: args.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_order_status_args_default_to_no_filters() {
        let args: CheckOrderStatusArgs = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(args.phone_number.is_none());
        assert!(args.order_id.is_none());
    }

    #[test]
    fn transfer_to_human_defaults_priority_to_normal() {
        let result = ToolDispatcher::transfer_to_human(&serde_json::json!({"reason": "angry customer"}));
        match result {
            ToolResult::Handoff { priority, reason, .. } => {
                assert_eq!(priority, HandoffPriority::Normal);
                assert_eq!(reason, "angry customer");
            }
            _ => panic!("expected Handoff"),
        }
    }

    #[test]
    fn transfer_to_human_honors_explicit_priority() {
        let result = ToolDispatcher::transfer_to_human(&serde_json::json!({
            "reason": "fraud suspicion",
            "summary": "possible stolen card",
            "priority": "urgent"
        }));
        match result {
            ToolResult::Handoff { priority, .. } => assert_eq!(priority, HandoffPriority::Urgent),
            _ => panic!("expected Handoff"),
        }
    }
}
