//! Tool schemas (§4.4) — the external ABI the LLM sees. Names and parameter
//! shapes are part of the model-facing contract; keep them stable.

use serde_json::json;
use vb_protocol::ToolDefinition;

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            kind: "function".to_string(),
            name: "check_order_status".to_string(),
            description: "Look up order status by phone number or order ID. If both are omitted, the current caller's phone number is used.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "phone_number": { "type": "string", "description": "Customer's phone number, domestic or international." },
                    "order_id": { "type": "string", "description": "Specific order ID to look up." }
                }
            }),
        },
        ToolDefinition {
            kind: "function".to_string(),
            name: "register_return".to_string(),
            description: "Register a return or exchange request for an order.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "order_id": { "type": "string" },
                    "reason": {
                        "type": "string",
                        "enum": ["defective", "damaged", "wrong_item", "size_issue", "image_different", "other"]
                    },
                    "condition": { "type": "string", "enum": ["unopened", "opened"] },
                    "request": { "type": "string", "enum": ["refund", "exchange"] },
                    "description": { "type": "string", "description": "Free-text detail from the customer." }
                },
                "required": ["order_id", "reason", "condition", "request"]
            }),
        },
        ToolDefinition {
            kind: "function".to_string(),
            name: "send_email".to_string(),
            description: "Send a templated email to the customer on file for this order.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "template": { "type": "string", "enum": ["tracking", "return_form", "callback"] },
                    "order_id": { "type": "string", "description": "Order the email concerns, if any." }
                },
                "required": ["template"]
            }),
        },
        ToolDefinition {
            kind: "function".to_string(),
            name: "transfer_to_human".to_string(),
            description: "Escalate the call to a human agent.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "reason": { "type": "string" },
                    "summary": { "type": "string", "description": "Short summary of the call for the receiving agent." },
                    "priority": { "type": "string", "enum": ["normal", "high", "urgent"], "default": "normal" }
                },
                "required": ["reason"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_tools_are_declared() {
        let defs = tool_definitions();
        assert_eq!(defs.len(), 4);
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            ["check_order_status", "register_return", "send_email", "transfer_to_human"]
        );
    }
}
