//! `send_email` template table and delivery adapter (§4.4).

use vb_domain::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    Tracking,
    ReturnForm,
    Callback,
}

/// Parameters available to fill a template. Any field the chosen template
/// doesn't use is simply ignored.
#[derive(Debug, Clone, Default)]
pub struct EmailParams {
    pub customer_name: String,
    pub order_id: String,
    pub carrier: String,
    pub tracking_number: String,
    pub tracking_url: String,
    pub shop_name: String,
}

/// Render `(subject, body)` for a template from its parameters.
pub fn render(template: EmailTemplate, params: &EmailParams) -> (String, String) {
    match template {
        EmailTemplate::Tracking => (
            format!("【{}】配送状況のお知らせ", params.shop_name),
            format!(
                "{}様\n\nご注文（{}）は{}にて発送されました。\n追跡番号: {}\n{}\n\n{}",
                params.customer_name,
                params.order_id,
                params.carrier,
                params.tracking_number,
                params.tracking_url,
                params.shop_name
            ),
        ),
        EmailTemplate::ReturnForm => (
            format!("【{}】返品手続きのご案内", params.shop_name),
            format!(
                "{}様\n\nご注文（{}）の返品手続きフォームをお送りいたします。\nフォームに必要事項をご記入の上、ご返送ください。\n\n{}",
                params.customer_name, params.order_id, params.shop_name
            ),
        ),
        EmailTemplate::Callback => (
            format!("【{}】折り返しご連絡のお約束", params.shop_name),
            format!(
                "{}様\n\nお電話ありがとうございました。担当者より改めてご連絡いたします。\n\n{}",
                params.customer_name, params.shop_name
            ),
        ),
    }
}

/// Delivery seam — swappable so tests don't need a live email provider.
#[async_trait::async_trait]
pub trait EmailAdapter: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Generic REST email adapter: POSTs `{from, to, subject, body}` with a
/// bearer-token API key. The specific provider is a deployment detail set
/// via `base_url`; the shape matches the common transactional-email APIs.
pub struct HttpEmailAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from_address: String,
}

impl HttpEmailAdapter {
    pub fn new(base_url: String, api_key: String, from_address: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            from_address,
        }
    }
}

#[async_trait::async_trait]
impl EmailAdapter for HttpEmailAdapter {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let resp = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from_address,
                "to": to,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| Error::TransientBackend(format!("email send failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(Error::TransientBackend(format!(
                "email provider returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_template_includes_tracking_number() {
        let params = EmailParams {
            customer_name: "田中太郎".into(),
            order_id: "R-42".into(),
            carrier: "ヤマト運輸".into(),
            tracking_number: "1234-5678".into(),
            tracking_url: "https://track.example.com/1234-5678".into(),
            shop_name: "Example Shop".into(),
        };
        let (subject, body) = render(EmailTemplate::Tracking, &params);
        assert!(subject.contains("配送状況"));
        assert!(body.contains("1234-5678"));
        assert!(body.contains("田中太郎"));
    }

    #[test]
    fn return_form_template_mentions_order_id() {
        let params = EmailParams {
            order_id: "R-99".into(),
            ..Default::default()
        };
        let (_subject, body) = render(EmailTemplate::ReturnForm, &params);
        assert!(body.contains("R-99"));
    }
}
