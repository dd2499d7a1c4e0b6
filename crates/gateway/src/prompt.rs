//! Prompt composer (C5, §4.5): builds the one system-instruction string C2
//! sends as `session.instructions`. Plain `format!`/`push_str` assembly, no
//! templating engine, matching the teacher's prompt-building style in
//! `runtime/turn.rs` — the string is opaque to everything downstream.

use vb_domain::call::IdentificationContext;
use vb_domain::order::status_message;

const POLICY_BLOCK: &str = "\
あなたは通販ショップのカスタマーサポート音声アシスタントです。\
常に丁寧な言葉遣いを保ち、短い文で話してください。\
電話番号や注文番号などの数字は一桁ずつ区切って読み上げてください。\
注文状況の確認、配送状況の案内、返品の受付は自分で対応してかまいません。\
高額商品の返品、配送から7日を超える返品、その他担当者の判断が必要な案件は、\
必ず人間の担当者に取り次いでください。\
通話の冒頭では挨拶をし、終了時には簡潔にお礼を述べてください。";

/// Produces the per-call system instruction from identification context
/// (§4.5). Combines the fixed policy block above with a context block that
/// branches on whether the caller was identified.
pub fn compose_system_prompt(ctx: &IdentificationContext) -> String {
    let mut prompt = String::with_capacity(POLICY_BLOCK.len() + 256);
    prompt.push_str(POLICY_BLOCK);
    prompt.push_str("\n\n");

    if ctx.found {
        let name = ctx.customer_name.as_deref().unwrap_or("お客様");
        prompt.push_str(&format!(
            "現在のお客様: {name}様。\n\
             最初の発言例: 「{greeting}」\n\
             もしお客様がご本人でないと言われた場合は、お詫びした上でお名前を伺い直してください。\n",
            greeting = ctx.greeting_hint,
        ));

        if let Some(order) = ctx.latest_order() {
            let status = status_message(
                order.status,
                order.carrier.as_deref(),
                order.tracking_number.as_deref(),
            );
            prompt.push_str(&format!(
                "最新のご注文情報（参考。お客様から聞かれない限り自分からは話さないこと）:\n\
                 - 注文番号: {order_id}\n\
                 - 注文日: {order_date}\n\
                 - 商品: {items}\n\
                 - 状況: {status}\n",
                order_id = order.order_id,
                order_date = order.order_date,
                items = item_names(order),
            ));
        }
    } else if ctx.error {
        prompt.push_str(
            "お客様の情報照会でシステムエラーが発生しました（内部理由: バックエンド接続失敗）。\
             お客様にはそれを悟らせず、お名前と、注文に関するご用件であれば注文番号も伺ってください。\n",
        );
    } else {
        prompt.push_str(&format!(
            "この電話番号に一致するお客様情報は見つかりませんでした。\n\
             最初の発言例: 「{greeting}」\n\
             お名前を伺い、注文に関するご用件であれば注文番号も伺ってください。\n",
            greeting = ctx.greeting_hint,
        ));
    }

    prompt
}

fn item_names(order: &vb_domain::order::OrderSummary) -> String {
    order
        .items
        .iter()
        .map(|item| item.name.as_str())
        .collect::<Vec<_>>()
        .join("、")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vb_domain::order::OrderSummary;

    #[test]
    fn found_context_includes_name_and_greeting() {
        let ctx = IdentificationContext {
            found: true,
            customer_name: Some("田中 太郎".into()),
            greeting_hint: "お世話になっております、田中様。".into(),
            orders: vec![],
            error: false,
        };
        let prompt = compose_system_prompt(&ctx);
        assert!(prompt.contains("田中 太郎"));
        assert!(prompt.contains("お世話になっております"));
    }

    #[test]
    fn found_context_with_order_instructs_not_to_volunteer() {
        let ctx = IdentificationContext {
            found: true,
            customer_name: Some("田中 太郎".into()),
            greeting_hint: "お世話になっております。".into(),
            orders: vec![OrderSummary::sample_for_tests()],
            error: false,
        };
        let prompt = compose_system_prompt(&ctx);
        assert!(prompt.contains("R-42"));
        assert!(prompt.contains("自分からは話さない"));
    }

    #[test]
    fn not_found_context_asks_for_name() {
        let ctx = IdentificationContext::not_found();
        let prompt = compose_system_prompt(&ctx);
        assert!(prompt.contains("見つかりませんでした"));
        assert!(prompt.contains(&ctx.greeting_hint));
    }

    #[test]
    fn error_context_uses_neutral_script_with_internal_reason() {
        let ctx = IdentificationContext::unidentified_error();
        let prompt = compose_system_prompt(&ctx);
        assert!(prompt.contains("システムエラー"));
        assert!(!prompt.contains("見つかりませんでした"));
    }

    #[test]
    fn policy_block_always_present() {
        let prompt = compose_system_prompt(&IdentificationContext::not_found());
        assert!(prompt.contains("カスタマーサポート"));
        assert!(prompt.contains("一桁ずつ"));
    }
}
