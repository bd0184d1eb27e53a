use supportdesk_core::domain::kb::KbEntry;
use supportdesk_core::domain::order::Order;

/// Build the grounded system prompt: role, the retrieved policy snippets,
/// the order summary when one resolved, and the JSON output contract.
pub fn grounded_prompt(kb_matches: &[KbEntry], order: Option<&Order>) -> String {
    let mut prompt = String::from(
        "You are a helpful customer support assistant for an e-commerce platform. Your role \
         is to help customers with order status, returns, refunds, cancellations, and general \
         FAQs.\n\nIMPORTANT: You must respond with valid JSON only. Do not include any text \
         before or after the JSON.\n\nAvailable Knowledge Base:\n",
    );

    for (index, entry) in kb_matches.iter().enumerate() {
        prompt.push_str(&format!("{}. {}: {}\n", index + 1, entry.title, entry.content));
    }

    if let Some(order) = order {
        let items = order
            .items
            .iter()
            .map(|item| format!("{} (qty: {})", item.sku, item.quantity))
            .collect::<Vec<_>>()
            .join(", ");

        prompt.push_str(&format!(
            "\nOrder Information:\nOrder ID: {}\nStatus: {}\nItems: {}\nTracking: {}\nCreated: {}\nRefund Status: {}\n",
            order.id.0,
            order.status.as_str(),
            items,
            order.tracking_number.as_deref().unwrap_or("Not available yet"),
            order.created_at.to_rfc3339(),
            order.refund_status.as_str(),
        ));
    }

    prompt.push_str(
        "\nRespond with JSON in this exact format:\n\
         {\n\
         \x20 \"intent\": \"<detected_intent>\",\n\
         \x20 \"confidence\": 0.0-1.0,\n\
         \x20 \"response_text\": \"<helpful_response>\",\n\
         \x20 \"actions\": [{\"type\": \"none\"} or {\"type\": \"cancel_order\", \"order_id\": \"...\", \"reason\": \"...\"} or {\"type\": \"request_return\", \"order_id\": \"...\", \"reason\": \"...\"} or {\"type\": \"check_refund\", \"order_id\": \"...\"}]\n\
         }\n\n\
         Rules:\n\
         - Always cite KB sources when using policy information\n\
         - Never fabricate tracking numbers or delivery dates\n\
         - If information is missing, ask clarifying questions\n\
         - Only suggest actions for valid requests with proper order info\n\
         - Destructive actions (cancel, return, refund) require explicit customer confirmation",
    );

    prompt
}
