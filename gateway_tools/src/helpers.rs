use mkt_common::Money;
use settlement_engine::gateway::CheckoutRequest;

/// The form-encoded body for creating a single line-item checkout session. Metadata keys are sorted so the body is
/// stable.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("client_reference_id".to_string(), request.client_reference.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("line_items[0][price_data][currency]".to_string(), request.currency.to_lowercase()),
        ("line_items[0][price_data][unit_amount]".to_string(), request.amount_minor_units.to_string()),
        ("line_items[0][price_data][product_data][name]".to_string(), request.product_name.clone()),
    ];
    let mut keys = request.metadata.keys().collect::<Vec<_>>();
    keys.sort();
    for key in keys {
        form.push((format!("metadata[{key}]"), request.metadata[key].clone()));
    }
    form
}

pub fn refund_form(payment_intent_id: &str, amount: Money) -> Vec<(String, String)> {
    vec![
        ("payment_intent".to_string(), payment_intent_id.to_string()),
        ("amount".to_string(), amount.value().to_string()),
    ]
}

#[cfg(test)]
mod test {
    use settlement_engine::helpers::Metadata;

    use super::*;

    #[test]
    fn checkout_form_fields() {
        let mut metadata = Metadata::new();
        metadata.insert("user_id".into(), "2".into());
        metadata.insert("gateway_amount".into(), "10.00".into());
        let request = CheckoutRequest {
            success_url: "https://market.test/ok".into(),
            cancel_url: "https://market.test/cancel".into(),
            product_name: "Material: Oak planks".into(),
            amount_minor_units: 1000,
            currency: "USD".into(),
            client_reference: "key-1".into(),
            metadata,
        };
        let form = checkout_form(&request);
        let field = |name: &str| form.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str());
        assert_eq!(field("mode"), Some("payment"));
        assert_eq!(field("client_reference_id"), Some("key-1"));
        assert_eq!(field("line_items[0][price_data][currency]"), Some("usd"));
        assert_eq!(field("line_items[0][price_data][unit_amount]"), Some("1000"));
        assert_eq!(field("line_items[0][price_data][product_data][name]"), Some("Material: Oak planks"));
        let metadata = form.iter().filter(|(k, _)| k.starts_with("metadata[")).map(|(k, _)| k.as_str());
        assert_eq!(metadata.collect::<Vec<_>>(), vec!["metadata[gateway_amount]", "metadata[user_id]"]);
    }

    #[test]
    fn refund_form_uses_minor_units() {
        let form = refund_form("pi_1", Money::from_minor_units(89_999));
        assert_eq!(form[0], ("payment_intent".to_string(), "pi_1".to_string()));
        assert_eq!(form[1], ("amount".to_string(), "89999".to_string()));
    }
}
