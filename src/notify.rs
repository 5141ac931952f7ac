use crate::{
    config::MailConfig,
    dto::orders::OrderWithItems,
    mailer::{MailMessage, Mailer},
};

/// Send the customer confirmation email. Best-effort: any failure is logged
/// and reported as `false`, never propagated to the order-placement caller.
pub async fn notify_customer(mailer: &dyn Mailer, config: &MailConfig, data: &OrderWithItems) -> bool {
    let subject = format!("Order confirmation #{} - Boutique E-commerce", data.order.id);
    let message = MailMessage {
        subject,
        plain_body: render_plain(data),
        html_body: render_html(data),
        from: config.from_address.clone(),
        to: vec![data.order.customer_email.clone()],
    };
    dispatch(mailer, &message, data, "customer confirmation").await
}

/// Notify the configured administrator address of a new order. Best-effort,
/// same contract as `notify_customer`.
pub async fn notify_admin(mailer: &dyn Mailer, config: &MailConfig, data: &OrderWithItems) -> bool {
    let subject = format!(
        "New order #{} - {}",
        data.order.id, data.order.customer_name
    );
    let message = MailMessage {
        subject,
        plain_body: render_plain(data),
        html_body: render_html(data),
        from: config.from_address.clone(),
        to: vec![config.admin_address.clone()],
    };
    dispatch(mailer, &message, data, "admin notification").await
}

async fn dispatch(
    mailer: &dyn Mailer,
    message: &MailMessage,
    data: &OrderWithItems,
    kind: &str,
) -> bool {
    match mailer.send(message).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                error = %err,
                order_id = %data.order.id,
                "{kind} email failed"
            );
            false
        }
    }
}

fn render_plain(data: &OrderWithItems) -> String {
    let mut body = format!(
        "Hello {},\n\nYour order #{} has been received.\n\nItems:\n",
        data.order.customer_name, data.order.id
    );
    for item in &data.items {
        body.push_str(&format!(
            "- {} x product {} @ {} = {}\n",
            item.quantity, item.product_id, item.price, item.line_total
        ));
    }
    body.push_str(&format!(
        "\nTotal: {}\nDelivery address: {}\n",
        data.order.total_amount, data.order.customer_address
    ));
    body
}

fn render_html(data: &OrderWithItems) -> String {
    let mut rows = String::new();
    for item in &data.items {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            item.product_id, item.quantity, item.price, item.line_total
        ));
    }
    format!(
        "<h2>Order #{}</h2>\
         <p>Customer: {} &lt;{}&gt;</p>\
         <table border=\"1\" cellpadding=\"4\">\
         <tr><th>Product</th><th>Qty</th><th>Unit price</th><th>Line total</th></tr>\
         {rows}\
         </table>\
         <p><strong>Total: {}</strong></p>",
        data.order.id, data.order.customer_name, data.order.customer_email, data.order.total_amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::RecordingMailer;
    use crate::models::{Order, OrderItem, OrderStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_order() -> OrderWithItems {
        let order_id = Uuid::new_v4();
        let order = Order {
            id: order_id,
            customer_name: "Awa Diallo".into(),
            customer_email: "awa@example.com".into(),
            customer_phone: None,
            customer_address: "12 Rue du Marche".into(),
            total_amount: dec!(1700.00),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                quantity: 2,
                price: dec!(250.00),
                line_total: dec!(500.00),
                created_at: Utc::now(),
            },
            OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                quantity: 1,
                price: dec!(1200.00),
                line_total: dec!(1200.00),
                created_at: Utc::now(),
            },
        ];
        OrderWithItems { order, items }
    }

    #[test]
    fn plain_body_lists_lines_and_total() {
        let data = sample_order();
        let body = render_plain(&data);
        assert!(body.contains("2 x product"));
        assert!(body.contains("= 500.00"));
        assert!(body.contains("= 1200.00"));
        assert!(body.contains("Total: 1700.00"));
    }

    #[tokio::test]
    async fn customer_notification_goes_to_customer() {
        let mailer = RecordingMailer::default();
        let config = MailConfig::default();
        let data = sample_order();

        assert!(notify_customer(&mailer, &config, &data).await);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["awa@example.com".to_string()]);
    }

    #[tokio::test]
    async fn admin_notification_uses_configured_address() {
        let mailer = RecordingMailer::default();
        let config = MailConfig::default();
        let data = sample_order();

        assert!(notify_admin(&mailer, &config, &data).await);
        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].to, vec![config.admin_address.clone()]);
    }

    #[tokio::test]
    async fn send_failure_becomes_false() {
        let mailer = RecordingMailer::failing();
        let config = MailConfig::default();
        let data = sample_order();

        assert!(!notify_customer(&mailer, &config, &data).await);
        assert!(!notify_admin(&mailer, &config, &data).await);
    }
}
