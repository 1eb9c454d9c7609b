use crate::models::{GiftCard, Order};

/// A rendered email: subject plus plain-text and HTML bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Georgia, serif; background:#faf7f2; color:#2d2a26; margin:0; padding:24px;">
  <div style="max-width:600px; margin:0 auto; background:#ffffff; padding:32px; border-radius:8px;">
    <h1 style="font-size:22px; letter-spacing:4px; margin:0 0 24px;">ARTISIO</h1>
    <h2 style="font-size:18px;">{title}</h2>
    {body}
    <p style="font-size:12px; color:#8a8178; margin-top:32px;">Handcrafted with care by independent makers.</p>
  </div>
</body>
</html>"#,
        title = escape_html(title),
        body = body
    )
}

fn money(amount: rust_decimal::Decimal) -> String {
    format!("${:.2}", amount)
}

pub fn order_confirmation(order: &Order, first_name: &str, frontend_url: &str) -> Rendered {
    let rows: String = order
        .items
        .iter()
        .map(|item| {
            format!(
                "<tr><td>{} &times; {}</td><td style=\"text-align:right\">{}</td></tr>",
                escape_html(&item.name),
                item.quantity,
                money(item.subtotal)
            )
        })
        .collect();
    let lines: String = order
        .items
        .iter()
        .map(|item| format!("- {} x{}: {}\n", item.name, item.quantity, money(item.subtotal)))
        .collect();

    let html = layout(
        "Thank you for your order",
        &format!(
            r#"<p>Hi {name},</p>
<p>We've received order <strong>{number}</strong> and our makers are getting it ready.</p>
<table style="width:100%; border-collapse:collapse;">{rows}</table>
<p>Subtotal: {subtotal}<br>Shipping: {shipping}<br>Tax: {tax}<br><strong>Total: {total}</strong></p>
<p><a href="{url}/track/{number}">Track your order</a></p>"#,
            name = escape_html(first_name),
            number = escape_html(&order.order_number),
            rows = rows,
            subtotal = money(order.subtotal),
            shipping = money(order.shipping_cost),
            tax = money(order.tax),
            total = money(order.total),
            url = frontend_url,
        ),
    );

    Rendered {
        subject: format!("Order Confirmation - {} | ARTISIO", order.order_number),
        text: format!(
            "Hi {},\n\nThank you for your order {}.\n\n{}\nTotal: {}\n\nTrack it at {}/track/{}\n",
            first_name,
            order.order_number,
            lines,
            money(order.total),
            frontend_url,
            order.order_number
        ),
        html,
    }
}

pub fn shipping_notification(order: &Order) -> Rendered {
    let tracking = order.tracking_number.as_deref().unwrap_or("Not yet available");
    let carrier = order.carrier.as_deref().unwrap_or("our carrier");

    Rendered {
        subject: format!("Your Order is on the Way! - {}", order.order_number),
        text: format!(
            "Good news! Order {} has shipped with {}.\nTracking number: {}\n",
            order.order_number, carrier, tracking
        ),
        html: layout(
            "Your order is on the way",
            &format!(
                "<p>Order <strong>{}</strong> has shipped with {}.</p><p>Tracking number: <strong>{}</strong></p>",
                escape_html(&order.order_number),
                escape_html(carrier),
                escape_html(tracking)
            ),
        ),
    }
}

pub fn delivery_notification(order: &Order, frontend_url: &str) -> Rendered {
    Rendered {
        subject: format!("Order Delivered - {} | ARTISIO", order.order_number),
        text: format!(
            "Order {} has been delivered. We hope you love it!\nLeave a review at {}/account/orders\n",
            order.order_number, frontend_url
        ),
        html: layout(
            "Your order has been delivered",
            &format!(
                "<p>Order <strong>{}</strong> has arrived. We hope you love it!</p><p><a href=\"{}/account/orders\">Leave a review</a></p>",
                escape_html(&order.order_number),
                frontend_url
            ),
        ),
    }
}

pub fn welcome(first_name: &str, frontend_url: &str) -> Rendered {
    Rendered {
        subject: "Welcome to ARTISIO - Your Artisan Food Journey Begins!".to_string(),
        text: format!(
            "Hi {},\n\nWelcome to ARTISIO. Use code WELCOME10 for 10% off your first order.\n{}\n",
            first_name, frontend_url
        ),
        html: layout(
            "Welcome to ARTISIO",
            &format!(
                "<p>Hi {},</p><p>Use code <strong>WELCOME10</strong> for 10% off your first order.</p><p><a href=\"{}\">Start exploring</a></p>",
                escape_html(first_name),
                frontend_url
            ),
        ),
    }
}

pub fn gift_card(card: &GiftCard, frontend_url: &str) -> Rendered {
    let note = card
        .message
        .as_deref()
        .map(|m| format!("<blockquote>{}</blockquote>", escape_html(m)))
        .unwrap_or_default();

    Rendered {
        subject: format!("{} sent you an ARTISIO gift card!", card.sender_name),
        text: format!(
            "Hi {},\n\n{} sent you a {} ARTISIO gift card.\nCode: {}\n{}\nRedeem at {}\n",
            card.recipient_name,
            card.sender_name,
            money(card.initial_balance),
            card.code,
            card.message.as_deref().unwrap_or_default(),
            frontend_url
        ),
        html: layout(
            "You've received a gift card",
            &format!(
                "<p>Hi {},</p><p>{} sent you a <strong>{}</strong> gift card.</p>{}<p style=\"font-size:20px; letter-spacing:2px;\"><strong>{}</strong></p><p><a href=\"{}\">Start shopping</a></p>",
                escape_html(&card.recipient_name),
                escape_html(&card.sender_name),
                money(card.initial_balance),
                note,
                escape_html(&card.code),
                frontend_url
            ),
        ),
    }
}

pub fn contact_form(name: &str, email: &str, subject: &str, order_number: Option<&str>, message: &str) -> Rendered {
    let order_line = order_number
        .map(|n| format!("<p><strong>Order Number:</strong> {}</p>", escape_html(n)))
        .unwrap_or_default();

    Rendered {
        subject: format!("Contact form: {}", subject),
        text: format!(
            "From: {} ({})\nSubject: {}\nOrder: {}\n\n{}\n",
            name,
            email,
            subject,
            order_number.unwrap_or("-"),
            message
        ),
        html: layout(
            "New Contact Form Submission",
            &format!(
                "<p><strong>From:</strong> {} ({})</p><p><strong>Subject:</strong> {}</p>{}<hr><p>{}</p>",
                escape_html(name),
                escape_html(email),
                escape_html(subject),
                order_line,
                escape_html(message).replace('\n', "<br>")
            ),
        ),
    }
}

pub fn test_message() -> Rendered {
    Rendered {
        subject: "Test Email from ARTISIO".to_string(),
        text: "Your ARTISIO email configuration works.\n".to_string(),
        html: layout("Email is working", "<p>Your ARTISIO email configuration works.</p>"),
    }
}
