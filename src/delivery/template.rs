//! Reminder email rendering.
//!
//! Pure functions of the subscription record and the reminder offset. Anything
//! that came from a user is escaped before it lands in the HTML body.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::subscription::{Price, Subscription, minor_digits};

const DATE_PLACEHOLDER: &str = "TBD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct NotificationFormatter {
    pub timezone: Tz,
    pub product_name: String,
    pub account_settings_link: String,
    pub support_link: String,
}

impl Default for NotificationFormatter {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            product_name: "Subscription Tracker".to_string(),
            account_settings_link: "#".to_string(),
            support_link: "#".to_string(),
        }
    }
}

pub fn render(subscription: &Subscription, offset_days: u32) -> RenderedNotification {
    NotificationFormatter::default().render(subscription, offset_days)
}

impl NotificationFormatter {
    pub fn render(&self, subscription: &Subscription, offset_days: u32) -> RenderedNotification {
        let user_name = non_empty(&subscription.user.name).unwrap_or("there");
        let subscription_name = non_empty(&subscription.name).unwrap_or("Your subscription");
        let renewal_date = self.format_date(subscription.renewal_date);
        let plan = subscription.frequency.label();
        let price = format!(
            "{} ({})",
            format_price(subscription.price, &subscription.currency),
            subscription.frequency
        );
        let payment_method = non_empty(&subscription.payment_method);
        let days = plural_days(offset_days);

        let subject = format!("{subscription_name} renews on {renewal_date}");

        let mut text_lines = vec![
            format!("Hi {user_name},"),
            String::new(),
            format!("{subscription_name} is scheduled to renew on {renewal_date}."),
            format!("Plan: {plan}"),
            format!("Price: {price}"),
        ];
        if let Some(payment_method) = payment_method {
            text_lines.push(format!("Payment Method: {payment_method}"));
        }
        text_lines.extend([
            format!("Days until renewal: {offset_days}"),
            String::new(),
            format!("Manage your subscription: {}", self.account_settings_link),
            format!("Need help? Contact support: {}", self.support_link),
            String::new(),
            "Thanks,".to_string(),
            self.product_name.clone(),
        ]);
        let text = text_lines.join("\n");

        let payment_row = payment_method
            .map(|method| detail_row("Payment Method", &escape_html(method)))
            .unwrap_or_default();

        let html = format!(
            r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width,initial-scale=1" />
    <title>{title}</title>
  </head>
  <body style="margin:0;padding:0;background:#f4f5f7;">
    <table role="presentation" width="100%" cellspacing="0" cellpadding="0" border="0" style="background:#f4f5f7;">
      <tr>
        <td align="center" style="padding:32px 16px;font-family:system-ui,-apple-system,Segoe UI,Roboto,Helvetica,Arial,sans-serif;">
          <div style="font-size:14px;color:#6b7280;padding:8px 0;">{product}</div>
          <table role="presentation" width="100%" cellspacing="0" cellpadding="0" border="0" style="max-width:600px;background:#ffffff;border-radius:12px;">
            <tr>
              <td style="padding:24px 24px 8px 24px;">
                <h1 style="margin:0;font-size:20px;line-height:28px;color:#111827;">Hi {user},</h1>
                <p style="margin:12px 0 0 0;font-size:14px;line-height:22px;color:#374151;">
                  <strong>{name}</strong> is scheduled to renew on <strong>{date}</strong>.
                  That&rsquo;s in <strong>{days}</strong>.
                </p>
              </td>
            </tr>
            <tr>
              <td style="padding:8px 24px 16px 24px;">
                <table role="presentation" width="100%" cellspacing="0" cellpadding="0" border="0" style="background:#f9fafb;border:1px solid #e5e7eb;border-radius:8px;">
{plan_row}{price_row}{payment_row}{date_row}                </table>
              </td>
            </tr>
            <tr>
              <td style="padding:8px 24px 24px 24px;text-align:center;">
                <a href="{account_link}" style="display:inline-block;background:#4f46e5;color:#ffffff;text-decoration:none;font-size:14px;padding:12px 18px;border-radius:8px;">Manage Subscription</a>
                <div style="margin-top:12px;font-size:12px;color:#6b7280;">
                  Need help? <a href="{support_link}" style="color:#4f46e5;text-decoration:none;">Contact support</a>
                </div>
              </td>
            </tr>
          </table>
          <div style="font-size:12px;color:#9ca3af;padding:16px 0;">You&rsquo;re receiving this email because you opted in to subscription reminders.</div>
        </td>
      </tr>
    </table>
  </body>
</html>
"#,
            title = escape_html(&subject),
            product = escape_html(&self.product_name),
            user = escape_html(user_name),
            name = escape_html(subscription_name),
            date = escape_html(&renewal_date),
            days = escape_html(&days),
            plan_row = detail_row("Plan", &escape_html(plan)),
            price_row = detail_row("Price", &escape_html(&price)),
            payment_row = payment_row,
            date_row = detail_row("Renewal Date", &escape_html(&renewal_date)),
            account_link = escape_html(&self.account_settings_link),
            support_link = escape_html(&self.support_link),
        );

        RenderedNotification {
            subject,
            html,
            text,
        }
    }

    /// `February 1, 2024` in the configured timezone, or a placeholder.
    pub fn format_date(&self, date: Option<DateTime<Utc>>) -> String {
        match date {
            Some(date) => date
                .with_timezone(&self.timezone)
                .format("%B %-d, %Y")
                .to_string(),
            None => DATE_PLACEHOLDER.to_string(),
        }
    }
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Formats with the currency's symbol and minor digits. Unknown currency
/// codes fall back to a plain `$<amount>`.
pub fn format_price(price: Price, currency: &str) -> String {
    let symbol = currency_symbol(currency).unwrap_or("$");
    format!("{symbol}{}", format_amount(price, minor_digits(currency)))
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.trim().to_ascii_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        "NGN" => Some("₦"),
        _ => None,
    }
}

fn format_amount(price: Price, digits: u32) -> String {
    let minor = price.minor_units();
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.unsigned_abs();
    if digits == 0 {
        return format!("{sign}{minor}");
    }

    let scale = 10u64.pow(digits);
    format!(
        "{sign}{}.{:0width$}",
        minor / scale,
        minor % scale,
        width = digits as usize
    )
}

fn plural_days(days: u32) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{days} days")
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn detail_row(label: &str, escaped_value: &str) -> String {
    format!(
        r#"                  <tr>
                    <td style="padding:8px 16px;font-size:13px;color:#6b7280;width:35%;">{label}</td>
                    <td style="padding:8px 16px;font-size:13px;color:#111827;">{escaped_value}</td>
                  </tr>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{active_subscription, utc};

    #[test]
    fn renders_subject_and_details() {
        let subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));

        let rendered = render(&subscription, 5);

        assert_eq!(rendered.subject, "Streaming renews on February 1, 2024");
        assert!(rendered.text.contains("Hi Sam,"));
        assert!(rendered.text.contains("Plan: Monthly"));
        assert!(rendered.text.contains("Price: $15.99 (monthly)"));
        assert!(rendered.text.contains("Payment Method: Credit Card"));
        assert!(rendered.text.contains("Days until renewal: 5"));
        assert!(rendered.html.contains("<strong>5 days</strong>"));
    }

    #[test]
    fn single_day_is_not_pluralised() {
        let subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));

        let rendered = render(&subscription, 1);

        assert!(rendered.html.contains("<strong>1 day</strong>"));
    }

    #[test]
    fn user_supplied_text_is_escaped_in_html() {
        let mut subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));
        subscription.name = "<script>alert('x')</script>".to_string();
        subscription.user.name = "Tom & \"Jerry\"".to_string();
        subscription.payment_method = "<b>card</b>".to_string();

        let rendered = render(&subscription, 7);

        assert!(!rendered.html.contains("<script>"));
        assert!(!rendered.html.contains("<b>card</b>"));
        assert!(rendered.html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(rendered.html.contains("Tom &amp; &quot;Jerry&quot;"));
        assert!(rendered.html.contains("&lt;b&gt;card&lt;/b&gt;"));
    }

    #[test]
    fn missing_renewal_date_renders_placeholder() {
        let mut subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));
        subscription.renewal_date = None;

        let rendered = render(&subscription, 2);

        assert_eq!(rendered.subject, "Streaming renews on TBD");
        assert!(rendered.html.contains("<strong>TBD</strong>"));
    }

    #[test]
    fn dates_render_in_configured_timezone() {
        let formatter = NotificationFormatter {
            timezone: chrono_tz::America::New_York,
            ..Default::default()
        };

        assert_eq!(
            formatter.format_date(Some(utc(2024, 2, 1))),
            "January 31, 2024"
        );
    }

    #[test]
    fn prices_use_currency_table_with_dollar_fallback() {
        let price = Price::from_minor_units(123_456);

        assert_eq!(format_price(price, "EUR"), "€1234.56");
        assert_eq!(format_price(price, "gbp"), "£1234.56");
        assert_eq!(format_price(price, "JPY"), "¥123456");
        assert_eq!(format_price(price, "XYZ"), "$1234.56");
        assert_eq!(format_price(Price::from_minor_units(5), "USD"), "$0.05");
    }

    #[test]
    fn empty_optional_fields_fall_back() {
        let mut subscription = active_subscription("sub-1", utc(2024, 1, 1), utc(2024, 2, 1));
        subscription.user.name = "  ".to_string();
        subscription.payment_method = String::new();

        let rendered = render(&subscription, 2);

        assert!(rendered.text.starts_with("Hi there,"));
        assert!(!rendered.text.contains("Payment Method"));
    }
}
