//! Alert rendering for chat (HTML) and console (plain text) delivery

use crate::profiles::EnrichedToken;

const SEPARATOR: &str = "----------------------------------------------";

/// Escape text for Telegram's HTML parse mode
pub fn html_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// "NEW TOKEN FOUND" alert in Telegram HTML
pub fn format_token_alert(token: &EnrichedToken) -> String {
    let mut message = format!(
        "<b>NEW TOKEN FOUND</b>\n\n\
         • <b>Chain:</b> {}\n\
         • <b>Token Address:</b> <code>{}</code>\n\
         • <b>Website:</b> {}\n",
        html_escape(&token.chain_id),
        html_escape(&token.token_address),
        token
            .website_url
            .as_deref()
            .map(html_escape)
            .unwrap_or_else(|| "N/A".to_string()),
    );

    match token.telegram_url.as_deref() {
        Some(url) => message.push_str(&format!(
            "• <b>Telegram:</b> {} (Members: {})\n",
            html_escape(url),
            token.telegram_members
        )),
        None => message.push_str("• <b>Telegram:</b> N/A\n"),
    }

    match token.twitter_url.as_deref() {
        Some(url) => {
            let url = html_escape(url);
            message.push_str(&format!(
                "• <b>Twitter:</b> <a href='{}'>{}</a> (Followers: {})\n",
                url, url, token.twitter_followers
            ));
        }
        None => message.push_str("• <b>Twitter:</b> N/A\n"),
    }

    message.push('\n');
    message.push_str(SEPARATOR);
    message
}

/// Same alert as aligned plain text
pub fn format_console_alert(token: &EnrichedToken) -> String {
    let mut lines = vec![
        "--- NEW TOKEN FOUND ---".to_string(),
        format!("Chain:        {}", token.chain_id),
        format!("TokenAddress: {}", token.token_address),
    ];
    if !token.description.is_empty() {
        lines.push(format!("Description:  {}", token.description));
    }
    lines.push(format!(
        "Website:      {}",
        token.website_url.as_deref().unwrap_or("N/A")
    ));
    lines.push(match token.telegram_url.as_deref() {
        Some(url) => format!("Telegram:     ({} members) {}", token.telegram_members, url),
        None => "Telegram:     N/A".to_string(),
    });
    lines.push(match token.twitter_url.as_deref() {
        Some(url) => format!("Twitter:      {} (Followers: {})", url, token.twitter_followers),
        None => "Twitter:      N/A".to_string(),
    });
    lines.join("\n")
}
