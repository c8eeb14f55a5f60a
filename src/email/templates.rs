//! Transactional email bodies

pub const RESET_SUBJECT: &str = "Reset your Helyx password";
pub const WELCOME_SUBJECT: &str = "Welcome to Helyx";

/// `{frontend}/reset-password.html?token={token}`
pub fn reset_link(frontend_url: &str, token: &str) -> String {
    format!(
        "{}/reset-password.html?token={}",
        frontend_url.trim_end_matches('/'),
        token
    )
}

pub fn password_reset_html(reset_link: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<div style="font-family: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif; max-width: 520px; margin: 0 auto; background: #0a0a0a; color: #e0e0e0; padding: 40px; border-radius: 12px;">
    <div style="text-align: center; margin-bottom: 32px;">
        <h1 style="font-size: 24px; font-weight: 500; color: #ffffff; letter-spacing: 0.12em;">HELYX</h1>
    </div>
    <h2 style="font-size: 18px; font-weight: 500; color: #ffffff; margin-bottom: 16px;">Password Reset Request</h2>
    <p style="font-size: 14px; line-height: 1.6; color: #a0a0a0; margin-bottom: 24px;">
        We received a request to reset the password for your Helyx account. Click the button below to choose a new password. This link expires in {expiry}.
    </p>
    <div style="text-align: center; margin: 32px 0;">
        <a href="{link}" style="display: inline-block; padding: 12px 32px; background: #ffffff; color: #000000; text-decoration: none; border-radius: 6px; font-weight: 500; font-size: 14px;">Reset Password</a>
    </div>
    <p style="font-size: 12px; line-height: 1.6; color: #666666; margin-top: 32px;">
        If you didn't request this, you can safely ignore this email. Your password will remain unchanged.
    </p>
</div>"#,
        expiry = describe_minutes(ttl_minutes),
        link = reset_link,
    )
}

/// `first_name` is stored already escaped, so it is interpolated as-is
pub fn welcome_html(frontend_url: &str, first_name: &str) -> String {
    let greeting = if first_name.is_empty() {
        "Welcome!".to_string()
    } else {
        format!("Welcome, {}!", first_name)
    };

    format!(
        r#"<div style="font-family: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif; max-width: 520px; margin: 0 auto; background: #0a0a0a; color: #e0e0e0; padding: 40px; border-radius: 12px;">
    <div style="text-align: center; margin-bottom: 32px;">
        <h1 style="font-size: 24px; font-weight: 500; color: #ffffff; letter-spacing: 0.12em;">HELYX</h1>
    </div>
    <h2 style="font-size: 18px; font-weight: 500; color: #ffffff; margin-bottom: 16px;">{greeting}</h2>
    <p style="font-size: 14px; line-height: 1.6; color: #a0a0a0; margin-bottom: 24px;">
        Your Helyx account has been created successfully. You can now track orders and manage your account.
    </p>
    <div style="text-align: center; margin: 32px 0;">
        <a href="{frontend}/products.html" style="display: inline-block; padding: 12px 32px; background: #ffffff; color: #000000; text-decoration: none; border-radius: 6px; font-weight: 500; font-size: 14px;">Browse Products</a>
    </div>
</div>"#,
        greeting = greeting,
        frontend = frontend_url.trim_end_matches('/'),
    )
}

fn describe_minutes(minutes: i64) -> String {
    match minutes {
        60 => "1 hour".to_string(),
        m if m > 60 && m % 60 == 0 => format!("{} hours", m / 60),
        1 => "1 minute".to_string(),
        m => format!("{} minutes", m),
    }
}
