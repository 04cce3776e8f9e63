/// Prefix the lab uses for the bot ID of every DUT-attached bot.
pub const BOT_PREFIX: &str = "crossk-";

/// Strip the legacy bot prefix from `name`, if present.
pub fn normalise_bot_name(name: &str) -> &str {
    name.strip_prefix(BOT_PREFIX).unwrap_or(name)
}

/// The bot ID serving DUT `hostname`.
///
/// A trailing `.cros` domain is dropped and the bot prefix is added unless
/// already present.
pub fn bot_id(hostname: &str) -> String {
    let hostname = hostname.strip_suffix(".cros").unwrap_or(hostname);
    if hostname.starts_with(BOT_PREFIX) {
        hostname.to_string()
    } else {
        format!("{BOT_PREFIX}{hostname}")
    }
}
