//! Current time ability.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use toolstream_core::ability::{Ability, AbilityArgs, AbilityArgument, AbilityHandler, ArgumentType};
use toolstream_core::error::AbilityError;

pub const NAME: &str = "current_time";

pub fn ability() -> Result<Ability, AbilityError> {
    Ability::builder(
        NAME,
        "Get the current date and time, optionally shifted to a UTC offset such as +02:00.",
    )
    .argument(AbilityArgument::new(
        "utc_offset",
        ArgumentType::String,
        "UTC offset in the form +HH:MM or -HH:MM (default: +00:00)",
    ))
    .argument(
        AbilityArgument::new("format", ArgumentType::String, "Output format (default: rfc3339)")
            .with_values(["rfc3339", "unix"]),
    )
    .handler(CurrentTime)
    .build()
}

struct CurrentTime;

#[async_trait]
impl AbilityHandler for CurrentTime {
    async fn call(&self, args: AbilityArgs) -> Result<String, AbilityError> {
        let offset = match args.opt_str("utc_offset") {
            Some(text) => parse_offset(text)?,
            None => FixedOffset::east_opt(0).ok_or_else(|| AbilityError::failed("invalid offset"))?,
        };

        let now = Utc::now().with_timezone(&offset);
        match args.opt_str("format").unwrap_or("rfc3339") {
            "rfc3339" => Ok(now.to_rfc3339()),
            "unix" => Ok(now.timestamp().to_string()),
            other => Err(AbilityError::InvalidArguments(format!(
                "unknown format '{other}', expected rfc3339 or unix"
            ))),
        }
    }
}

/// Parse `+HH:MM`, `-HH:MM` or `Z`.
fn parse_offset(text: &str) -> Result<FixedOffset, AbilityError> {
    let invalid = || AbilityError::InvalidArguments(format!("invalid utc_offset '{text}'"));

    let text = text.trim();
    if text.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = match text.as_bytes().first() {
        Some(b'+') => (1, &text[1..]),
        Some(b'-') => (-1, &text[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(hours) || !is_digits(minutes) {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
