use std::time::Duration;

/// Parses a submitted run time.
///
/// Accepts clock notation (`SS`, `M:SS`, `H:MM:SS`, each with an optional
/// fraction of up to nine digits) and ISO-8601 durations (`PT1H2M3.5S`).
/// Returns `None` for anything else; callers rank such runs last.
pub fn parse_run_time(raw: &str) -> Option<Duration> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(rest) = value
        .strip_prefix("PT")
        .or_else(|| value.strip_prefix("pt"))
    {
        return parse_iso_duration(rest);
    }

    parse_clock(value)
}

/// Sort key placing unparseable times after every valid one
pub fn time_sort_key(time: Option<Duration>) -> (bool, Duration) {
    (time.is_none(), time.unwrap_or_default())
}

fn parse_clock(value: &str) -> Option<Duration> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let (seconds_part, leading) = parts.split_last()?;
    let seconds = parse_seconds(seconds_part)?;
    if !leading.is_empty() && seconds.as_secs() >= 60 {
        return None;
    }

    let mut minutes: u64 = 0;
    for (index, part) in leading.iter().enumerate() {
        let value = parse_whole(part)?;
        // minutes must stay below an hour once hours are present
        if leading.len() == 2 && index == 1 && value >= 60 {
            return None;
        }
        minutes = minutes.checked_mul(60)?.checked_add(value)?;
    }

    let whole = minutes.checked_mul(60)?;
    Duration::from_secs(whole).checked_add(seconds)
}

fn parse_iso_duration(value: &str) -> Option<Duration> {
    let mut total = Duration::ZERO;
    let mut number = String::new();
    let mut seen_units = 0;
    let mut last_unit_order = 0;

    for ch in value.chars() {
        if ch.is_ascii_digit() || ch == '.' {
            number.push(ch);
            continue;
        }

        let order = match ch.to_ascii_uppercase() {
            'H' => 1,
            'M' => 2,
            'S' => 3,
            _ => return None,
        };
        if order <= last_unit_order || number.is_empty() {
            return None;
        }

        let component = if order == 3 {
            parse_seconds(&number)?
        } else {
            let whole = parse_whole(&number)?;
            let factor = if order == 1 { 3600 } else { 60 };
            Duration::from_secs(whole.checked_mul(factor)?)
        };

        total = total.checked_add(component)?;
        number.clear();
        last_unit_order = order;
        seen_units += 1;
    }

    if seen_units == 0 || !number.is_empty() {
        return None;
    }
    Some(total)
}

fn parse_seconds(value: &str) -> Option<Duration> {
    let (whole, fraction) = match value.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (value, None),
    };

    let secs = parse_whole(whole)?;
    let nanos = match fraction {
        None => 0,
        Some(digits) => {
            if digits.is_empty() || digits.len() > 9 || !digits.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let scale = 10u32.pow(9 - digits.len() as u32);
            digits.parse::<u32>().ok()? * scale
        }
    };

    Some(Duration::new(secs, nanos))
}

fn parse_whole(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
