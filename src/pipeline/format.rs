//! Cell formats expected by the contact log (pt-BR).

use chrono::{DateTime, FixedOffset, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};

/// `dd/mm/yyyy, HH:MM:SS` in the given local time.
pub fn local_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format("%d/%m/%Y, %H:%M:%S").to_string()
}

/// Upper-cased three-letter pt-BR weekday (`SEG` … `DOM`).
pub fn weekday_abbrev(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "SEG",
        Weekday::Tue => "TER",
        Weekday::Wed => "QUA",
        Weekday::Thu => "QUI",
        Weekday::Fri => "SEX",
        Weekday::Sat => "SÁB",
        Weekday::Sun => "DOM",
    }
}

/// Hours with exactly two decimals, half away from zero.
pub fn format_hours(hours: Decimal) -> String {
    let rounded = hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

/// Customer number as written to the log: the address without its suffix.
pub fn customer_number<'a>(conversation_key: &'a str, suffix: &str) -> &'a str {
    if suffix.is_empty() {
        return conversation_key;
    }
    conversation_key
        .strip_suffix(suffix)
        .unwrap_or(conversation_key)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn timestamp_is_pt_br() {
        let at = FixedOffset::west_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 7, 9, 5, 1)
            .unwrap();
        assert_eq!(local_timestamp(&at), "07/03/2026, 09:05:01");
    }

    #[test]
    fn weekday_abbreviations() {
        assert_eq!(weekday_abbrev(Weekday::Mon), "SEG");
        assert_eq!(weekday_abbrev(Weekday::Sat), "SÁB");
        assert_eq!(weekday_abbrev(Weekday::Sun), "DOM");
    }

    #[test]
    fn hours_have_two_decimals() {
        assert_eq!(format_hours(dec!(1.5)), "1.50");
        assert_eq!(format_hours(Decimal::ZERO), "0.00");
        assert_eq!(format_hours(dec!(2.345)), "2.35");
        assert_eq!(format_hours(dec!(0.3333333)), "0.33");
    }

    #[test]
    fn customer_number_strips_suffix() {
        assert_eq!(customer_number("5511999990000@c.us", "@c.us"), "5511999990000");
        assert_eq!(customer_number("5511999990000@g.us", "@c.us"), "5511999990000@g.us");
        assert_eq!(customer_number("5511999990000@c.us", ""), "5511999990000@c.us");
    }
}
