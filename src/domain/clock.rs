use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;

/// Supplies "today" in the business timezone used by the delivery-date
/// rule. Abstracted behind a trait so tests can pin a date instead of
/// depending on wall-clock time.
pub trait BusinessClock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Default business timezone is `America/Lima` (UTC-5, no DST).
/// Configuration may substitute a different IANA zone name, so the
/// timezone itself is a field rather than baked into the type.
pub struct LimaClock {
    zone: Tz,
}

impl LimaClock {
    pub fn new(zone: Tz) -> Self {
        LimaClock { zone }
    }
}

impl Default for LimaClock {
    fn default() -> Self {
        LimaClock::new(chrono_tz::America::Lima)
    }
}

impl BusinessClock for LimaClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.zone).date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn today_is_a_plausible_date() {
        let clock = LimaClock::default();
        // Sanity check only: we can't pin "today" in a unit test, but we can
        // assert the clock doesn't panic and returns a date in a sane range.
        assert!(clock.today().format("%Y").to_string().len() == 4);
    }
}
