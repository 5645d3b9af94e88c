//! Solar Hijri (Jalali) dates and Persian numerals.

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Cumulative day counts at the start of each Gregorian month (non-leap).
const GREGORIAN_MONTH_OFFSETS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// A date in the Solar Hijri calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JalaliDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl JalaliDate {
    /// Arithmetic conversion from a Gregorian calendar date.
    pub fn from_gregorian(date: NaiveDate) -> Self {
        let gy = i64::from(date.year());
        let gm = date.month() as usize;
        let gd = i64::from(date.day());

        let gy2 = if gm > 2 { gy + 1 } else { gy };
        let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100
            + (gy2 + 399) / 400
            + gd
            + GREGORIAN_MONTH_OFFSETS[gm - 1];

        let mut jy = -1595 + 33 * (days / 12_053);
        days %= 12_053;
        jy += 4 * (days / 1461);
        days %= 1461;
        if days > 365 {
            jy += (days - 1) / 365;
            days = (days - 1) % 365;
        }
        let (jm, jd) = if days < 186 {
            (1 + days / 31, 1 + days % 31)
        } else {
            (7 + (days - 186) / 30, 1 + (days - 186) % 30)
        };

        Self {
            year: jy as i32,
            month: jm as u32,
            day: jd as u32,
        }
    }

    /// `yyyy/mm/dd` in Persian digits.
    pub fn to_persian_string(&self) -> String {
        to_persian_digits(&self.to_string())
    }
}

impl From<NaiveDate> for JalaliDate {
    fn from(date: NaiveDate) -> Self {
        Self::from_gregorian(date)
    }
}

impl fmt::Display for JalaliDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}/{:02}/{:02}", self.year, self.month, self.day)
    }
}

/// Replace ASCII digits with Extended Arabic-Indic (Persian) digits.
pub fn to_persian_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => char::from_u32(0x06F0 + d).unwrap_or(c),
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case::nowruz_1403(2024, 3, 20, 1403, 1, 1)]
    #[case::nowruz_1404(2025, 3, 21, 1404, 1, 1)]
    #[case::y2k(2000, 1, 1, 1378, 10, 11)]
    #[case::revolution_day(1979, 2, 11, 1357, 11, 22)]
    #[case::year_end(2023, 12, 31, 1402, 10, 10)]
    #[case::first_30_day_month(2024, 9, 22, 1403, 7, 1)]
    fn test_reference_dates(
        #[case] gy: i32,
        #[case] gm: u32,
        #[case] gd: u32,
        #[case] jy: i32,
        #[case] jm: u32,
        #[case] jd: u32,
    ) {
        let date = NaiveDate::from_ymd_opt(gy, gm, gd).unwrap();
        assert_eq!(
            JalaliDate::from(date),
            JalaliDate {
                year: jy,
                month: jm,
                day: jd
            }
        );
    }

    #[test]
    fn test_persian_rendering() {
        let date = JalaliDate::from(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
        assert_eq!(date.to_string(), "1403/01/01");
        assert_eq!(date.to_persian_string(), "۱۴۰۳/۰۱/۰۱");
    }

    #[test]
    fn test_persian_digits_leave_other_text() {
        assert_eq!(to_persian_digits("نسخه 1.0"), "نسخه ۱.۰");
        assert_eq!(to_persian_digits("۱۴۰۴"), "۱۴۰۴");
    }
}
