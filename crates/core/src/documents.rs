use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

/// Policy fields pre-filled from an uploaded policy document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExtractedPolicy {
    pub policy_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub premium_amount: Decimal,
}

/// Stand-in for document OCR: the product is guessed from the file name and
/// the term runs one year from `today`.
pub fn extract_policy_from_filename(filename: &str, today: NaiveDate) -> ExtractedPolicy {
    let lowered = filename.to_lowercase();
    let (policy_number, premium_amount) = if lowered.contains("kasko") {
        ("KSK-123456789", Decimal::new(750_050, 2))
    } else if lowered.contains("trafik") {
        ("TRF-987654321", Decimal::new(250_075, 2))
    } else {
        ("DASK-101010101", Decimal::new(150_000, 2))
    };

    ExtractedPolicy {
        policy_number: policy_number.to_string(),
        start_date: today,
        end_date: today + Duration::days(365),
        premium_amount,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use super::extract_policy_from_filename;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).expect("date")
    }

    #[test]
    fn kasko_file_name_is_recognised() {
        let extracted = extract_policy_from_filename("Musteri_KASKO_2026.pdf", today());

        assert_eq!(extracted.policy_number, "KSK-123456789");
        assert_eq!(extracted.premium_amount, Decimal::new(750_050, 2));
        assert_eq!(extracted.end_date, NaiveDate::from_ymd_opt(2027, 10, 19).expect("date"));
    }

    #[test]
    fn unknown_file_falls_back_to_dask() {
        let extracted = extract_policy_from_filename("scan-0042.pdf", today());
        assert_eq!(extracted.policy_number, "DASK-101010101");
        assert_eq!(extracted.premium_amount, Decimal::new(1500, 0));
    }
}
