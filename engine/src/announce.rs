use corelib::AlertRecord;

/// Text handed to the speech collaborator for one alert.
pub fn announcement_text(record: &AlertRecord) -> String {
    format!(
        "Sniper alert on {}. Digit {} formed {} clusters.",
        record.instrument.display_name(),
        record.digit,
        record.threshold
    )
}
