/// Formats an elapsed-seconds counter for the on-screen timer.
/// Hours are omitted until the workout actually reaches one.
pub fn format_elapsed(interval_seconds: f64) -> String {
    let interval = interval_seconds as i64;
    let seconds = interval % 60;
    let minutes = (interval / 60) % 60;
    let hours = interval / 3600;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_long_formats() {
        assert_eq!(format_elapsed(0.0), "00:00");
        assert_eq!(format_elapsed(59.0), "00:59");
        assert_eq!(format_elapsed(61.0), "01:01");
        assert_eq!(format_elapsed(3600.0), "01:00:00");
        assert_eq!(format_elapsed(3725.0), "01:02:05");
    }
}
