//! HTML rendering of report pages.
//!
//! History pages show a display time synthesized from the entry's position:
//! entry `i` of `n` is drawn at `now - (n - i - 1)` seconds. It approximates
//! the one-second producer cadence and is not the reading's wire timestamp.

use chrono::{DateTime, Duration, Local};
use wire::{Reading, SensorKind};

pub const DISPLAY_TIMESTAMP_FORMAT: &str = "%H:%M / %a / %d %b";

const STYLE: &str = "body { background-color: #D9CBE0; color: #000000; font-family: 'Arial', sans-serif; text-align: center; }\
h2 { color: #0066cc; }\
hr { border: 1px solid #000000; width: 400px; }";

pub enum Page<'a> {
    Temperature(&'a [Reading]),
    Humidity(&'a [Reading]),
    LastHumidity(Option<&'a Reading>),
    NotFound,
}

pub fn render(page: Page<'_>, now: DateTime<Local>) -> String {
    match page {
        Page::Temperature(readings) => history(SensorKind::Temperature, readings, now),
        Page::Humidity(readings) => history(SensorKind::Humidity, readings, now),
        Page::LastHumidity(last) => {
            let mut body = String::from("<h2>Last Humidity Value</h2><hr>\n");
            match last {
                Some(reading) => body.push_str(&format!(
                    "Last Humidity Value: {:.2}<br><hr>\n",
                    reading.value
                )),
                None => body.push_str("No humidity data available<br><hr>\n"),
            }
            document("Last Humidity Value", &body)
        }
        Page::NotFound => document("404 Not Found", "<h1>404 Not Found</h1>\n"),
    }
}

fn history(kind: SensorKind, readings: &[Reading], now: DateTime<Local>) -> String {
    let title = format!("{} Data", kind.label());
    let mut body = format!("<h2>{title}</h2><hr>\n");
    let n = readings.len();
    for (i, reading) in readings.iter().enumerate() {
        let shown_at = now - Duration::seconds((n - i - 1) as i64);
        body.push_str(&format!(
            "{}: {:.2} / {}<br><hr>\n",
            kind.label(),
            reading.value,
            shown_at.format(DISPLAY_TIMESTAMP_FORMAT)
        ));
    }
    document(&title, &body)
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<html><head><title>{title}</title><style>{STYLE}</style></head><body>\n{body}</body></html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_0941() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 9, 41, 30).unwrap()
    }

    #[test]
    fn temperature_page_lists_oldest_first_with_two_decimals() {
        let readings = vec![
            Reading::new(SensorKind::Temperature, 23.5, "10:00"),
            Reading::new(SensorKind::Temperature, 24.1, "10:01"),
        ];
        let html = render(Page::Temperature(&readings), at_0941());

        let first = html.find("Temperature: 23.50 / 09:41 / Thu / 14 Mar").unwrap();
        let second = html.find("Temperature: 24.10 / 09:41 / Thu / 14 Mar").unwrap();
        assert!(first < second);
        assert!(html.contains("<title>Temperature Data</title>"));
        assert!(html.ends_with("</body></html>\n"));
    }

    #[test]
    fn display_time_steps_back_one_second_per_entry() {
        let readings: Vec<_> = (0..61)
            .map(|i| Reading::new(SensorKind::Humidity, 80.5 + i as f64 / 10.0, "ts"))
            .collect();
        let html = render(Page::Humidity(&readings), at_0941());
        // 60 seconds before 09:41:30 is 09:40:30.
        assert!(html.contains("Humidity: 80.50 / 09:40 / Thu / 14 Mar"));
        assert!(html.contains("Humidity: 86.50 / 09:41 / Thu / 14 Mar"));
    }

    #[test]
    fn empty_history_still_renders_a_document() {
        let html = render(Page::Humidity(&[]), at_0941());
        assert!(html.contains("<h2>Humidity Data</h2>"));
        assert!(!html.contains("Humidity: "));
    }

    #[test]
    fn last_humidity_with_and_without_data() {
        let none = render(Page::LastHumidity(None), at_0941());
        assert!(none.contains("No humidity data available"));

        let reading = Reading::new(SensorKind::Humidity, 84.567, "ts");
        let some = render(Page::LastHumidity(Some(&reading)), at_0941());
        assert!(some.contains("Last Humidity Value: 84.57"));
    }

    #[test]
    fn not_found_page() {
        assert!(render(Page::NotFound, at_0941()).contains("<h1>404 Not Found</h1>"));
    }
}
