use std::fmt::Write;

use html_escape::encode_text;

use super::{summary::deg_to_compass, DaySummary, Forecast};
use crate::types::Coordinates;

/// Format a temperature pair as `max/min`, or `?` if unknown.
fn temp_range(day: &DaySummary) -> String {
    match (day.temp_max, day.temp_min) {
        (Some(max), Some(min)) => format!("{max}/{min}"),
        _ => String::from("?"),
    }
}

fn wind(direction: Option<f64>, speed: Option<f64>) -> String {
    match speed {
        Some(speed) => format!("{} {speed:.1}", deg_to_compass(direction)),
        None => format!("{} ?", deg_to_compass(direction)),
    }
}

/// Amount with one decimal, or `-` for none at all.
fn amount(value: f64) -> String {
    if value > 0.0 {
        format!("{value:.1}")
    } else {
        String::from("-")
    }
}

/// Render a forecast as an HTML-formatted Telegram message.
#[must_use]
pub fn render_forecast(
    forecast: &Forecast,
    coordinates: Coordinates,
    location_name: Option<&str>,
    attribution: &str,
) -> String {
    let mut text = String::new();
    let title = match location_name {
        Some(name) => encode_text(name).into_owned(),
        None => coordinates.to_string(),
    };

    // Writing into a String can't fail.
    let _ = writeln!(text, "<b>Forecast for {title}</b>");
    let _ = writeln!(
        text,
        "<i>{coordinates} · {}</i>",
        forecast.generated_at.format("%H:%M %d.%m.%Y")
    );
    text.push('\n');

    let current = &forecast.current;
    let temperature = current
        .temperature
        .map_or_else(|| String::from("?"), |t| format!("{t:.1}"));
    let _ = writeln!(
        text,
        "<b>Now</b>: {temperature}°C, wind {} m/s, precipitation {} mm",
        wind(current.wind_from_direction, current.wind_speed),
        amount(current.precipitation_mm),
    );
    text.push('\n');

    if forecast.days.is_empty() {
        text.push_str("No forecast data for the coming days.\n");
    } else {
        text.push_str("<pre>");
        let _ = writeln!(
            text,
            "{:<11} {:<8} {:<9} {:<8} {}",
            "Date", "Temp °C", "Wind m/s", "Rain mm", "Snow cm"
        );
        let today = forecast.today();
        for day in &forecast.days {
            let label = if day.date == today {
                String::from("Today")
            } else {
                day.date.format("%a %d %b").to_string()
            };
            let _ = writeln!(
                text,
                "{:<11} {:<8} {:<9} {:<8} {}",
                label,
                temp_range(day),
                wind(day.wind_from_direction, day.wind_speed),
                amount(day.precipitation_mm),
                amount(day.snow_cm()),
            );
        }
        text.push_str("</pre>\n");
    }

    let _ = write!(text, "<i>Data: {}</i>", encode_text(attribution));
    text
}
