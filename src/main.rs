use std::process::ExitCode;
use std::time::Duration;

use skyglass_core::{AppError, Config};
use skyglass_weather::{Preferences, Section, WeatherService, WeatherSnapshot};

/// Upper bound on one query, geolocation included.
const QUERY_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = skyglass_core::init() {
        eprintln!("{:#}", e);
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let (config, _) = Config::load_validated()?;

    let prefs = Preferences::open_or_recover(&config.store_path());
    let service = WeatherService::from_config(&config, prefs)?;

    tracing::info!("Skyglass started");

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let query_run = async {
        if query.trim().is_empty() {
            service.locate().await;
        } else {
            service.search(&query).await;
        }
    };
    if tokio::time::timeout(QUERY_DEADLINE, query_run).await.is_err() {
        return Err(anyhow::anyhow!(
            "Weather query did not finish within {:?}",
            QUERY_DEADLINE
        )
        .into());
    }

    let snapshot = service.snapshot();
    if let Some(error) = snapshot.error() {
        print_suggestions(&service, query.trim());
        return Err(error.clone().into());
    }

    print_snapshot(&service, &snapshot);
    Ok(())
}

/// Recent searches after a failed locate, name suggestions after a failed search.
fn print_suggestions(service: &WeatherService, input: &str) {
    let suggestions = if input.is_empty() {
        service.recent_searches()
    } else {
        service
            .suggestions(input)
            .into_iter()
            .filter(|s| !s.eq_ignore_ascii_case(input))
            .collect()
    };
    if !suggestions.is_empty() {
        println!("Try: {}", suggestions.join(", "));
    }
}

fn print_snapshot(service: &WeatherService, snapshot: &WeatherSnapshot) {
    if let Some(message) = snapshot.user_message() {
        println!("{}", message);
    }

    let Some(current) = &snapshot.current else {
        println!("No weather data.");
        return;
    };

    let unit = current.unit;
    println!("{}", current.display_name());
    println!(
        "  {:.1}{} (feels like {:.1}{}), {}",
        current.temperature,
        unit.temperature_symbol(),
        current.feels_like,
        unit.temperature_symbol(),
        current.condition.label()
    );
    println!(
        "  Humidity {}%, wind {:.1} {} {}",
        current.humidity,
        current.wind_speed,
        unit.speed_symbol(),
        current.wind_cardinal().unwrap_or("")
    );
    if let Some(dew_point) = current.dew_point() {
        println!("  Dew point {:.1}{}", dew_point, unit.temperature_symbol());
    }
    println!(
        "  {}",
        if current.is_daytime() { "Day" } else { "Night" }
    );

    match &snapshot.air_quality {
        Section::Ready(air) => println!(
            "  Air quality: {}",
            air.level().map(|l| l.label()).unwrap_or("Unknown")
        ),
        Section::Unavailable => println!("  Air quality: unavailable"),
        _ => {}
    }

    match &snapshot.forecast {
        Section::Ready(forecast) => {
            println!("  Forecast:");
            for sample in forecast.daily() {
                println!(
                    "    {}  {:.1}{}  {}  {}% rain",
                    sample.time.format("%a %d %b"),
                    sample.temperature,
                    unit.temperature_symbol(),
                    sample.condition.label(),
                    sample.precipitation_percent()
                );
            }
        }
        Section::Unavailable => println!("  Forecast: unavailable"),
        _ => {}
    }

    if let Some(alert) = service.alert() {
        println!("\nAlert: {}\n  {}", alert.message, alert.details);
    }
    if let Some(recommendation) = service.recommendation(chrono::Utc::now()) {
        println!("\n{}", recommendation.message);
    }
}
