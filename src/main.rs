use anyhow::{Context, Result};
use stratus_weather::Location;

fn parse_location(mut args: impl Iterator<Item = String>) -> Result<(Location, bool)> {
    let latitude: f64 = args
        .next()
        .context("usage: stratus <latitude> <longitude> [--force]")?
        .parse()
        .context("latitude must be a number")?;
    let longitude: f64 = args
        .next()
        .context("usage: stratus <latitude> <longitude> [--force]")?
        .parse()
        .context("longitude must be a number")?;
    let force = args.any(|arg| arg == "--force");
    Ok((Location::new(latitude, longitude), force))
}

fn main() -> Result<()> {
    // Initialize core
    stratus_core::init()?;

    let (location, force) = parse_location(std::env::args().skip(1))?;

    let mut app = match stratus_core::App::new() {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };
    tracing::info!("Stratus started");

    let plan = app.plan_refresh(&location, force);

    println!("Location: {} ({})", location.display_name(), plan.location);
    println!("Config directory: {}", app.config().config_dir.display());
    if !plan.is_needed() {
        println!("All datasets are fresh.");
    } else {
        let datasets: Vec<_> = plan.datasets.iter().map(|d| d.as_str()).collect();
        println!("Stale datasets: {}", datasets.join(", "));
        if plan.decision.is_allowed {
            println!("Request allowed now.");
        } else {
            println!("Request blocked: {}", plan.decision.reason_summary());
            if let Some(wait) = plan.decision.retry_after(app.coordinator().now_ms()) {
                println!("Retry in {:?}", wait);
            }
        }
    }

    // Graceful shutdown
    if let Err(e) = app.shutdown() {
        eprintln!("{}", e.user_message());
        return Err(e.into());
    }

    Ok(())
}
