use anyhow::Result;
use quakemap::app;
use quakemap::config::Config;
use quakemap::logging::{log, obj, v_str, Domain, Level};

fn print_help() {
    println!("usage: quakemap [OUTPUT]");
    println!();
    println!("Fetch the earthquake feed and write an interactive map page.");
    println!("OUTPUT defaults to earthquakes.html; '-' writes to stdout.");
    println!();
    println!("Environment:");
    println!("  QUAKEMAP_FEED_URL           feed URL (USGS all_week by default)");
    println!("  QUAKEMAP_FEED_FILE          read the feed from a local file");
    println!("  MAPBOX_API_KEY              Mapbox token for light/dark/street tiles");
    println!("  QUAKEMAP_PLATES=1           add the tectonic plates overlay");
    println!("  QUAKEMAP_PLATES_URL         plate boundaries URL or path");
    println!("  QUAKEMAP_STRICT=1           fail if any feature is malformed");
    println!("  QUAKEMAP_HTTP_TIMEOUT_SECS  request timeout (none by default)");
    println!("  QUAKEMAP_CENTER_LAT/_LON    initial map center");
    println!("  QUAKEMAP_ZOOM               initial zoom");
    println!("  LOG_LEVEL, LOG_DOMAINS, LOG_DIR, RUN_ID");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(String::as_str), Some("-h" | "--help")) {
        print_help();
        return Ok(());
    }

    let cfg = Config::from_env().with_args(&args);
    match app::run(&cfg).await {
        Ok(summary) => {
            log(
                Level::Info,
                Domain::System,
                "done",
                obj(&[
                    ("features", serde_json::json!(summary.features)),
                    ("markers", serde_json::json!(summary.markers)),
                    ("rejected", serde_json::json!(summary.rejected)),
                ]),
            );
            Ok(())
        }
        Err(err) => {
            log(
                Level::Fatal,
                Domain::System,
                "run_failed",
                obj(&[("msg", v_str(&format!("{:#}", err)))]),
            );
            Err(err)
        }
    }
}
