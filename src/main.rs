use anyhow::Result;
use clap::{Parser, ValueEnum};
use mobilfon_scraper::Config;

#[derive(Parser)]
#[command(name = "mobilfon-scraper")]
#[command(about = "Mobilfon dealer-portal parts scraper API")]
#[command(version)]
struct Cli {
    /// HTTP server bind address
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Browser driver to use
    #[arg(short, long, default_value = "chrome")]
    browser: BrowserType,
}

#[derive(Clone, ValueEnum)]
enum BrowserType {
    /// Google Chrome via chromedriver
    Chrome,
    /// Mozilla Firefox via geckodriver
    Firefox,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let mut config = Config::from_env();
    config.preferred_driver = Some(match cli.browser {
        BrowserType::Chrome => "chrome".to_string(),
        BrowserType::Firefox => "firefox".to_string(),
    });

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {e}");
        eprintln!("{}", Config::setup_guidance());
        anyhow::bail!("configuration error: {e}");
    }

    mobilfon_scraper::serve(config, &cli.bind).await
}
