use charge_helper::{
    client,
    config::{
        self,
        HelperConfig,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    path::PathBuf,
    time::Duration,
};

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: charge-helper [--base-url <url>] [--cookie <value>] [--tick-ms <ms>]\n\
         [--timeout-ms <ms>] [--monitor <keyword>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --base-url <url>     Account API root (default {})\n\
           --cookie <value>     Session cookie header; falls back to ${}\n\
           --tick-ms <ms>       Refresh loop cadence, {}..={} (default {})\n\
           --timeout-ms <ms>    Per-request timeout, 0 disables (default {})\n\
           --monitor <keyword>  Log API traffic whose URL contains <keyword>\n\
           --log-dir <path>     Directory for the rolling log file (default {})",
        config::DEFAULT_BASE_URL,
        config::COOKIE_ENV_VAR,
        config::MIN_TICK_INTERVAL_MS,
        config::MAX_TICK_INTERVAL_MS,
        config::TICK_INTERVAL_MS,
        config::DEFAULT_REQUEST_TIMEOUT_MS,
        config::DEFAULT_LOG_DIR,
    );
    std::process::exit(0);
}

enum Command {
    Run(HelperConfig),
    Help,
}

fn set_once<T>(slot: &mut Option<T>, value: T, flag: &str) -> Result<()> {
    if slot.is_some() {
        return Err(eyre!("{flag} may only be specified once"));
    }
    *slot = Some(value);
    Ok(())
}

fn parse_millis(flag: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|_| eyre!("{flag} expects a whole number of milliseconds, got {raw:?}"))
}

fn parse_cli_args(
    args: impl IntoIterator<Item = String>,
    cookie_env: Option<String>,
) -> Result<Command> {
    let mut args = args.into_iter();
    let mut base_url: Option<String> = None;
    let mut cookie: Option<String> = None;
    let mut tick_ms: Option<u64> = None;
    let mut timeout_ms: Option<u64> = None;
    let mut monitor: Option<String> = None;
    let mut log_dir: Option<String> = None;

    while let Some(arg) = args.next() {
        let mut value = |what: &str| {
            args.next()
                .ok_or_else(|| eyre!("{arg} requires {what} argument"))
        };
        match arg.as_str() {
            "--base-url" => {
                let url = value("a URL")?;
                set_once(&mut base_url, url, "--base-url")?;
            }
            "--cookie" => {
                let raw = value("a cookie")?;
                set_once(&mut cookie, raw, "--cookie")?;
            }
            "--tick-ms" => {
                let raw = value("a number")?;
                let ms = parse_millis("--tick-ms", &raw)?;
                if !(config::MIN_TICK_INTERVAL_MS..=config::MAX_TICK_INTERVAL_MS).contains(&ms)
                {
                    return Err(eyre!(
                        "--tick-ms must be between {} and {}",
                        config::MIN_TICK_INTERVAL_MS,
                        config::MAX_TICK_INTERVAL_MS
                    ));
                }
                set_once(&mut tick_ms, ms, "--tick-ms")?;
            }
            "--timeout-ms" => {
                let raw = value("a number")?;
                let ms = parse_millis("--timeout-ms", &raw)?;
                set_once(&mut timeout_ms, ms, "--timeout-ms")?;
            }
            "--monitor" => {
                let keyword = value("a keyword")?;
                if keyword.is_empty() {
                    return Err(eyre!("--monitor keyword must not be empty"));
                }
                set_once(&mut monitor, keyword, "--monitor")?;
            }
            "--log-dir" => {
                let dir = value("a path")?;
                set_once(&mut log_dir, dir, "--log-dir")?;
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let mut helper = HelperConfig::default();
    if let Some(url) = base_url {
        helper.api.base_url = url;
    }
    helper.api.cookie = cookie.or(cookie_env.filter(|c| !c.is_empty()));
    if let Some(ms) = tick_ms {
        helper.scheduler.tick_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = timeout_ms {
        helper.api.timeout = (ms > 0).then(|| Duration::from_millis(ms));
    }
    helper.monitor = monitor;
    if let Some(dir) = log_dir {
        helper.log_dir = PathBuf::from(dir);
    }
    Ok(Command::Run(helper))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let command = parse_cli_args(
        std::env::args().skip(1),
        std::env::var(config::COOKIE_ENV_VAR).ok(),
    )?;
    let helper = match command {
        Command::Run(helper) => helper,
        Command::Help => print_usage_and_exit(),
    };
    let _log_guard = client::init_tracing(&helper.log_dir)?;
    tracing::info!("starting charge-helper");
    client::run_app(helper).await
}
