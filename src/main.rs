//! vidgen-bot — supervisor entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > env > config)
//!   4. Init logger once
//!   5. Open the task store and build the video plugin
//!   6. Start supervisor bus
//!   7. Spawn Ctrl-C → shutdown signal watcher
//!   8. Spawn supervisor run-loop
//!   9. Run comms subsystem (drives console until shutdown)
//!  10. Cancel token + join supervisor

use std::io::Write as _;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use vidgen_bot::config::{self, Config, TaskStoreKind};
use vidgen_bot::error::AppError;
use vidgen_bot::logger;
use vidgen_bot::subsystems::{self, store};
use vidgen_bot::subsystems::video::{VideoPlugin, VideoSubsystem};
use vidgen_bot::supervisor::{self, bus::SupervisorBus, dispatch::BusHandler};

#[cfg(feature = "subsystem-tools")]
use vidgen_bot::subsystems::tools::ToolsSubsystem;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let mut config = config::load(args.config_path.as_deref())?;

    // Without -i, no stdio channels are active (daemon-safe default).
    if !args.interactive {
        config.comms.pty.enabled = false;
    }

    std::fs::create_dir_all(&config.work_dir).map_err(|e| {
        AppError::Config(format!("cannot create work_dir {}: {e}", config.work_dir.display()))
    })?;

    let configured_level = logger::effective_filter(&config.log_level, config.video.debug_mode);
    let effective_log_level = args.log_level.unwrap_or(configured_level.as_str());
    let force_cli_level = args.log_level.is_some();

    logger::init(effective_log_level, force_cli_level, config.log_file.as_deref())?;

    info!(
        bot_name = %config.bot_name,
        work_dir = %config.work_dir.display(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        interactive = %args.interactive,
        "config loaded"
    );

    let task_store = store::open(&config.video.store);
    let plugin = Arc::new(VideoPlugin::new(&config.video, task_store)?);

    // Shared shutdown token — Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();

    let bus = SupervisorBus::new(64);
    let bus_handle = bus.handle.clone();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received — initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let mut handlers: Vec<Box<dyn BusHandler>> = vec![Box::new(VideoSubsystem::new(plugin.clone()))];
    let mut configured_handlers = vec!["video".to_string()];
    #[cfg(feature = "subsystem-tools")]
    {
        handlers.push(Box::new(ToolsSubsystem::new(plugin.clone())));
        configured_handlers.push("tools".to_string());
    }

    let sup_token = shutdown.clone();
    let sup_handle = tokio::spawn(async move {
        supervisor::run(bus, sup_token, handlers).await;
    });

    print_startup_summary(&config, &plugin, args.interactive, &configured_handlers);

    let comms = subsystems::comms::start(&config, bus_handle, shutdown.clone());
    if config.comms_pty_should_load() {
        // Console EOF ends the run just like Ctrl-C.
        comms.join().await?;
    } else {
        shutdown.cancelled().await;
        comms.join().await?;
    }

    shutdown.cancel();
    sup_handle.await.ok();

    if args.interactive {
        println!("\nBye :) ...");
        let _ = std::io::stdout().flush();
    }
    let _ = std::io::stderr().flush();

    Ok(())
}

fn print_startup_summary(config: &Config, plugin: &VideoPlugin, interactive: bool, configured_handlers: &[String]) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        let char_count = text.chars().count();
        if char_count >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let mode_text = if interactive { "interactive" } else { "daemon" };
    let pty_status = if config.comms_pty_should_load() { "enabled" } else { "disabled" };

    let providers = plugin.providers();
    let mut provider_lines: Vec<String> = providers
        .iter()
        .map(|p| {
            let tag = if p.provider_id == providers.default_provider_id() { " (default)" } else { "" };
            let model = if p.model.is_empty() { "-" } else { p.model.as_str() };
            format!("{}{tag}: model={model}", p.provider_id)
        })
        .collect();
    if provider_lines.is_empty() {
        provider_lines.push("none configured".to_string());
    }

    let store_line = match config.video.store.kind {
        TaskStoreKind::Tmp => "tmp (in memory)".to_string(),
        TaskStoreKind::JsonFile => format!("json_file {}", config.video.store.path.display()),
    };
    let poll_line = format!(
        "every {}s, max {} attempts, timeout {}s",
        config.video.poll_interval.as_secs(),
        config.video.max_poll_attempts,
        config.video.request_timeout.as_secs()
    );

    #[cfg(feature = "subsystem-tools")]
    let tools_line = "video_generate, video_query_status".to_string();
    #[cfg(not(feature = "subsystem-tools"))]
    let tools_line = "disabled (not compiled)".to_string();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🎬 vidgen Supervisor Status                                  ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧾 Bot: {:<52}║", config.bot_name);
    println!("║ 🧠 PID: {:<52}║", std::process::id());
    println!("║ 🛰️  Mode: {:<51}║", mode_text);
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ ⚙️  Subsystems                                               ║");
    println!("║   {}║", fit(format!("✅ {}", configured_handlers.join(", "))));
    println!("║   {}║", fit(format!("⌨️  pty: {pty_status}")));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 📼 Video providers                                           ║");
    for line in provider_lines {
        println!("║   {}║", fit(line));
    }
    println!("║   {}║", fit(format!("poll: {poll_line}")));
    println!("║   {}║", fit(format!("store: {store_line}")));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║ 🧰 Tools                                                     ║");
    println!("║   {}║", fit(tools_line));
    println!("╚══════════════════════════════════════════════════════════════╝");

    if interactive {
        println!("💡 Type /video help for help");
    }
}

struct CliArgs {
    log_level: Option<&'static str>,
    interactive: bool,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut interactive = false;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: vidgen-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -i, --interactive          Run in interactive mode (enables PTY console)");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-i" | "--interactive" => interactive = true,
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    // -v → warn, -vv → info, -vvv → debug (request/response previews),
    // -vvvv+ → trace.
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, interactive, config_path }
}
