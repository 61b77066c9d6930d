//! Demand simulator entry point: CLI wiring and config-driven engine construction.

use std::path::Path;
use std::process;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use demand_sim::config::ScenarioConfig;
use demand_sim::sim::Engine;
use demand_sim::sink::MemorySink;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    days_override: Option<u64>,
    runs_override: Option<u32>,
    verbose: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("demand-sim: stochastic household electricity demand simulator");
    eprintln!();
    eprintln!("Usage: demand-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --days <u64>             Override number of simulated days");
    eprintln!("  --runs <u32>             Override number of Monte-Carlo runs");
    eprintln!("  --verbose                Log at debug level");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after simulation");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the single_household preset is used.");
}

/// Returns the value following flag `name`, exiting on a missing or malformed value.
fn flag_value<T: std::str::FromStr>(args: &[String], i: &mut usize, name: &str, kind: &str) -> T {
    *i += 1;
    let Some(raw) = args.get(*i) else {
        eprintln!("error: {name} requires a {kind} argument");
        process::exit(1);
    };
    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("error: {name} value \"{raw}\" is not a valid {kind}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        days_override: None,
        runs_override: None,
        verbose: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => cli.scenario_path = Some(flag_value(&args, &mut i, "--scenario", "path")),
            "--preset" => cli.preset = Some(flag_value(&args, &mut i, "--preset", "name")),
            "--seed" => cli.seed_override = Some(flag_value(&args, &mut i, "--seed", "u64")),
            "--days" => cli.days_override = Some(flag_value(&args, &mut i, "--days", "u64")),
            "--runs" => cli.runs_override = Some(flag_value(&args, &mut i, "--runs", "u32")),
            "--verbose" | "-v" => cli.verbose = true,
            #[cfg(feature = "api")]
            "--serve" => cli.serve = true,
            #[cfg(feature = "api")]
            "--port" => cli.port = flag_value(&args, &mut i, "--port", "u16"),
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn load_config(cli: &CliArgs) -> ScenarioConfig {
    // --scenario takes priority, then --preset, then the default preset
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else {
        ScenarioConfig::from_preset(cli.preset.as_deref().unwrap_or("single_household"))
    };
    let mut cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Some(seed) = cli.seed_override {
        cfg.simulation.seed = seed;
    }
    if let Some(days) = cli.days_override {
        cfg.simulation.days = days;
    }
    if let Some(runs) = cli.runs_override {
        cfg.simulation.mc_runs = runs;
    }
    cfg
}

fn main() {
    let cli = parse_args();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("warning: logging disabled: {e}");
    }

    let cfg = load_config(&cli);

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let scenario = match cfg.build() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    let mut engine = Engine::new(scenario, MemorySink::new());
    let summary = match engine.run() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    println!("{summary}");
    println!();
    println!(
        "{:<16} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "installation", "kWh", "off-peak", "cost", "peak W", "CO2 kg"
    );
    for k in &engine.sink().kpis {
        println!(
            "{:<16} {:>10.2} {:>10.2} {:>10.2} {:>10.1} {:>10.2}",
            k.installation,
            k.kpi.energy,
            k.kpi.energy_offpeak,
            k.kpi.cost,
            k.kpi.max_power,
            k.kpi.co2
        );
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(demand_sim::api::AppState {
            config: engine.scenario().config.clone(),
            summary,
            results: engine.into_sink(),
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(demand_sim::api::serve(state, addr)) {
            eprintln!("error: API server failed: {e}");
            process::exit(1);
        }
    }
}
