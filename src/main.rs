//! pv-sizer entry point: CLI wiring and config-driven sizing run.

use std::path::Path;
use std::process;

use tracing::{error, info};

use pv_sizer::config::RunConfig;
use pv_sizer::devices::SyntheticDemand;
use pv_sizer::finance::{self, FinancialParameters};
use pv_sizer::io::consumption::read_consumption_file;
use pv_sizer::io::export::export_scenarios_csv;
use pv_sizer::logging::init_logging;
use pv_sizer::optimize::{self, AnalyzeResponse, CancelToken};
use pv_sizer::scoring::{self, Offer, ScoringRequest};
use pv_sizer::series::{TimeSeries, hourly_year};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    consumption_path: Option<String>,
    scenarios_out: Option<String>,
    verbose: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
    #[cfg(feature = "api")]
    timeout_secs: u64,
}

fn print_help() {
    eprintln!("pv-sizer: PV and battery sizing with economics and offer scoring");
    eprintln!();
    eprintln!("Usage: pv-sizer [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load run configuration from TOML file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        RunConfig::PRESETS.join(", ")
    );
    eprintln!("  --consumption <path>     Hourly consumption CSV (timestamp,value)");
    eprintln!("  --scenarios-out <path>   Export every swept scenario to CSV");
    eprintln!("  --verbose                Log per-scenario detail");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the JSON API instead of a batch run");
        eprintln!("  --port <u16>             API server port (default: 3000)");
        eprintln!("  --timeout-secs <u64>     Per-request timeout (default: 120)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Without --consumption, demand is synthesized from the [demand] section.");
    eprintln!("If no --config or --preset is given, the ground_south preset is used.");
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str, what: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires a {what} argument");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        consumption_path: None,
        scenarios_out: None,
        verbose: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
        #[cfg(feature = "api")]
        timeout_secs: pv_sizer::api::DEFAULT_REQUEST_TIMEOUT.as_secs(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                cli.config_path = Some(next_value(&args, &mut i, "--config", "path").to_string());
            }
            "--preset" => {
                cli.preset = Some(next_value(&args, &mut i, "--preset", "name").to_string());
            }
            "--consumption" => {
                cli.consumption_path =
                    Some(next_value(&args, &mut i, "--consumption", "path").to_string());
            }
            "--scenarios-out" => {
                cli.scenarios_out =
                    Some(next_value(&args, &mut i, "--scenarios-out", "path").to_string());
            }
            "--verbose" | "-v" => cli.verbose = true,
            #[cfg(feature = "api")]
            "--serve" => cli.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                let raw = next_value(&args, &mut i, "--port", "u16");
                cli.port = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: --port value \"{raw}\" is not a valid u16");
                    process::exit(1);
                });
            }
            #[cfg(feature = "api")]
            "--timeout-secs" => {
                let raw = next_value(&args, &mut i, "--timeout-secs", "u64");
                cli.timeout_secs = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: --timeout-secs value \"{raw}\" is not a valid u64");
                    process::exit(1);
                });
            }
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

fn load_config(cli: &CliArgs) -> RunConfig {
    let loaded = if let Some(ref path) = cli.config_path {
        RunConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        RunConfig::from_preset(name)
    } else {
        Ok(RunConfig::ground_south())
    };
    let config = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn load_consumption(cli: &CliArgs, config: &RunConfig) -> pv_sizer::Result<TimeSeries> {
    match cli.consumption_path {
        Some(ref path) => read_consumption_file(Path::new(path)),
        None => {
            let timestamps = hourly_year(config.sweep.year)?;
            SyntheticDemand::new(&config.demand).series(&timestamps)
        }
    }
}

fn print_variants(response: &AnalyzeResponse) {
    println!("Evaluated {} scenarios", response.scenarios.len());
    for variant in response.key_variants.values() {
        println!();
        print!("Variant {}: {:.0} kWp", variant.kind.label(), variant.scenario.capacity_kwp);
        if let Some(bess) = &variant.scenario.bess {
            print!(" + {:.0} kW / {:.0} kWh BESS", bess.power_kw, bess.energy_kwh);
        }
        match variant.threshold_pct {
            Some(tau) if !variant.meets_threshold => println!(" (target {tau:.0}% not met)"),
            Some(tau) => println!(" (target {tau:.0}%)"),
            None => println!(),
        }
        println!("{}", variant.result);
        if let Some(econ) = &variant.economics {
            let irr = econ
                .irr
                .rate()
                .map_or_else(|| "undefined".to_string(), |r| format!("{:.2}%", r * 100.0));
            let payback = econ
                .payback_years
                .map_or_else(|| "never".to_string(), |p| format!("{p:.1} years"));
            println!(
                "Economics:           CAPEX {:.0}, NPV {:.0}, IRR {irr}, payback {payback}",
                econ.capex, econ.npv
            );
        }
    }
}

fn score_variants(
    response: &AnalyzeResponse,
    finance_params: &FinancialParameters,
    config: &RunConfig,
) -> pv_sizer::Result<()> {
    let mut offers = Vec::with_capacity(response.key_variants.len());
    for variant in response.key_variants.values() {
        let evaluated = finance::evaluate(
            &variant.scenario,
            &variant.result,
            Some(&variant.baseline),
            finance_params,
        )?;
        offers.push(Offer::from_variant(
            variant.kind.label(),
            variant,
            &evaluated,
            config.scoring.emission_factor_kg_per_kwh,
        ));
    }
    if offers.is_empty() {
        return Ok(());
    }

    let ranking = scoring::analyze(&ScoringRequest {
        offers,
        parameters: config.scoring.parameters.clone(),
        policy: Default::default(),
        compare: Vec::new(),
    })?;

    println!();
    println!("Offer ranking ({:?} profile)", config.scoring.parameters.profile);
    for scored in &ranking.results {
        println!(
            "  #{} variant {:<4} score {:5.1}  NPV {:>12.0}  conservative NPV {:>12.0}",
            scored.rank, scored.id, scored.total, scored.npv, scored.conservative_npv
        );
    }
    for comparison in &ranking.comparisons {
        println!("{} vs {}:", comparison.first, comparison.second);
        for reason in &comparison.reasons {
            println!("  {}", reason.text);
        }
    }
    Ok(())
}

fn run(cli: &CliArgs, config: &RunConfig) -> pv_sizer::Result<()> {
    let consumption = load_consumption(cli, config)?;
    info!(
        hours = consumption.len(),
        total_kwh = consumption.total(),
        "consumption loaded"
    );

    let request = config.analyze_request(consumption);
    let response = optimize::analyze(&request, &CancelToken::new())?;
    print_variants(&response);

    if let Some(ref finance_params) = config.finance {
        score_variants(&response, finance_params, config)?;
    }

    if let Some(ref path) = cli.scenarios_out {
        export_scenarios_csv(&response.scenarios, Path::new(path))?;
        info!(path = %path, "scenarios written");
    }
    Ok(())
}

fn main() {
    let cli = parse_args();
    init_logging(cli.verbose);

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;
        use std::time::Duration;

        let state = Arc::new(pv_sizer::api::AppState {
            request_timeout: Duration::from_secs(cli.timeout_secs),
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(pv_sizer::api::serve(state, addr)) {
            error!(error = %e, "API server failed");
            process::exit(1);
        }
        return;
    }

    let config = load_config(&cli);
    if let Err(e) = run(&cli, &config) {
        error!(error = %e, "sizing run failed");
        eprintln!("error: {e}");
        process::exit(1);
    }
}
