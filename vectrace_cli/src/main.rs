use vectrace_core::config::{SeedMode, VectraceConfig};
use vectrace_core::context::RunContext;
use vectrace_core::executor::{InProcessExecutor, install_panic_hook};
use vectrace_core::guard::CoverageHooks;
use vectrace_core::store::VectorStore;
use vectrace_core::supervisor::Supervisor;

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Fixed seed; omit to seed from the clock.
    #[clap(short, long)]
    seed: Option<u64>,
    #[clap(long)]
    max_run_bytes: Option<usize>,
    #[clap(long)]
    max_accepted_runs: Option<u64>,
    #[clap(short, long)]
    output_dir: Option<PathBuf>,
    /// Re-run the target over a captured vector instead of capturing.
    #[clap(long, value_parser)]
    replay: Option<PathBuf>,
}

const DEMO_LOCATIONS: usize = 8;

fn demo_target(ctx: &mut RunContext<'_>) -> i32 {
    ctx.on_guard_table_init(DEMO_LOCATIONS);
    ctx.on_guard_hit(0);

    let tag = ctx.nondet::<u8>("tag");
    if tag < 0x40 {
        ctx.on_guard_hit(1);
        let len = ctx.nondet::<u16>("len");
        if len > 0xff00 {
            ctx.on_guard_hit(2);
            ctx.abort();
        }
        return 1;
    }
    if tag == b'B' {
        ctx.on_guard_hit(3);
        let value = ctx.nondet::<u32>("value");
        if value % 16 == 0 {
            ctx.on_guard_hit(4);
            return 0;
        }
        ctx.exit(2);
    }

    ctx.on_guard_hit(5);
    if ctx.nondet::<bool>("flag") {
        ctx.on_guard_hit(6);
    } else {
        ctx.on_guard_hit(7);
    }
    3
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("error"));
    let cli = Cli::parse();

    let mut config = match cli.config_file {
        Some(config_path) => {
            log::info!("Loading configuration from specified path: {config_path:?}");
            VectraceConfig::load_from_file(&config_path)?
        }
        None => {
            let default_config_path = PathBuf::from("vectrace.toml");
            if default_config_path.exists() {
                log::info!(
                    "No config file specified via CLI, loading default: {default_config_path:?}"
                );
                VectraceConfig::load_from_file(&default_config_path)?
            } else {
                log::info!("No config file and no 'vectrace.toml' found, using built-in defaults.");
                VectraceConfig::default()
            }
        }
    };

    if let Some(seed) = cli.seed {
        config.harness.seed = SeedMode::Fixed(seed);
    }
    if let Some(max_run_bytes) = cli.max_run_bytes {
        config.harness.max_run_bytes = max_run_bytes;
    }
    if let Some(max_accepted_runs) = cli.max_accepted_runs {
        config.harness.max_accepted_runs = max_accepted_runs;
    }
    if let Some(output_dir) = cli.output_dir {
        config.output.dir = output_dir;
    }

    log::info!("Effective configuration: {config:#?}");

    if let Some(vector_path) = cli.replay {
        install_panic_hook();
        let vector = VectorStore::load(&vector_path)?;
        let mut executor = InProcessExecutor::new(demo_target);
        let (status, record) = executor.replay(&vector, config.harness.max_run_bytes)?;
        println!(
            "Replayed {:?}: {:?} ({} fields, {} bytes)",
            vector_path,
            status,
            record.fields().len(),
            record.byte_count()
        );
        return Ok(());
    }

    let store = VectorStore::open(config.output.dir.clone())?;
    let mut supervisor = Supervisor::new(config.harness.clone(), store, demo_target)?;
    let summary = supervisor.run()?;
    log::info!(
        "Capture finished ({}): seed {}, {} executions, {} vectors, {} locations discovered",
        summary.reason,
        summary.seed,
        summary.executions,
        summary.accepted_runs,
        summary.discovered_locations
    );

    Ok(())
}
