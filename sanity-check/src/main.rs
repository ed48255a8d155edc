use clap::Parser;
use r2cfft::TwiddleMode;
use sanity_check::{run_check, CheckOptions};

/// Run the batched real-FFT kernel next to its references and compare.
#[derive(Parser)]
struct Args {
    /// Real transform length (even, at least 4)
    #[arg(long, default_value_t = 14)]
    len: usize,

    /// Number of transforms in the batch
    #[arg(long, default_value_t = 3)]
    batch: usize,

    /// Transform in place on a padded buffer
    #[arg(long)]
    in_place: bool,

    /// Use f64 instead of f32
    #[arg(long)]
    double: bool,

    /// Units of work per block
    #[arg(long)]
    block_size: Option<usize>,

    /// Worker threads for the launch
    #[arg(long)]
    threads: Option<usize>,

    /// Evaluate rotation factors per unit instead of using the table
    #[arg(long)]
    inline_twiddles: bool,

    /// Maximum relative error accepted
    #[arg(long, default_value_t = 1e-4)]
    tolerance: f64,

    /// Log launch details
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::builder()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .parse_default_env()
        .init();

    let opts = CheckOptions {
        len: args.len,
        batch: args.batch,
        in_place: args.in_place,
        block_size: args.block_size,
        threads: args.threads,
        twiddle_mode: if args.inline_twiddles {
            TwiddleMode::Inline
        } else {
            TwiddleMode::Table
        },
        tolerance: args.tolerance,
    };
    let outcome = if args.double {
        run_check::<f64>(&opts)?
    } else {
        run_check::<f32>(&opts)?
    };

    println!("{}\n", outcome.input);
    println!("{}\n", outcome.oracle);
    println!("{}\n", outcome.reference);
    println!("{}\n", outcome.kernel);
    println!("{}", outcome.report);
    println!(
        "max relative error: {:e} vs ref, {:e} vs cpu (tolerance {:e})",
        outcome.worst_oracle_error, outcome.worst_error, opts.tolerance
    );
    Ok(())
}
