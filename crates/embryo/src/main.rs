//! Command-line front end for developmental genotypes
//!
//! ```bash
//! embryo check "<X>N>"
//! embryo develop --pretty "N#2<>N[-1:0.5]>>"
//! embryo mutate --seed 7 --times 5 "X>"
//! embryo crossover "<LX>N>" "LLX>"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use embryo_alphabet::Alphabet;
use embryo_genotype::{OperatorConfig, Validation};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

mod config;

use config::EmbryoConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (RON); defaults to ./embryo.ron when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report whether a genotype parses and develops without repairs
    Check { genotype: String },

    /// Validate a genotype, printing the repaired text if repairs were needed
    Validate { genotype: String },

    /// Develop a genotype and print the phenotype as JSON
    Develop {
        genotype: String,

        /// Indent the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Apply successive mutations, printing every result
    Mutate {
        genotype: String,

        /// Random seed (overrides the configured seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Number of successive mutations
        #[arg(long, default_value = "1")]
        times: usize,
    },

    /// Cross two genotypes and print both offspring
    Crossover {
        first: String,
        second: String,

        /// Random seed (overrides the configured seed)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the display style of every character
    Style { genotype: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = EmbryoConfig::load(args.config.as_deref())?;
    let alphabet = config.alphabet()?;
    log::debug!("Loaded configuration: {:?}", config.operators);

    match args.command {
        Command::Check { genotype } => check(&alphabet, &genotype),
        Command::Validate { genotype } => validate(&alphabet, &genotype),
        Command::Develop { genotype, pretty } => develop(&alphabet, &genotype, pretty),
        Command::Mutate {
            genotype,
            seed,
            times,
        } => {
            let mut rng = seeded_rng(seed.or(config.seed));
            mutate(&alphabet, &config.operators, genotype, times, &mut rng)
        }
        Command::Crossover {
            first,
            second,
            seed,
        } => {
            let mut rng = seeded_rng(seed.or(config.seed));
            crossover(&alphabet, &config.operators, &first, &second, &mut rng)
        }
        Command::Style { genotype } => style(&alphabet, &genotype),
    }
}

fn seeded_rng(seed: Option<u64>) -> Xoshiro256StarStar {
    let seed = seed.unwrap_or_else(rand::random);
    log::info!("Using seed {}", seed);
    Xoshiro256StarStar::seed_from_u64(seed)
}

fn check(alphabet: &Alphabet, genotype: &str) -> Result<()> {
    embryo_genotype::check_validity(alphabet, genotype).context("Genotype is invalid")?;
    println!("valid");
    Ok(())
}

fn validate(alphabet: &Alphabet, genotype: &str) -> Result<()> {
    let validation =
        embryo_genotype::validate(alphabet, genotype).context("Genotype cannot be repaired")?;
    if let Validation::Repaired(_) = validation {
        log::info!("Genotype needed repairs");
    }
    println!("{}", validation.text(genotype));
    Ok(())
}

fn develop(alphabet: &Alphabet, genotype: &str, pretty: bool) -> Result<()> {
    let phenotype =
        embryo_genotype::develop(alphabet, genotype).context("Genotype failed to develop")?;
    log::info!(
        "Developed {} cells ({} sticks, {} neurons) with {} links",
        phenotype.cell_count(),
        phenotype.stick_count(),
        phenotype.neuron_count(),
        phenotype.link_count()
    );
    let json = if pretty {
        serde_json::to_string_pretty(&phenotype)
    } else {
        serde_json::to_string(&phenotype)
    }
    .context("Failed to serialize phenotype")?;
    println!("{}", json);
    Ok(())
}

fn mutate(
    alphabet: &Alphabet,
    operators: &OperatorConfig,
    mut genotype: String,
    times: usize,
    rng: &mut Xoshiro256StarStar,
) -> Result<()> {
    for round in 1..=times {
        let mutated = embryo_genotype::mutate_with(alphabet, operators, &genotype, rng)
            .with_context(|| format!("Mutation {} of {} failed", round, times))?;
        println!(
            "{}\t{}\t{:.3}",
            mutated.text,
            mutated.kind.name(),
            mutated.change
        );
        genotype = mutated.text;
    }
    Ok(())
}

fn crossover(
    alphabet: &Alphabet,
    operators: &OperatorConfig,
    first: &str,
    second: &str,
    rng: &mut Xoshiro256StarStar,
) -> Result<()> {
    let outcome = embryo_genotype::crossover(alphabet, operators, first, second, rng);
    for child in [outcome.first, outcome.second] {
        match child {
            Ok((text, change)) => println!("{}\t{:.3}", text, change),
            Err(e) => println!("failed: {}", e),
        }
    }
    Ok(())
}

fn style(alphabet: &Alphabet, genotype: &str) -> Result<()> {
    for (offset, c) in genotype.char_indices() {
        println!(
            "{}\t{}\t{:?}",
            offset,
            c,
            embryo_genotype::style(alphabet, genotype, offset)
        );
    }
    Ok(())
}
