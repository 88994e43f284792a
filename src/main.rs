use std::fs::File;
use std::io::{BufRead, BufReader};

use angluin::{Alphabet, LStar, TranscriptOracle};

use tracing::{debug, info};
use tracing_subscriber::{filter, prelude::*};

use clap::{Arg, ArgMatches, Command};

fn cli() -> clap::Command {
    Command::new("angluin")
        .about("Learns a regular language from a pre-recorded oracle transcript")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .num_args(0..=1)
                .require_equals(true)
                .value_parser(["info", "debug", "trace"])
                .default_missing_value("info"),
        )
        .arg(Arg::new("transcript").required(true).help(
            "file whose first line is the input alphabet and whose remaining \
             lines answer the oracle queries in call order",
        ))
}

fn setup_logging(matches: &ArgMatches) {
    let level = match matches
        .try_get_one::<String>("verbosity")
        .ok()
        .flatten()
        .map(|m| m.as_str())
    {
        Some("trace") => filter::LevelFilter::TRACE,
        Some("debug") => filter::LevelFilter::DEBUG,
        _ => filter::LevelFilter::INFO,
    };

    let stderr_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(stderr_log.with_filter(level))
        .init();
}

fn learn(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut transcript = BufReader::new(File::open(path)?);
    let mut first = String::new();
    transcript.read_line(&mut first)?;
    let alphabet: Alphabet = first.trim().chars().collect();
    debug!("learning over the alphabet {alphabet:?}");

    let mut learner = LStar::new(alphabet, TranscriptOracle::new(transcript))?;
    learner.run()?;

    info!("equivalence oracle accepted the hypothesis");
    for (representative, accepted) in learner.table().class_representatives() {
        let shown = if representative.is_empty() {
            "ε"
        } else {
            representative.as_str()
        };
        println!(
            "state {} is {}",
            shown,
            if accepted { "accepting" } else { "rejecting" }
        );
    }
    Ok(())
}

fn main() {
    let matches = cli().get_matches();
    setup_logging(&matches);

    let path = matches
        .get_one::<String>("transcript")
        .expect("transcript argument is required");

    if let Err(error) = learn(path) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
