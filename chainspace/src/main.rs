use clap::Parser as ClapParser;
use std::{
    fs,
    io::{self, Read},
    process,
};

use chainspace::{Registry, RegistryCreateInfo, script::Script};

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Probe scripts to run in order; stdin when empty
    #[arg(required = false, help = "The probe scripts to execute")]
    files: Vec<String>,

    #[arg(long, help = "Fail when removing a constant that does not exist")]
    strict_constants: bool,

    #[arg(long, help = "Do not warn when a constant is reassigned")]
    quiet_redefinition: bool,

    #[arg(short, long, help = "Log engine operations at debug level")]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let registry = Registry::new(RegistryCreateInfo {
        strict_constant_removal: cli.strict_constants,
        warn_on_constant_redefinition: !cli.quiet_redefinition,
    });
    let mut script = Script::new(registry);

    let mut sources = Vec::new();
    if cli.files.is_empty() {
        let mut input = String::new();
        if let Err(err) = io::stdin().read_to_string(&mut input) {
            eprintln!("Error reading stdin: {}", err);
            process::exit(1);
        }
        sources.push(("<stdin>".to_string(), input));
    }
    for filename in &cli.files {
        match fs::read_to_string(filename) {
            Ok(content) => sources.push((filename.clone(), content)),
            Err(err) => {
                eprintln!("Error reading file '{}': {}", filename, err);
                process::exit(1);
            }
        }
    }

    for (filename, source) in &sources {
        let mut out = Vec::new();
        let result = script.run(source, &mut out);
        for line in &out {
            println!("{line}");
        }
        if let Err(err) = result {
            eprintln!("{}: {}", filename, err);
            process::exit(1);
        }
    }
}
