use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};

use tcompiler::backends::BackendType;
use tcompiler::config::{CompileOptions, Interrupt};
use tcompiler::parser::{self, lexer};
use tcompiler::{include, source};

#[derive(Parser)]
#[command(name = "tcompiler")]
#[command(about = "TCode compiler for the 8051 microcontroller", version)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile TCode to assembly for the chosen target
    Compile {
        /// Source file
        input: PathBuf,

        /// Target architecture
        #[arg(short, long, default_value = "8051")]
        target: String,

        /// Output file, defaults to the input with the target's extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the AST before compiling
        #[arg(long)]
        show_ast: bool,

        #[command(flatten)]
        interrupts: InterruptArgs,
    },

    /// Parse and show each line's classification and the AST
    Parse {
        /// Source file
        input: PathBuf,
    },

    /// List supported targets
    Targets,
}

#[derive(Args)]
struct InterruptArgs {
    /// Method run by external interrupt 0
    #[arg(long, value_name = "METHOD")]
    ext0: Option<String>,

    /// Method run by external interrupt 1
    #[arg(long, value_name = "METHOD")]
    ext1: Option<String>,

    /// Method run by timer 0 overflow
    #[arg(long, value_name = "METHOD")]
    timer0: Option<String>,

    /// Method run by timer 1 overflow
    #[arg(long, value_name = "METHOD")]
    timer1: Option<String>,

    /// Run timer 0 as a counter of external pulses
    #[arg(long)]
    counter0: bool,

    /// Run timer 1 as a counter of external pulses
    #[arg(long)]
    counter1: bool,

    /// Disable interrupts around every straight-line command
    #[arg(long)]
    atomic: bool,
}

impl InterruptArgs {
    fn options(&self, target: BackendType) -> CompileOptions {
        let mut options = CompileOptions::new().with_atomic(self.atomic);
        options.target = target;

        let handlers = [
            (Interrupt::External0, &self.ext0),
            (Interrupt::External1, &self.ext1),
            (Interrupt::Timer0, &self.timer0),
            (Interrupt::Timer1, &self.timer1),
        ];
        for (interrupt, method) in handlers {
            if let Some(method) = method {
                options = options.with_handler(interrupt, method.as_str());
            }
        }

        for (interrupt, counter) in [(Interrupt::Timer0, self.counter0), (Interrupt::Timer1, self.counter1)] {
            if !counter {
                continue;
            }
            if !options.interrupts.contains_key(&interrupt) {
                warn!("counter mode ignored: no handler for {}", interrupt.name());
            }
            options = options.with_counter(interrupt);
        }

        if self.atomic && options.interrupts.is_empty() {
            warn!("--atomic has no effect without interrupt handlers");
        }
        options
    }
}

/// Reads the input with its includes expanded; an unreadable file compiles as empty source.
fn read_source(input: &Path) -> String {
    match include::expand(input) {
        Ok(source) => source,
        Err(e) => {
            warn!("cannot read {}: {}; compiling empty source", input.display(), e);
            String::new()
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Compile {
            input,
            target,
            output,
            show_ast,
            interrupts,
        } => {
            let Some(backend_type) = BackendType::from_name(&target) else {
                eprintln!("Unknown target: {}", target);
                process::exit(2);
            };
            println!("Compiling {} for {}...", input.display(), backend_type.name());

            let source = read_source(&input);
            let options = interrupts.options(backend_type);

            if show_ast {
                match parser::parse(&source) {
                    Ok(program) => {
                        println!("=== AST ===");
                        println!("{:#?}", program);
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }

            let assembly = match tcompiler::compile(&source, &options) {
                Ok(assembly) => assembly,
                Err(e) => {
                    eprintln!("{}", e);
                    process::exit(1);
                }
            };

            let output_path = output.unwrap_or_else(|| input.with_extension(backend_type.extension()));
            fs::write(&output_path, &assembly)?;
            info!("wrote {} bytes", assembly.len());
            println!("Compiled to: {}", output_path.display());
            println!("Assembly: {} lines", assembly.lines().count());
        }
        Commands::Parse { input } => {
            println!("Parsing {}...", input.display());
            let source = read_source(&input);

            println!("=== LINES ===");
            for line in source::split_lines(&source) {
                if !line.code.is_empty() {
                    println!("{:4}  {:<20?} {}", line.index + 1, lexer::classify(&line.code), line.code);
                }
            }

            println!("=== AST ===");
            match parser::parse(&source) {
                Ok(program) => println!("{:#?}", program),
                Err(e) => eprintln!("{}", e),
            }
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}
