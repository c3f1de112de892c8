//! CHIP-8 VM - CLI Entry Point
//!
//! Commands:
//! - `chip8-vm play <rom>` - Play a ROM in the terminal
//! - `chip8-vm run <rom> --ticks N` - Run headless and print the final screen
//! - `chip8-vm info <rom>` - Show ROM size and free program space

use chip8::config::{load_rom, Config};
use chip8::cpu::quirks::Quirks;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chip8-vm")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "A CHIP-8 virtual machine with a drift-correcting scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings shared by the commands that execute a ROM.
#[derive(Args)]
struct MachineArgs {
    /// JSON config file
    #[arg(short, long)]
    config: Option<String>,
    /// Instructions per second
    #[arg(long)]
    hz: Option<u32>,
    /// Scheduler tick interval in milliseconds
    #[arg(long)]
    interval: Option<u64>,
    /// Quirk preset: literal or canonical
    #[arg(long)]
    quirks: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a ROM in the terminal
    Play {
        /// Path to the ROM image
        rom: String,
        #[command(flatten)]
        machine: MachineArgs,
        /// Write logs here instead of discarding them
        #[arg(long)]
        log_file: Option<String>,
    },
    /// Run a ROM headless for a number of scheduler ticks
    Run {
        /// Path to the ROM image
        rom: String,
        #[command(flatten)]
        machine: MachineArgs,
        /// Number of ticks to run (default: 10)
        #[arg(short, long, default_value = "10")]
        ticks: u64,
        /// Print every executed instruction as a JSON line
        #[arg(long)]
        trace: bool,
    },
    /// Show ROM size and free program space
    Info {
        /// Path to the ROM image
        rom: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Play { rom, machine, log_file }) => {
            init_logging(log_file.as_deref(), true);
            play_rom(&rom, &machine);
        }
        Some(Commands::Run { rom, machine, ticks, trace }) => {
            init_logging(None, false);
            run_rom(&rom, &machine, ticks, trace);
        }
        Some(Commands::Info { rom }) => {
            init_logging(None, false);
            show_info(&rom);
        }
        None => {
            println!("CHIP-8 VM v0.1.0");
            println!();
            println!("Use --help for available commands");
        }
    }
}

/// Log to stderr, or to `path`. With `quiet` and no path, logging is off so
/// the terminal player's screen is not overwritten.
fn init_logging(path: Option<&str>, quiet: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()));

    match path.map(std::fs::File::create) {
        Some(Ok(file)) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Some(Err(e)) => {
            eprintln!("❌ Failed to open log file: {}", e);
            std::process::exit(1);
        }
        None if quiet => {
            builder.filter_level(log::LevelFilter::Off);
        }
        None => {}
    }

    builder.init();
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}: {}", context, e);
    std::process::exit(1);
}

fn build_config(args: &MachineArgs) -> Config {
    let mut config = match &args.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| fail("Failed to load config", e)),
        None => Config::default(),
    };

    if let Some(hz) = args.hz {
        config.instructions_per_second = hz;
    }
    if let Some(interval) = args.interval {
        config.tick_interval_ms = interval;
    }
    if let Some(name) = &args.quirks {
        config.quirks = Quirks::preset(name)
            .unwrap_or_else(|| fail("Unknown quirk preset", name));
    }
    if let Err(e) = config.validate() {
        fail("Invalid settings", e);
    }

    config
}

fn read_rom(path: &str) -> Vec<u8> {
    let rom = load_rom(path).unwrap_or_else(|e| fail("Failed to read ROM", e));
    if rom.is_empty() {
        fail("Failed to read ROM", "file is empty");
    }
    log::info!("loaded {} bytes from {}", rom.len(), path);
    rom
}

#[cfg(feature = "tui")]
fn play_rom(path: &str, args: &MachineArgs) {
    let config = build_config(args);
    let rom = read_rom(path);
    let title = std::path::Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    if let Err(e) = chip8::tui::run_player(&rom, &config, title) {
        fail("Player error", e);
    }
}

#[cfg(not(feature = "tui"))]
fn play_rom(_path: &str, _args: &MachineArgs) {
    fail("Player unavailable", "built without the `tui` feature");
}

fn run_rom(path: &str, args: &MachineArgs, ticks: u64, trace: bool) {
    use chip8::{BeepCounter, Cpu, FrameBuffer, Keypad, Machine, Scheduler, State, Tick};

    let config = build_config(args);
    let rom = read_rom(path);

    let state = State::new(&rom).unwrap_or_else(|e| fail("Failed to load program", e));
    let display = FrameBuffer::new(config.display_width, config.display_height);
    let mut cpu = Cpu::new(state, display, Keypad::new(), BeepCounter::new())
        .with_quirks(config.quirks);
    if trace {
        cpu = cpu.with_trace(|record| {
            if let Ok(line) = serde_json::to_string(record) {
                println!("{}", line);
            }
        });
    }

    let machine = Machine::new(cpu);
    let mut scheduler = Scheduler::new(config.tick_interval());
    let subscription = machine.attach(&mut scheduler, config.batch_size(), |_| {});

    let mut failure = None;
    while scheduler.ticks() < ticks {
        match scheduler.poll() {
            Tick::Pending(wait) => std::thread::sleep(wait.min(Duration::from_millis(50))),
            Tick::Ticked => {}
            Tick::Idle => break,
            Tick::Failed(err) => {
                failure = Some(err);
                break;
            }
        }
    }
    subscription.unsubscribe();

    let cpu = machine.cpu();
    let state = cpu.state();
    print!("{}", cpu.display().to_text('█', '·'));
    println!();
    println!("━━━ Result ━━━");
    println!("Ticks:  {}", scheduler.ticks());
    println!("Cycles: {}", cpu.cycles());
    println!("Beeps:  {}", cpu.speaker().count);
    println!("PC: {:03X}  I: {:03X}  DT: {}  ST: {}  SP: {}",
        state.pc(), state.i(), state.delay(), state.sound(), state.stack_depth());
    let v = state.registers().v_all();
    let regs: Vec<String> = v.iter().enumerate().map(|(n, r)| format!("V{:X}={:02X}", n, r)).collect();
    println!("{}", regs.join(" "));

    if let Some(err) = failure {
        println!();
        fail(&format!("Stopped at PC={:03X}", state.pc()), err);
    }
}

fn show_info(path: &str) {
    let rom = read_rom(path);
    let available = chip8::cpu::memory::MAX_PROGRAM_SIZE;

    println!("📂 {}", path);
    println!("Size: {} bytes ({} free of {})", rom.len(), available.saturating_sub(rom.len()), available);
    if rom.len() > available {
        println!("⚠️  Too large to load");
    }
    if rom.len() % 2 != 0 {
        println!("⚠️  Odd length, the last instruction is incomplete");
    }
}
