use clap::{Arg, Command, ArgAction};
use log::debug;
use std::time::Instant;

pub fn build_cli() -> Command {
    debug!("⚙️ Building CLI interface...");
    let start_time = Instant::now();
    let cmd = Command::new("lockin")
        .version("0.1.0")
        .about("Records a camera at a low frame rate and squeezes the session into a one-minute clip.")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom configuration file")
                .action(ArgAction::Set)
        )
        .arg(
            Arg::new("debug")
                .short('d')
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
        )
        .subcommand(
            Command::new("record")
                .about("Records until the duration elapses or Ctrl-C is pressed")
                .arg(Arg::new("duration").long("duration").value_name("SECONDS").help("Stop automatically after this many seconds").value_parser(clap::value_parser!(u64)).action(ArgAction::Set))
                .arg(Arg::new("fps").long("fps").value_name("N").help("Frames per second (1-30)").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
                .arg(Arg::new("width").long("width").value_name("PIXELS").help("Frame width").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
                .arg(Arg::new("height").long("height").value_name("PIXELS").help("Frame height").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
                .arg(Arg::new("output").short('o').long("output").value_name("DIR").help("Output directory for recordings").action(ArgAction::Set))
                .arg(Arg::new("no-normalize").long("no-normalize").help("Keep only the raw recording; skip the one-minute conversion").action(ArgAction::SetTrue))
                .arg(Arg::new("test-pattern").long("test-pattern").help("Record a synthetic test pattern instead of a camera").action(ArgAction::SetTrue))
        )
        .subcommand(
            Command::new("normalize")
                .about("Converts an existing recording to exactly one minute")
                .arg(Arg::new("input").short('i').long("input").value_name("FILE").required(true).help("Recording to convert").action(ArgAction::Set))
                .arg(Arg::new("duration").long("duration").value_name("SECONDS").required(true).help("Real duration of the recording").value_parser(clap::value_parser!(f64)).action(ArgAction::Set))
                .arg(Arg::new("fps").long("fps").value_name("N").help("Frame rate the recording was captured at (default: from config)").value_parser(clap::value_parser!(u32)).action(ArgAction::Set))
        );
    debug!("✅ CLI interface built in {:?}", start_time.elapsed());
    cmd
}
