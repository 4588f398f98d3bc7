mod cli;

const USAGE: &str = "\
usage:
  petalmix-demo devices
  petalmix-demo play [FILE] [--seconds N] [--channels N]
  petalmix-demo render OUT.raw [FILE] [--seconds N] [--channels N]";

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let options = cli::Options::parse(&args[1..])?;
    match command.as_str() {
        "devices" => cli::list_devices(),
        "play" => cli::play(&options),
        "render" => cli::render(&options),
        other => {
            println!("unknown command '{}'\n{}", other, USAGE);
            Ok(())
        }
    }
}
