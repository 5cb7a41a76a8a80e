use clap::Parser;
use homeboard::cli::{
    fetch, handle_completions, handle_config_init, handle_config_show, secret, status, sweep,
    trends, Cli, Commands, ConfigCommands,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn print_output(result: CliResult<String>) -> CliResult<()> {
    let output = result?;
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => homeboard::cli::serve::run_serve(args).await,
        Commands::Fetch(args) => print_output(fetch::handle_fetch(&args).await),
        Commands::Status(args) => status::handle_status(&args).await,
        Commands::Trends(args) => print_output(trends::handle_trends(&args)),
        Commands::Sweep(args) => print_output(sweep::handle_sweep(&args)),
        Commands::Secret(cmd) => print_output(secret::handle_secret(&cmd)),
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init(args) => handle_config_init(&args),
            ConfigCommands::Show(args) => print_output(handle_config_show(&args)),
        },
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
