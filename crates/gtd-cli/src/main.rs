use anyhow::Result;
use gtd_cli::{output::Output, Cli, Commands, Parser};
use gtd_core::TagKind;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let tracker = cli.open_tracker()?;
    let out = Output::new(cli.json);

    let result = match cli.command {
        Commands::Project { subcommand } => subcommand.run(&tracker, &out).await,
        Commands::Step { subcommand } => subcommand.run(&tracker, &out).await,
        Commands::Category { subcommand } => subcommand.run(TagKind::Category, &tracker, &out).await,
        Commands::Status { subcommand } => subcommand.run(TagKind::Status, &tracker, &out).await,
        Commands::Watch(args) => args.run(&tracker, &out).await,
    };

    tracker.shutdown();
    result
}
