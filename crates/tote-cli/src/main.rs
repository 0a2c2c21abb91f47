use clap::Parser;
use tote_cli::{cli, commands, error, logger, ui};

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = cli::Cli::parse();

    logger::init_logger(args.verbose, args.quiet, args.no_color);
    ui::init_output(args.no_color, args.quiet);

    let result = match args.command {
        cli::Command::Build(build_args) => commands::build_execute(build_args).await,
        cli::Command::Library(library_args) => commands::library_execute(library_args).await,
        cli::Command::Check(check_args) => commands::check_execute(check_args).await,
    };

    result.map_err(error::cli_error_to_miette)
}
