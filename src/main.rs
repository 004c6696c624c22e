use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use serial_expect::{
    cli,
    config::Config,
    control::ControlChannel,
    logging,
    scanner::{self, Scanner},
};
use tracing::{debug, info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let cli::Commands::Examples(example) = &cli.command {
        match example {
            cli::Examples::Config => {
                println!("{}", Config::example().serialize_pretty());
            }
        }

        return Ok(());
    }

    logging::init(Level::INFO, None).await;

    let config = if let Some(config_path) = &cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)
    } else {
        debug!("Default config");
        Config::default()
    };
    config.validate()?;

    match cli.command {
        cli::Commands::Examples(_) => unreachable!("Handled before logging setup"),
        cli::Commands::Expect {
            tty,
            pattern,
            baud,
            timeout,
        } => {
            let timeout = timeout.map(Duration::from_secs_f64);
            let baud = baud
                .or_else(|| config.console_baud(&tty))
                .unwrap_or(scanner::DEFAULT_BAUD);

            let mut scanner = Scanner::open(&tty, baud)?.verbose(true);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C, quitting");
                }
                found = scanner.expect(&pattern, timeout) => {
                    match found? {
                        Some(found) => println!("{found}"),
                        None => {
                            info!("No match before the deadline");
                            std::process::exit(1);
                        }
                    }
                }
            }
        }
        cli::Commands::Send { tokens } => {
            let control_node = config
                .control_node
                .ok_or_else(|| color_eyre::eyre::eyre!("The config has no control node"))?;

            let mut channel = ControlChannel::new(control_node.helper, &control_node.tty);
            channel.start()?;

            match channel.send_command(&tokens).await? {
                Some(answer) => println!("{answer}"),
                None => info!("No answer before the deadline"),
            }

            channel.stop().await;
        }
    }

    logging::shutdown();

    Ok(())
}
