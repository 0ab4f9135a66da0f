use std::{error::Error, io, time::Duration};

use clap::Parser;
use hsclient::{Command, CommandError, Manager, ManagerConfig, PoolConfig, ServerEndpoint, prompt};
use log::info;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Read server, e.g. `inet:localhost:9998` or `unix:/path/to/socket`
    #[arg(long = "read")]
    read: Vec<ServerEndpoint>,
    /// Write server, same format as `--read`
    #[arg(long = "write")]
    write: Vec<ServerEndpoint>,
    /// Connection attempts before giving up on an operation
    #[arg(long, default_value_t = hsclient::config::RETRY_LIMIT)]
    retry_limit: usize,
    /// Seconds a failed server is skipped for
    #[arg(long, default_value_t = hsclient::config::RETRY_INTERVAL.as_secs())]
    retry_interval: u64,
    /// Log raw protocol traffic (with RUST_LOG=debug)
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    ctrlc::set_handler(|| {
        eprintln!();
        std::process::exit(130);
    })?;

    let cli = Cli::parse();
    let config = ManagerConfig {
        read_servers: cli.read,
        write_servers: cli.write,
        pool: PoolConfig {
            retry_limit: cli.retry_limit,
            retry_interval: Duration::from_secs(cli.retry_interval),
            debug: cli.debug,
        },
    };
    let mut hs = Manager::new(&config)?;
    info!("client ready");

    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        let cmd = match prompt(stdin.lock(), stdout.lock()) {
            Ok(c) => c,
            Err(CommandError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        if let Command::Exit = cmd {
            hs.purge();
            break;
        }

        match cmd.execute(&mut hs) {
            Ok(None) => {}
            Ok(Some(out)) => println!("{out}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
