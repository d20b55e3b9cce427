use clap::{Parser, Subcommand};
use netbanter::{config::ServerConfigCli, server::BanterServer};

/// Main entry point for the banter command-line tool.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Arguments {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the banter chat server.
    Server(ServerConfigCli),
}

fn main() {
    let args = Arguments::parse();
    match args.mode {
        Mode::Server(server_cli) => {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    eprintln!("failed to build tokio runtime: {}", e);
                    std::process::exit(1);
                }
            };
            runtime.block_on(async {
                BanterServer::main(server_cli).await;
            });
        }
    }
}
