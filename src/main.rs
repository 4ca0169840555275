use clap::Parser;
use tower_lsp::{LspService, Server};

use pugls::cli::{self, Cli, Command};
use pugls::logging::init_tracing;
use pugls::server::Backend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let stdin = tokio::io::stdin();
            let stdout = tokio::io::stdout();

            let (service, socket) = LspService::new(Backend::new);
            Server::new(stdin, stdout, socket).serve(service).await;
            Ok(())
        }
        Command::Index { root, json } => cli::index(&root, json, &mut std::io::stdout()).await,
        Command::Deps { file, root } => {
            cli::deps(&file, root.as_deref(), &mut std::io::stdout()).await
        }
    }
}
