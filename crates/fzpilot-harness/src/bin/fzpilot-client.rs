//! Helper program invoked by generated finder commands.
//!
//! Sends one framed request to the session's RPC server and prints the
//! response body to stdout, where the finder's action (`execute`, `reload`,
//! `transform`, ...) consumes it.

use clap::Parser;

use fzpilot_core::{Kwargs, Request, Snapshot};

/// RPC client for finder key bindings
#[derive(Parser, Debug)]
#[command(name = "fzpilot-client")]
#[command(about = "Forward a finder callback to its session server", long_about = None)]
struct Args {
    /// Server port (normally injected via the environment)
    #[arg(long, env = "FZPILOT_PORT")]
    port: u16,

    /// Endpoint id to dispatch to
    #[arg(long)]
    endpoint: String,

    /// Current query string
    #[arg(long, default_value = "")]
    query: String,

    /// Cursor index; empty when the finder has no current entry
    #[arg(long, default_value = "")]
    index: String,

    /// Number of selected entries
    #[arg(long, default_value = "")]
    select_count: String,

    /// Target indices, as expanded by the finder
    #[arg(long, num_args = 0..)]
    indices: Vec<String>,

    /// Declared parameter values as name=value pairs
    #[arg(long = "kwarg")]
    kwargs: Vec<String>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let snapshot = Snapshot {
        query: args.query,
        cursor_index: args.index.trim().parse().ok(),
        select_count: args.select_count.trim().parse().unwrap_or(0),
        indices: args
            .indices
            .iter()
            .filter_map(|s| s.trim().parse().ok())
            .collect(),
    };

    let mut kwargs = Kwargs::new();
    for pair in args.kwargs {
        let split = pair
            .split_once('=')
            .map(|(name, value)| (name.to_string(), value.to_string()));
        match split {
            Some((name, value)) => kwargs.insert(name, value),
            None => kwargs.insert(pair, String::new()),
        };
    }

    let request = Request {
        endpoint_id: args.endpoint,
        snapshot,
        kwargs,
    };
    let response = fzpilot_rpc::client::call(args.port, &request).await?;
    print!("{response}");
    Ok(())
}
