use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use httpception::control::{Command, Update};

#[derive(Parser)]
#[command(name = "httpception-ctl")]
#[command(about = "Operator CLI for the httpception control socket", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "ws://localhost:9999/_socket")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pause every request and response until continued
    Enable,
    /// Stop pausing traffic
    Disable,
    /// Release the oldest paused request or response
    Continue,
    /// Print every update as it arrives
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (socket, _response) = connect_async(cli.url.as_str()).await?;
    let (mut write, mut read) = socket.split();

    let command = match cli.command {
        Commands::Enable => Command::EnableDebugging,
        Commands::Disable => Command::DisableDebugging,
        Commands::Continue => Command::Continue,
        Commands::Watch => {
            while let Some(frame) = read.next().await {
                match frame? {
                    Message::Text(text) => print_update(text.as_str())?,
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            return Ok(());
        }
    };

    write.send(Message::text(command.encode()?)).await?;
    write.send(Message::Close(None)).await?;
    println!("Sent {command}");
    Ok(())
}

fn print_update(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    match serde_json::from_str::<Update>(text) {
        Ok(update) => println!("{}", serde_json::to_string_pretty(&update)?),
        Err(e) => eprintln!("Unrecognized update ({e}): {text}"),
    }
    Ok(())
}
