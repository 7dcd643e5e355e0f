use anyhow::{Context, Result, bail};
use clap::Args;
use shared::config::client::Config;
use tracing::info;

use super::open_room;

#[derive(Args, Debug)]
#[command(about = "Send a message to a room")]
pub struct SendArgs {
    /// Room to post into
    #[arg(long)]
    pub room: String,

    /// User credited as the sender
    #[arg(long)]
    pub user: Option<String>,

    /// Message text
    #[arg()]
    pub text: String,
}

pub async fn run(config: &Config, args: SendArgs) -> Result<()> {
    let room = open_room(config, &args.room, args.user)?;
    let Some(message) = room
        .post(&args.text)
        .await
        .with_context(|| format!("failed to send message to room '{}'", args.room))?
    else {
        bail!("message text must not be empty");
    };

    info!(room_id = %args.room, correlation_token = %message.correlation_token, "message sent");
    println!("sent {}", message.correlation_token);
    Ok(())
}
