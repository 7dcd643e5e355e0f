use anyhow::{Context, Result};
use clap::Args;
use shared::config::client::Config;

use super::{open_room, print_groups};

#[derive(Args, Debug)]
#[command(about = "Print a room's history grouped by sender")]
pub struct HistoryArgs {
    /// Room to read
    #[arg(long)]
    pub room: String,
}

pub async fn run(config: &Config, args: HistoryArgs) -> Result<()> {
    let room = open_room(config, &args.room, None)?;
    let count = room
        .load()
        .await
        .with_context(|| format!("failed to load history for room '{}'", args.room))?;

    if count == 0 {
        println!("No messages in room '{}'.", args.room);
        return Ok(());
    }
    print_groups(&room.groups());
    Ok(())
}
