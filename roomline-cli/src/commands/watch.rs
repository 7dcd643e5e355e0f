use anyhow::{Context, Result};
use clap::Args;
use shared::config::client::Config;
use tracing::warn;

use super::{format_message, open_room, print_groups, sender_label};

#[derive(Args, Debug)]
#[command(about = "Follow a room's realtime messages until interrupted")]
pub struct WatchArgs {
    /// Room to follow
    #[arg(long)]
    pub room: String,

    /// Skip printing the existing history first
    #[arg(long)]
    pub no_history: bool,
}

pub async fn run(config: &Config, args: WatchArgs) -> Result<()> {
    let mut room = open_room(config, &args.room, None)?;

    if !args.no_history {
        match room.load().await {
            Ok(_) => print_groups(&room.groups()),
            // History is a convenience here; following can still work.
            Err(err) => warn!(room_id = %args.room, error = %err, "history unavailable"),
        }
    }

    room.attach_realtime()
        .await
        .with_context(|| format!("failed to subscribe to room '{}'", args.room))?;
    eprintln!(
        "Watching room '{}' on {}. Press Ctrl+C to stop.",
        args.room,
        room.channel()
    );

    let mut updates = room.watch_realtime();
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let deliveries = updates.borrow_and_update().clone();
                for message in deliveries.iter().skip(printed) {
                    println!("{}: {}", sender_label(message), format_message(message));
                }
                printed = deliveries.len();
            }
        }
    }

    room.detach_realtime().await;
    Ok(())
}
